//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义应用级 `AppError`，统一命令行入口与设置文件读写的错误出口，
//! 替代分散的 `.map_err(|e| e.to_string())`、`expect()` 等不一致模式。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `DrawError` 与 `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于写入机器可读的运行报告。

use serde::Serialize;

use crate::autodraw::DrawError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 绘制链路错误（加载 / 量化 / 传输）
    #[error("{0}")]
    Draw(#[from] DrawError),

    /// 文件系统 I/O 错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 设置文件无法解析或写入
    #[error("Settings error: {0}")]
    Settings(String),

    /// 命令行参数非法
    #[error("Invalid argument: {0}")]
    Argument(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
