//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载绘制链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 错误分级：
//! - `Configuration` / `NoImage`：开始工作前即被拒绝
//! - `TransportNotFound` / `CanvasNotFound` / `NoDrawablePixels`：本次任务失败，可直接重试
//! - `TransportSend`：单帧发送失败，由发送泵吸收，不会上抛到控制器
//! - `Cancelled`：操作者主动中止，不属于失败

/// 绘制链路统一错误类型。
///
/// 该类型会在应用层被上转为 `AppError`。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Please choose an image before drawing.")]
    NoImage,

    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Could not read image file: {0}")]
    FileSystem(String),

    #[error("Could not detect the websocket transport. Join a room and try again.")]
    TransportNotFound,

    #[error("Canvas not found. Wait for the page to finish loading.")]
    CanvasNotFound,

    #[error("No drawable pixels were detected.")]
    NoDrawablePixels,

    #[error("Frame send failed: {0}")]
    TransportSend(#[from] TransportError),

    /// 已发送的前缀不会回滚，`sent` 记录中止前成功发出的帧数。
    #[error("Drawing aborted")]
    Cancelled { sent: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DrawError {
    /// 是否为操作者主动中止（区别于失败）。
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// 传输句柄单次发送失败。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("{0}")]
    Io(String),
}
