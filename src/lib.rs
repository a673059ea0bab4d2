//! # 像素自动绘制：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │               外部协作者（不在本库范围内）                │
//! │                                                          │
//! │  控制面板 ── 文件选择 ── 连接发现 ── 状态展示            │
//! └───────┬──────────────────────────────┬───────────────────┘
//!         ↓ PixelBuffer / start / stop   ↑ 状态文案 + 进度
//! ┌───────┼──────────────────────────────┼───────────────────┐
//! │       ↓            核心 (Rust)       │                   │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  ├─ autodraw                                             │
//! │  │   ├─ loader      解码 + 降采样                         │
//! │  │   ├─ quantizer   分桶量化 (≤400 色)                    │
//! │  │   ├─ compiler    居中映射 + 微笔画                     │
//! │  │   ├─ pump        节流发送 + 进度 + 取消                │
//! │  │   └─ controller  状态机编排                            │
//! │  │                                                       │
//! │  └─ settings           命令行设置文件                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，命令行入口的返回类型 |
//! | [`autodraw`] | 量化、编译、发送与任务编排 |
//! | [`settings`] | JSON 设置文件的读取与保存 |

pub mod autodraw;
pub mod error;
pub mod settings;
