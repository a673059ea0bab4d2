//! # 自动绘制模块（autodraw）
//!
//! ## 设计思路
//!
//! 该模块将“图片加载 → 调色板量化 → 笔画编译 → 节流发送 → 任务编排”
//! 按职责拆分为多个子模块，数据严格单向流动：
//!
//! ```text
//! 原始像素 → 量化分配 → 笔画指令 → 线上文本帧
//! ```
//!
//! - `loader`：解码图片、按最长边降采样
//! - `quantizer`：分桶量化，生成调色板与逐像素分配
//! - `compiler`：把分配结果居中映射到目标画布，生成微笔画
//! - `pump`：逐帧发送、节流、进度报告、协作式取消
//! - `controller`：唯一持有运行状态的编排器
//! - `transport/canvas/cancel`：外部协作者接口与取消标志
//! - `config/error/source`：配置、错误、数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! JobController::start
//!    ├─ prepare（loader::resize_to_fit + quantizer::quantize，阻塞线程）
//!    ├─ wait_for_transport（轮询 TransportSource，超时失败）
//!    ├─ canvas::select_largest
//!    ├─ compiler::compile
//!    └─ pump::stream
//!    ↓
//! JobOutcome（done / aborted / failed）→ 回到 idle
//! ```

mod cancel;
mod canvas;
mod compiler;
mod config;
mod controller;
mod error;
mod loader;
mod pump;
mod quantizer;
mod source;
mod transport;

pub use cancel::CancelToken;
pub use canvas::{CanvasProvider, CanvasRegistry, CanvasSurface, select_largest};
pub use compiler::{StrokeCommand, compile};
pub use config::{AutodrawConfig, MAX_OUTPUT_DIMENSION, MIN_OUTPUT_DIMENSION, PALETTE_CAP};
pub use controller::{JobController, JobObserver, JobOutcome, JobPhase, LogObserver};
pub use error::{DrawError, TransportError};
pub use loader::{fit_dimensions, load_pixels_from_file, load_pixels_from_memory, resize_to_fit};
pub use pump::{Pacing, Progress, StreamReport, stream};
pub use quantizer::quantize;
pub use source::{
    ALPHA_THRESHOLD, Assignment, AssignmentMap, Palette, PaletteEntry, PixelBuffer,
    PreparedImage, is_opaque,
};
pub use transport::{
    BridgeLease, ChannelTransport, SocketBridge, Transport, TransportHandle, TransportSource,
};
