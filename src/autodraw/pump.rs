//! # 发送泵
//!
//! ## 设计思路
//!
//! 按编译顺序逐帧发送，帧与帧之间固定间隔节流，避免压垮远端或触发其限流。
//! 单帧发送失败视为瞬时抖动：记录日志后继续下一帧，远端容忍少量丢点。
//!
//! ## 实现思路
//!
//! - 每帧发送前检查取消标志；已取消则立即停止，已发送的前缀不回滚
//! - 无论发送成功与否，每帧之后都等待 `pace`
//! - 每帧都更新进度，但回调只在步长整数倍与最后一帧时触发

use std::time::Duration;

use super::DrawError;
use super::cancel::CancelToken;
use super::compiler::StrokeCommand;
use super::transport::Transport;

/// 一次进度报告。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// 保留一位小数的百分比。
    pub percent: f64,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            (completed as f64 / total as f64 * 1000.0).round() / 10.0
        };
        Self {
            completed,
            total,
            percent,
        }
    }

    /// 进度条标签，例如 `41.7%`。
    pub fn label(&self) -> String {
        format!("{:.1}%", self.percent)
    }
}

/// 一次完整发送的统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamReport {
    pub total: usize,
    /// 成功交给传输句柄的帧数。
    pub delivered: usize,
    /// 发送失败被跳过的帧数。
    pub failed: usize,
}

/// 发送节奏参数。
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub pace: Duration,
    pub progress_stride: usize,
}

/// 逐帧发送全部指令。
///
/// 取消时返回 `DrawError::Cancelled`，其中携带已成功发送的帧数。
pub async fn stream<P>(
    commands: &[StrokeCommand],
    transport: &dyn Transport,
    pacing: Pacing,
    cancel: &CancelToken,
    mut on_progress: P,
) -> Result<StreamReport, DrawError>
where
    P: FnMut(Progress),
{
    let total = commands.len();
    let stride = pacing.progress_stride.max(1);
    let mut delivered = 0usize;
    let mut failed = 0usize;

    for (index, command) in commands.iter().enumerate() {
        if cancel.is_cancelled() {
            log::info!("⏹️ 发送已中止 - 已发送 {}/{}", delivered, total);
            return Err(DrawError::Cancelled { sent: delivered });
        }

        match transport.send(&command.to_frame()) {
            Ok(()) => delivered += 1,
            Err(err) => {
                failed += 1;
                log::warn!("⚠️ 第 {} 帧发送失败，已跳过：{}", index + 1, err);
            }
        }

        let completed = index + 1;
        if completed % stride == 0 || completed == total {
            let progress = Progress::new(completed, total);
            log::debug!("📤 发送进度 {}/{} ({})", completed, total, progress.label());
            on_progress(progress);
        }

        if pacing.pace.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(pacing.pace).await;
        }
    }

    Ok(StreamReport {
        total,
        delivered,
        failed,
    })
}
