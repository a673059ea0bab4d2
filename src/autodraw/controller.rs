//! # 任务控制器
//!
//! ## 设计思路
//!
//! `JobController` 是唯一持有并修改运行状态的组件，其余组件都是纯变换或传输消费者。
//! 生命周期：
//!
//! ```text
//! idle → preparing → awaiting-transport → compiling → streaming → done
//!                                                             ↘ aborted / failed
//! ```
//!
//! 任一终态处理完毕后回到 `idle`，控制器可直接开始下一次任务。
//!
//! ## 实现思路
//!
//! - 运行状态放在 `Mutex<RunState>` 中，锁只在读写字段时短暂持有，绝不跨 `await`
//! - `RunGuard` 采用 RAII：无论正常结束、出错还是 future 被丢弃，`running` 都会复位
//! - 量化在阻塞线程执行，避免占用 async 运行时
//! - 输入图像或尺寸变化时递增代次，过期的量化结果不会写回缓存
//! - 记录 `prepare/acquire/compile/stream/total` 阶段耗时，便于性能诊断

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use super::cancel::CancelToken;
use super::canvas::{CanvasProvider, select_largest};
use super::compiler::compile;
use super::config::{self, AutodrawConfig};
use super::loader::resize_to_fit;
use super::pump::{Pacing, Progress, StreamReport, stream};
use super::quantizer::quantize;
use super::source::{Palette, PixelBuffer, PreparedImage};
use super::transport::{TransportHandle, TransportSource};
use super::DrawError;

/// 任务阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    Preparing,
    AwaitingTransport,
    Compiling,
    Streaming,
    Done,
    Aborted,
    Failed,
}

impl JobPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::AwaitingTransport => "awaiting-transport",
            Self::Compiling => "compiling",
            Self::Streaming => "streaming",
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

/// 一次任务的终态。
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Done(StreamReport),
    Aborted { sent: usize },
    Failed(DrawError),
}

impl JobOutcome {
    pub fn phase(&self) -> JobPhase {
        match self {
            Self::Done(_) => JobPhase::Done,
            Self::Aborted { .. } => JobPhase::Aborted,
            Self::Failed(_) => JobPhase::Failed,
        }
    }

    /// 每个终态唯一对应的状态文案。
    pub fn status_text(&self) -> String {
        match self {
            Self::Done(_) => "Image rendered successfully!".to_string(),
            Self::Aborted { .. } => "Drawing aborted.".to_string(),
            Self::Failed(err) => format!("Error: {}", err),
        }
    }
}

/// 状态与进度的接收方。默认实现全部为空操作。
pub trait JobObserver: Send + Sync {
    fn on_status(&self, _status: &str) {}
    fn on_progress(&self, _progress: Progress) {}
    fn on_phase(&self, _phase: JobPhase) {}
}

/// 把状态与进度写入日志的观察者。
#[derive(Debug, Default)]
pub struct LogObserver;

impl JobObserver for LogObserver {
    fn on_status(&self, status: &str) {
        log::info!("📝 {}", status);
    }

    fn on_progress(&self, progress: Progress) {
        log::info!(
            "📊 {}/{} ({})",
            progress.completed,
            progress.total,
            progress.label()
        );
    }

    fn on_phase(&self, phase: JobPhase) {
        log::debug!("🔁 阶段切换：{}", phase.as_str());
    }
}

const IDLE_STATUS: &str = "Select an image to begin (max 500px).";

struct RunState {
    running: bool,
    phase: JobPhase,
    source: Option<Arc<PixelBuffer>>,
    max_dimension: u32,
    prepared: Option<Arc<PreparedImage>>,
    generation: u64,
}

impl RunState {
    fn new(max_dimension: u32) -> Self {
        Self {
            running: false,
            phase: JobPhase::Idle,
            source: None,
            max_dimension,
            prepared: None,
            generation: 0,
        }
    }

    fn invalidate(&mut self) {
        self.prepared = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// 任务期间持有，`Drop` 时复位 `running` 并回到 `idle`。
struct RunGuard<'a> {
    controller: &'a JobController,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.controller.state();
        state.running = false;
        state.phase = JobPhase::Idle;
        drop(state);
        self.controller.cancel.reset();
        self.controller.observer.on_phase(JobPhase::Idle);
    }
}

/// 绘制任务控制器。
pub struct JobController {
    config: AutodrawConfig,
    state: Mutex<RunState>,
    cancel: CancelToken,
    transports: Arc<dyn TransportSource>,
    canvases: Arc<dyn CanvasProvider>,
    observer: Arc<dyn JobObserver>,
}

impl JobController {
    /// 创建控制器，配置非法时直接拒绝。
    pub fn new(
        config: AutodrawConfig,
        transports: Arc<dyn TransportSource>,
        canvases: Arc<dyn CanvasProvider>,
        observer: Arc<dyn JobObserver>,
    ) -> Result<Self, DrawError> {
        config.validate()?;
        let state = RunState::new(config.max_dimension);
        Ok(Self {
            config,
            state: Mutex::new(state),
            cancel: CancelToken::new(),
            transports,
            canvases,
            observer,
        })
    }

    /// 读取运行状态。
    ///
    /// 所有写入都是单字段赋值，锁中毒后的数据依然一致，因此直接恢复使用。
    fn state(&self) -> MutexGuard<'_, RunState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn set_phase(&self, phase: JobPhase) {
        self.state().phase = phase;
        self.observer.on_phase(phase);
    }

    fn status(&self, text: &str) {
        self.observer.on_status(text);
    }

    fn ensure_not_aborted(&self, sent: usize) -> Result<(), DrawError> {
        if self.cancel.is_cancelled() {
            return Err(DrawError::Cancelled { sent });
        }
        Ok(())
    }

    pub fn config(&self) -> &AutodrawConfig {
        &self.config
    }

    pub fn phase(&self) -> JobPhase {
        self.state().phase
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    pub fn is_prepared(&self) -> bool {
        self.state().prepared.is_some()
    }

    pub fn max_dimension(&self) -> u32 {
        self.state().max_dimension
    }

    /// 当前缓存的量化结果。
    pub fn prepared(&self) -> Option<Arc<PreparedImage>> {
        self.state().prepared.clone()
    }

    pub fn palette(&self) -> Option<Palette> {
        self.state().prepared.as_ref().map(|p| p.palette.clone())
    }

    /// 设置输入图像，已缓存的量化结果随之失效。
    pub fn set_image(&self, pixels: PixelBuffer) {
        let mut state = self.state();
        state.source = Some(Arc::new(pixels));
        state.invalidate();
    }

    /// 清除输入图像。
    pub fn clear_image(&self) {
        {
            let mut state = self.state();
            state.source = None;
            state.invalidate();
        }
        self.status(IDLE_STATUS);
    }

    /// 修改最大输出尺寸，已缓存的量化结果随之失效。
    pub fn set_max_dimension(&self, max_dimension: u32) -> Result<(), DrawError> {
        config::validate_max_dimension(max_dimension)?;
        let has_source = {
            let mut state = self.state();
            state.max_dimension = max_dimension;
            state.invalidate();
            state.source.is_some()
        };
        if has_source {
            self.status("Dimension changed, regenerate preview.");
        }
        Ok(())
    }

    /// 在任务之外单独执行量化（预览）。
    pub async fn prepare(&self) -> Result<Arc<PreparedImage>, DrawError> {
        match self.prepare_inner().await {
            Ok(prepared) => Ok(prepared),
            Err(err) => {
                log::error!("❌ 预览生成失败：{}", err);
                self.status(&format!("Error: {}", err));
                Err(err)
            }
        }
    }

    async fn prepare_inner(&self) -> Result<Arc<PreparedImage>, DrawError> {
        let (source, max_dimension, generation) = {
            let state = self.state();
            let source = state.source.clone().ok_or(DrawError::NoImage)?;
            (source, state.max_dimension, state.generation)
        };

        self.status(&format!("Quantising colours (≤{})…", self.config.max_colors));

        let filter = self.config.resize_filter;
        let max_colors = self.config.max_colors;
        let prepared = tokio::task::spawn_blocking(move || -> Result<PreparedImage, DrawError> {
            let resized = resize_to_fit(&source, max_dimension, filter)?;
            let (palette, assignments) = quantize(&resized, max_colors)?;
            Ok(PreparedImage {
                width: resized.width(),
                height: resized.height(),
                palette,
                assignments,
            })
        })
        .await
        .map_err(|e| DrawError::Internal(format!("quantization task failed: {}", e)))??;

        let prepared = Arc::new(prepared);
        {
            let mut state = self.state();
            if state.generation == generation {
                state.prepared = Some(Arc::clone(&prepared));
            } else {
                log::debug!("🗑️ 输入已变化，丢弃过期的量化结果");
            }
        }

        self.status(&format!(
            "Ready: {}×{}px, {} colours.",
            prepared.width,
            prepared.height,
            prepared.palette.len()
        ));

        Ok(prepared)
    }

    /// 开始一次绘制任务。
    ///
    /// 已在运行时为空操作，返回 `None`；否则返回本次任务的终态。
    pub async fn start(&self) -> Option<JobOutcome> {
        {
            let mut state = self.state();
            if state.running {
                log::debug!("任务已在运行，忽略重复的开始请求");
                return None;
            }
            state.running = true;
            self.cancel.reset();
        }
        let _guard = RunGuard { controller: self };

        let outcome = match self.run().await {
            Ok(report) => JobOutcome::Done(report),
            Err(DrawError::Cancelled { sent }) => {
                log::info!("⏹️ 绘制已中止 - 已发送 {} 帧", sent);
                JobOutcome::Aborted { sent }
            }
            Err(err) => {
                log::error!("❌ 绘制失败：{}", err);
                JobOutcome::Failed(err)
            }
        };

        self.set_phase(outcome.phase());
        self.status(&outcome.status_text());
        Some(outcome)
    }

    async fn run(&self) -> Result<StreamReport, DrawError> {
        let total_start = Instant::now();

        let prepare_start = Instant::now();
        let cached = self.state().prepared.clone();
        let prepared = match cached {
            Some(prepared) => prepared,
            None => {
                self.set_phase(JobPhase::Preparing);
                self.prepare_inner().await?
            }
        };
        let prepare_elapsed = prepare_start.elapsed();
        self.ensure_not_aborted(0)?;

        let acquire_start = Instant::now();
        self.set_phase(JobPhase::AwaitingTransport);
        self.status("Waiting for websocket…");
        let transport = self.wait_for_transport().await?;
        let canvas =
            select_largest(&self.canvases.surfaces()).ok_or(DrawError::CanvasNotFound)?;
        let acquire_elapsed = acquire_start.elapsed();
        self.ensure_not_aborted(0)?;

        let compile_start = Instant::now();
        self.set_phase(JobPhase::Compiling);
        self.status("Mapping pixels to strokes…");
        let commands = compile(&prepared, canvas)?;
        if commands.is_empty() {
            return Err(DrawError::NoDrawablePixels);
        }
        let compile_elapsed = compile_start.elapsed();
        self.ensure_not_aborted(0)?;

        let stream_start = Instant::now();
        self.set_phase(JobPhase::Streaming);
        self.status(&format!("Streaming {} pixels…", commands.len()));
        let pacing = Pacing {
            pace: self.config.pace,
            progress_stride: self.config.progress_stride,
        };
        let report = stream(&commands, transport.as_ref(), pacing, &self.cancel, |progress| {
            self.observer.on_progress(progress);
            self.status(&format!(
                "Drawing pixels… {}/{}",
                progress.completed, progress.total
            ));
        })
        .await?;
        let stream_elapsed = stream_start.elapsed();
        self.ensure_not_aborted(report.delivered)?;

        log::info!(
            "✅ 绘制完成 - 画布 {}x{} 帧 {}/{} prepare={}ms acquire={}ms compile={}ms stream={}ms total={}ms",
            canvas.width,
            canvas.height,
            report.delivered,
            report.total,
            prepare_elapsed.as_millis(),
            acquire_elapsed.as_millis(),
            compile_elapsed.as_millis(),
            stream_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(report)
    }

    /// 轮询等待可用的传输句柄，超时返回 `TransportNotFound`。
    async fn wait_for_transport(&self) -> Result<TransportHandle, DrawError> {
        let start = tokio::time::Instant::now();
        while start.elapsed() < self.config.transport_timeout {
            self.ensure_not_aborted(0)?;
            if let Some(handle) = self.transports.current() {
                if handle.is_open() {
                    return Ok(handle);
                }
            }
            tokio::time::sleep(self.config.transport_poll_interval).await;
        }
        // 最后一次轮询休眠期间收到的中止同样按中止处理
        self.ensure_not_aborted(0)?;
        Err(DrawError::TransportNotFound)
    }

    /// 请求中止当前任务。空闲时为空操作，返回是否真正发出了中止请求。
    pub fn stop(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.cancel.cancel();
        self.status("Finishing current stroke…");
        true
    }

    /// 中止正在运行的任务并清空全部状态。
    pub fn teardown(&self) {
        self.cancel.cancel();
        let mut state = self.state();
        state.source = None;
        state.max_dimension = self.config.max_dimension;
        state.invalidate();
        log::debug!("🧹 控制器状态已清空");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodraw::canvas::CanvasSurface;
    use crate::autodraw::transport::ChannelTransport;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingObserver {
        statuses: Mutex<Vec<String>>,
        phases: Mutex<Vec<JobPhase>>,
    }

    impl JobObserver for RecordingObserver {
        fn on_status(&self, status: &str) {
            self.statuses.lock().expect("statuses lock").push(status.to_string());
        }

        fn on_phase(&self, phase: JobPhase) {
            self.phases.lock().expect("phases lock").push(phase);
        }
    }

    fn fast_config() -> AutodrawConfig {
        AutodrawConfig {
            pace: Duration::ZERO,
            ..AutodrawConfig::default()
        }
    }

    fn red_green() -> PixelBuffer {
        PixelBuffer::new(2, 1, vec![255, 0, 0, 255, 0, 255, 0, 255]).expect("valid buffer")
    }

    fn controller_with(
        transport: Option<TransportHandle>,
        canvases: Vec<CanvasSurface>,
        observer: Arc<RecordingObserver>,
    ) -> JobController {
        JobController::new(fast_config(), Arc::new(transport), Arc::new(canvases), observer)
            .expect("valid config")
    }

    #[test]
    fn rejects_invalid_config() {
        let config = AutodrawConfig {
            max_dimension: 1,
            ..AutodrawConfig::default()
        };
        let result = JobController::new(
            config,
            Arc::new(None::<TransportHandle>),
            Arc::new(Vec::<CanvasSurface>::new()),
            Arc::new(LogObserver),
        );
        assert!(matches!(result, Err(DrawError::Configuration(_))));
    }

    #[tokio::test]
    async fn start_without_image_fails_and_returns_to_idle() {
        let observer = Arc::new(RecordingObserver::default());
        let controller = controller_with(None, vec![], observer.clone());

        let outcome = controller.start().await.expect("not already running");
        assert_eq!(outcome, JobOutcome::Failed(DrawError::NoImage));
        assert_eq!(controller.phase(), JobPhase::Idle);
        assert!(!controller.is_running());
        assert_eq!(
            observer.statuses.lock().expect("statuses lock").last().map(String::as_str),
            Some("Error: Please choose an image before drawing.")
        );
    }

    #[tokio::test]
    async fn full_run_streams_frames_and_walks_phases() {
        let (transport, mut rx) = ChannelTransport::pair();
        let observer = Arc::new(RecordingObserver::default());
        let controller = controller_with(
            Some(transport),
            vec![CanvasSurface::new(100, 100)],
            observer.clone(),
        );
        controller.set_image(red_green());

        let outcome = controller.start().await.expect("not already running");
        assert!(matches!(outcome, JobOutcome::Done(StreamReport { delivered: 2, .. })));
        assert!(controller.is_prepared());

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains("\"#ff0000\""));

        let phases = observer.phases.lock().expect("phases lock").clone();
        assert_eq!(
            phases,
            vec![
                JobPhase::Preparing,
                JobPhase::AwaitingTransport,
                JobPhase::Compiling,
                JobPhase::Streaming,
                JobPhase::Done,
                JobPhase::Idle,
            ]
        );
        let statuses = observer.statuses.lock().expect("statuses lock").clone();
        assert!(statuses.contains(&"Ready: 2×1px, 2 colours.".to_string()));
        assert!(statuses.contains(&"Drawing pixels… 2/2".to_string()));
        assert_eq!(statuses.last().map(String::as_str), Some("Image rendered successfully!"));
    }

    #[tokio::test]
    async fn cached_preparation_skips_preparing_phase() {
        let (transport, _rx) = ChannelTransport::pair();
        let observer = Arc::new(RecordingObserver::default());
        let controller = controller_with(
            Some(transport),
            vec![CanvasSurface::new(50, 50)],
            observer.clone(),
        );
        controller.set_image(red_green());
        controller.prepare().await.expect("prepare");
        observer.phases.lock().expect("phases lock").clear();

        controller.start().await.expect("not already running");
        let phases = observer.phases.lock().expect("phases lock").clone();
        assert_eq!(phases.first(), Some(&JobPhase::AwaitingTransport));
    }

    #[tokio::test]
    async fn changing_inputs_invalidates_cache() {
        let controller = controller_with(None, vec![], Arc::new(RecordingObserver::default()));
        controller.set_image(red_green());
        controller.prepare().await.expect("prepare");
        assert!(controller.is_prepared());

        controller.set_max_dimension(128).expect("valid dimension");
        assert!(!controller.is_prepared());
        assert!(controller.set_max_dimension(1000).is_err());

        controller.prepare().await.expect("prepare");
        controller.set_image(red_green());
        assert!(!controller.is_prepared());
    }

    #[tokio::test]
    async fn prepare_downscales_to_max_dimension() {
        let controller = controller_with(None, vec![], Arc::new(RecordingObserver::default()));
        let pixels = PixelBuffer::new(200, 100, vec![120; 200 * 100 * 4]).expect("valid buffer");
        controller.set_image(pixels);
        controller.set_max_dimension(64).expect("valid dimension");

        let prepared = controller.prepare().await.expect("prepare");
        assert_eq!((prepared.width, prepared.height), (64, 32));
        assert_eq!(prepared.assignments.len(), 64 * 32);
    }

    #[tokio::test]
    async fn missing_canvas_fails() {
        let (transport, _rx) = ChannelTransport::pair();
        let controller = controller_with(Some(transport), vec![], Arc::new(RecordingObserver::default()));
        controller.set_image(red_green());

        let outcome = controller.start().await.expect("not already running");
        assert_eq!(outcome, JobOutcome::Failed(DrawError::CanvasNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_transport_times_out() {
        let controller = controller_with(
            None,
            vec![CanvasSurface::new(100, 100)],
            Arc::new(RecordingObserver::default()),
        );
        controller.set_image(red_green());

        let started = tokio::time::Instant::now();
        let outcome = controller.start().await.expect("not already running");
        assert_eq!(outcome, JobOutcome::Failed(DrawError::TransportNotFound));
        assert!(started.elapsed() >= Duration::from_millis(5_000));
        assert!(!controller.is_running());
    }

    async fn spawn_waiting_job(
        controller: &Arc<JobController>,
    ) -> tokio::task::JoinHandle<Option<JobOutcome>> {
        controller.set_image(red_green());
        controller.prepare().await.expect("prepare");
        let running = Arc::clone(controller);
        tokio::spawn(async move { running.start().await })
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_awaiting_transport_aborts_promptly() {
        let controller = Arc::new(controller_with(
            None,
            vec![CanvasSurface::new(100, 100)],
            Arc::new(RecordingObserver::default()),
        ));
        let started = tokio::time::Instant::now();
        let job = spawn_waiting_job(&controller).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(controller.phase(), JobPhase::AwaitingTransport);
        assert!(controller.stop());

        let outcome = job.await.expect("join").expect("not already running");
        assert_eq!(outcome, JobOutcome::Aborted { sent: 0 });
        assert!(started.elapsed() < Duration::from_millis(1_000));
        assert!(!controller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_last_poll_sleep_still_aborts() {
        let controller = Arc::new(controller_with(
            None,
            vec![CanvasSurface::new(100, 100)],
            Arc::new(RecordingObserver::default()),
        ));
        let job = spawn_waiting_job(&controller).await;

        // 超时前的最后一次轮询发生在 4920ms，随后休眠到 5040ms
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert!(controller.stop());

        let outcome = job.await.expect("join").expect("not already running");
        assert_eq!(outcome, JobOutcome::Aborted { sent: 0 });
    }

    #[test]
    fn stop_while_idle_is_noop() {
        let observer = Arc::new(RecordingObserver::default());
        let controller = controller_with(None, vec![], observer.clone());
        assert!(!controller.stop());
        assert!(observer.statuses.lock().expect("statuses lock").is_empty());
    }

    #[tokio::test]
    async fn clear_image_drops_preview_and_reports_idle() {
        let observer = Arc::new(RecordingObserver::default());
        let controller = controller_with(None, vec![], observer.clone());
        controller.set_image(red_green());
        controller.prepare().await.expect("prepare");

        let palette = controller.palette().expect("palette after prepare");
        assert_eq!(palette.summary(config::PALETTE_CAP), "2 colours (max 400)");

        controller.clear_image();
        assert!(controller.palette().is_none());
        assert_eq!(
            observer.statuses.lock().expect("statuses lock").last().map(String::as_str),
            Some(IDLE_STATUS)
        );
    }

    #[tokio::test]
    async fn teardown_clears_everything() {
        let controller = controller_with(None, vec![], Arc::new(RecordingObserver::default()));
        controller.set_image(red_green());
        controller.set_max_dimension(100).expect("valid dimension");
        controller.prepare().await.expect("prepare");

        controller.teardown();
        assert!(!controller.is_prepared());
        assert_eq!(controller.max_dimension(), 500);
        assert_eq!(controller.prepare().await, Err(DrawError::NoImage));
    }
}
