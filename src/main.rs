//! # 像素自动绘制：命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与协作者装配。
//! 线上帧逐行写入文件或标准输出，Ctrl-C 触发协作式中止。

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use pixel_autodraw::autodraw::{
    AutodrawConfig, CanvasSurface, JobController, JobOutcome, LogObserver, MAX_OUTPUT_DIMENSION,
    SocketBridge, Transport, TransportError, load_pixels_from_file,
};
use pixel_autodraw::error::AppError;
use pixel_autodraw::settings::{AutodrawSettings, load_settings_from_path, save_settings_to_path};

const DEFAULT_CANVAS: CanvasSurface = CanvasSurface {
    width: 800,
    height: 600,
};

#[derive(Debug, Parser)]
#[command(name = "pixel-autodraw", version)]
#[command(about = "Quantize an image into micro-strokes and stream them as drawing frames")]
struct Args {
    /// Image file to draw
    image: PathBuf,

    /// Longest output side in pixels (64-500)
    #[arg(long)]
    max_dimension: Option<u32>,

    /// Target canvas size, e.g. 800x600
    #[arg(long, value_parser = parse_canvas)]
    canvas: Option<CanvasSurface>,

    /// Write frames to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON settings file (maxDimension, canvasWidth, canvasHeight)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Delay between frames in milliseconds
    #[arg(long)]
    pace_ms: Option<u64>,

    /// Write the effective max dimension and canvas back to the settings file
    #[arg(long, requires = "settings")]
    save_settings: bool,
}

fn parse_canvas(value: &str) -> Result<CanvasSurface, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let width: u32 = width.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let height: u32 = height.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    if width == 0 || height == 0 {
        return Err("canvas dimensions must be positive".to_string());
    }
    Ok(CanvasSurface::new(width, height))
}

/// 把每个帧作为一行写入任意输出流的传输实现。
struct FrameWriterTransport {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl FrameWriterTransport {
    fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl Transport for FrameWriterTransport {
    fn send(&self, frame: &str) -> Result<(), TransportError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| TransportError::Io("frame writer lock poisoned".to_string()))?;
        writeln!(writer, "{}", frame).map_err(|e| TransportError::Io(e.to_string()))?;
        writer.flush().map_err(|e| TransportError::Io(e.to_string()))
    }

    fn is_open(&self) -> bool {
        true
    }
}

async fn run(args: Args) -> Result<JobOutcome, AppError> {
    let settings = args
        .settings
        .as_deref()
        .map(load_settings_from_path)
        .unwrap_or_default();

    let max_dimension = args
        .max_dimension
        .or(settings.max_dimension)
        .unwrap_or(MAX_OUTPUT_DIMENSION);

    let canvas = args.canvas.unwrap_or(CanvasSurface::new(
        settings.canvas_width.unwrap_or(DEFAULT_CANVAS.width),
        settings.canvas_height.unwrap_or(DEFAULT_CANVAS.height),
    ));
    if canvas.area() == 0 {
        return Err(AppError::Argument(
            "canvas dimensions must be positive".to_string(),
        ));
    }

    if args.save_settings {
        if let Some(path) = args.settings.as_deref() {
            let effective = AutodrawSettings {
                max_dimension: Some(max_dimension),
                canvas_width: Some(canvas.width),
                canvas_height: Some(canvas.height),
            };
            save_settings_to_path(path, &effective)?;
            log::info!("💾 设置已保存到 {}", path.display());
        }
    }

    let mut config = AutodrawConfig::default();
    if let Some(pace_ms) = args.pace_ms {
        config.pace = std::time::Duration::from_millis(pace_ms);
    }

    let writer: Box<dyn Write + Send> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    };

    let bridge = SocketBridge::new();
    let lease = bridge.acquire();
    bridge.track(Arc::new(FrameWriterTransport::new(writer)));

    let controller = Arc::new(JobController::new(
        config,
        Arc::new(lease),
        Arc::new(canvas),
        Arc::new(LogObserver),
    )?);

    let pixels = load_pixels_from_file(&args.image)?;
    controller.set_image(pixels);
    controller.set_max_dimension(max_dimension)?;

    let stopper = Arc::clone(&controller);
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("收到中断信号，正在停止绘制");
            stopper.stop();
        }
    });

    let outcome = controller.start().await;
    signal_task.abort();

    outcome.ok_or_else(|| AppError::Argument("a drawing job is already running".to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args).await {
        Ok(JobOutcome::Done(report)) => {
            log::info!(
                "完成：{}/{} 帧已发送（失败 {}）",
                report.delivered,
                report.total,
                report.failed
            );
            ExitCode::SUCCESS
        }
        Ok(JobOutcome::Aborted { sent }) => {
            log::warn!("已中止：{} 帧已发送", sent);
            ExitCode::from(130)
        }
        Ok(JobOutcome::Failed(err)) => {
            log::error!("绘制失败: {err}");
            ExitCode::FAILURE
        }
        Err(err) => {
            log::error!("启动失败: {err}");
            ExitCode::FAILURE
        }
    }
}
