//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `AutodrawConfig`，保证运行时行为可观测、可调整、可测试。
//! 只有最大输出尺寸面向操作者开放，其余参数在生产中固定，但保留字段便于测试注入。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产使用的固定参数组合。
//! - `validate` 在任何工作开始前拒绝非法输入，统一返回 `DrawError::Configuration`。

use std::time::Duration;

use image::imageops::FilterType;

use super::DrawError;

/// 最大输出尺寸允许的下限（像素）。
pub const MIN_OUTPUT_DIMENSION: u32 = 64;
/// 最大输出尺寸允许的上限（像素），同时也是默认值。
pub const MAX_OUTPUT_DIMENSION: u32 = 500;
/// 调色板容量上限。
pub const PALETTE_CAP: usize = 400;

/// 绘制任务配置。
///
/// 字段覆盖了降采样、量化、传输等待与发送节流四个阶段。
#[derive(Debug, Clone)]
pub struct AutodrawConfig {
    /// 降采样后宽/高单边最大值。
    pub max_dimension: u32,
    /// 调色板最大颜色数。
    pub max_colors: usize,
    /// 相邻两帧之间的固定间隔。
    pub pace: Duration,
    /// 等待传输句柄可用的总时长上限。
    pub transport_timeout: Duration,
    /// 等待传输句柄时的轮询间隔。
    pub transport_poll_interval: Duration,
    /// 每发送多少帧对外报告一次进度（最后一帧总会报告）。
    pub progress_stride: usize,
    /// 降采样滤镜策略。
    pub resize_filter: FilterType,
}

impl Default for AutodrawConfig {
    fn default() -> Self {
        Self {
            max_dimension: MAX_OUTPUT_DIMENSION,
            max_colors: PALETTE_CAP,
            pace: Duration::from_millis(8),
            transport_timeout: Duration::from_millis(5_000),
            transport_poll_interval: Duration::from_millis(120),
            progress_stride: 50,
            resize_filter: FilterType::Triangle,
        }
    }
}

impl AutodrawConfig {
    /// 校验全部参数。
    ///
    /// # 示例
    /// ```rust
    /// use pixel_autodraw::autodraw::AutodrawConfig;
    ///
    /// let mut config = AutodrawConfig::default();
    /// assert!(config.validate().is_ok());
    /// config.max_dimension = 10;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), DrawError> {
        validate_max_dimension(self.max_dimension)?;
        validate_max_colors(self.max_colors)?;
        if self.progress_stride == 0 {
            return Err(DrawError::Configuration(
                "progress_stride must be at least 1".to_string(),
            ));
        }
        if self.transport_poll_interval.is_zero() {
            return Err(DrawError::Configuration(
                "transport_poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_max_dimension(value: u32) -> Result<(), DrawError> {
    if !(MIN_OUTPUT_DIMENSION..=MAX_OUTPUT_DIMENSION).contains(&value) {
        return Err(DrawError::Configuration(format!(
            "max_dimension must be between {} and {} (got {})",
            MIN_OUTPUT_DIMENSION, MAX_OUTPUT_DIMENSION, value
        )));
    }
    Ok(())
}

pub(crate) fn validate_max_colors(value: usize) -> Result<(), DrawError> {
    if value == 0 {
        return Err(DrawError::Configuration(
            "max_colors must be at least 1".to_string(),
        ));
    }
    Ok(())
}
