//! # 图片加载与降采样
//!
//! ## 设计思路
//!
//! 把“字节 → 图像 → RGBA 像素缓冲”集中在一处，量化阶段只面对统一的 `PixelBuffer`。
//! 读取前先检查文件体积，避免超大输入造成内存峰值。
//!
//! ## 实现思路
//!
//! 1. 读取文件字节（校验存在性与体积上限）
//! 2. `image` 解码并转换为 RGBA
//! 3. 按最长边等比缩放到 `max_dimension` 以内，只缩小不放大
//! 4. 缩放优先走 `fast_image_resize`，失败时回退 `image::imageops::resize`

use std::path::Path;

use fast_image_resize as fr;
use image::RgbaImage;
use image::imageops::FilterType;

use super::DrawError;
use super::source::PixelBuffer;

/// 允许读取的最大文件体积（字节）。
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// 从本地文件读取并解码图片。
pub fn load_pixels_from_file(path: &Path) -> Result<PixelBuffer, DrawError> {
    log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

    if !path.exists() {
        return Err(DrawError::FileSystem(format!(
            "file does not exist: {}",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| DrawError::FileSystem(format!("cannot read file metadata: {}", e)))?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(DrawError::FileSystem(format!(
            "file too large: {:.2} MB (limit {:.2} MB)",
            metadata.len() as f64 / 1024.0 / 1024.0,
            MAX_FILE_SIZE as f64 / 1024.0 / 1024.0
        )));
    }

    let bytes = std::fs::read(path)
        .map_err(|e| DrawError::FileSystem(format!("cannot read image file: {}", e)))?;

    load_pixels_from_memory(&bytes)
}

/// 解码内存中的图片字节。
pub fn load_pixels_from_memory(bytes: &[u8]) -> Result<PixelBuffer, DrawError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| DrawError::Decode(format!("{}", e)))?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();

    log::info!("✅ 图片解码成功 - 尺寸: {}x{}", width, height);

    PixelBuffer::new(width, height, rgba.into_raw())
}

/// 计算等比缩放后的目标尺寸。最长边不超过 `max_dimension`，从不放大。
pub fn fit_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height).max(1);
    let scale = (f64::from(max_dimension) / f64::from(longest)).min(1.0);
    let target_width = ((f64::from(width) * scale).round() as u32).max(1);
    let target_height = ((f64::from(height) * scale).round() as u32).max(1);
    (target_width, target_height)
}

/// 将像素缓冲缩放到 `max_dimension` 以内。
pub fn resize_to_fit(
    pixels: &PixelBuffer,
    max_dimension: u32,
    filter: FilterType,
) -> Result<PixelBuffer, DrawError> {
    let (width, height) = (pixels.width(), pixels.height());
    let (target_width, target_height) = fit_dimensions(width, height, max_dimension);

    if (target_width, target_height) == (width, height) {
        return Ok(pixels.clone());
    }

    log::info!(
        "🧩 降采样：{}x{} -> {}x{}（filter={:?}）",
        width,
        height,
        target_width,
        target_height,
        filter
    );

    match resize_with_fast_image_resize(pixels, target_width, target_height, filter) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 降采样失败，回退 image::imageops::resize：{}", err);
            resize_with_image(pixels, target_width, target_height, filter)
        }
    }
}

fn resize_with_fast_image_resize(
    pixels: &PixelBuffer,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<PixelBuffer, DrawError> {
    let src_image = fr::images::Image::from_vec_u8(
        pixels.width(),
        pixels.height(),
        pixels.as_raw().to_vec(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| DrawError::Decode(format!("cannot build source buffer: {}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| DrawError::Decode(format!("fast_image_resize failed: {}", e)))?;

    PixelBuffer::new(target_width, target_height, dst_image.into_vec())
}

fn resize_with_image(
    pixels: &PixelBuffer,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<PixelBuffer, DrawError> {
    let source = RgbaImage::from_raw(pixels.width(), pixels.height(), pixels.as_raw().to_vec())
        .ok_or_else(|| DrawError::Decode("pixel buffer length mismatch".to_string()))?;
    let resized = image::imageops::resize(&source, target_width, target_height, filter);
    PixelBuffer::new(target_width, target_height, resized.into_raw())
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}
