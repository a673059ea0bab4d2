//! # 数据模型
//!
//! ## 设计思路
//!
//! 将“外部输入”和“流水线中间结果”解耦：
//! - `PixelBuffer` 表示已解码、只读的 RGBA 像素
//! - `Palette` / `AssignmentMap` 表示量化阶段的输出
//! - `PreparedImage` 表示可缓存、可直接编译成笔画的量化结果

use std::fmt;

use super::DrawError;

/// 透明度低于该值的像素视为不可见，不参与量化。
pub const ALPHA_THRESHOLD: u8 = 16;

/// 已解码的 RGBA 像素缓冲（行优先）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl PixelBuffer {
    /// 构建像素缓冲，并校验字节长度是否等于 `width * height * 4`。
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, DrawError> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| DrawError::Decode("image dimensions overflow".to_string()))?;

        if rgba.len() != expected_len {
            return Err(DrawError::Decode(format!(
                "pixel data length {} does not match {}x{}",
                rgba.len(),
                width,
                height
            )));
        }

        Ok(Self { width, height, rgba })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.rgba
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.rgba
    }

    /// 按行优先顺序遍历每个像素的 `[r, g, b, a]`。
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.rgba
            .chunks_exact(4)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }
}

/// 判断像素是否足够不透明以参与绘制。
pub fn is_opaque(pixel: [u8; 4]) -> bool {
    pixel[3] >= ALPHA_THRESHOLD
}

/// 调色板中的一个代表色。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaletteEntry {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PaletteEntry {
    pub const BLACK: PaletteEntry = PaletteEntry { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 小写十六进制形式，例如 `#ff8000`。
    pub fn hex(&self) -> String {
        self.to_string()
    }

    /// 与给定颜色的 RGB 欧氏距离平方（不加权、不做色彩空间转换）。
    pub fn distance_sq(&self, r: u8, g: u8, b: u8) -> u32 {
        let dr = i32::from(r) - i32::from(self.r);
        let dg = i32::from(g) - i32::from(self.g);
        let db = i32::from(b) - i32::from(self.b);
        (dr * dr + dg * dg + db * db) as u32
    }
}

impl fmt::Display for PaletteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// 有序调色板。顺序为来源桶的像素数量降序，仅影响可复现性，不影响渲染。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PaletteEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// 色板摘要，例如 `12 colours (max 400)`。
    pub fn summary(&self, cap: usize) -> String {
        format!("{} colours (max {})", self.entries.len(), cap)
    }
}

/// 单个像素的分配结果：调色板下标，或 `None` 表示跳过（不透明度不足）。
pub type Assignment = Option<u16>;

/// 每个像素一项的分配表，长度恒等于来源图像的 `width * height`。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignmentMap {
    entries: Vec<Assignment>,
}

impl AssignmentMap {
    pub(crate) fn from_vec(entries: Vec<Assignment>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Assignment> {
        self.entries.get(index).copied()
    }

    pub fn as_slice(&self) -> &[Assignment] {
        &self.entries
    }

    /// 非跳过项数量，即编译后应产生的笔画数。
    pub fn drawable_count(&self) -> usize {
        self.entries.iter().filter(|a| a.is_some()).count()
    }
}

/// 量化完成、可缓存的图像。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub palette: Palette,
    pub assignments: AssignmentMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_buffer_rejects_mismatched_length() {
        let result = PixelBuffer::new(2, 2, vec![0; 15]);
        assert!(matches!(result, Err(DrawError::Decode(_))));
    }

    #[test]
    fn pixel_buffer_iterates_row_major() {
        let buffer = PixelBuffer::new(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]).expect("valid buffer");
        let pixels: Vec<[u8; 4]> = buffer.pixels().collect();
        assert_eq!(pixels, vec![[1, 2, 3, 4], [5, 6, 7, 8]]);
        assert_eq!(buffer.pixel_count(), 2);
    }

    #[test]
    fn opacity_threshold_is_sixteen() {
        assert!(!is_opaque([0, 0, 0, 15]));
        assert!(is_opaque([0, 0, 0, 16]));
    }

    #[test]
    fn palette_entry_hex_is_lowercase_and_padded() {
        assert_eq!(PaletteEntry::new(255, 8, 171).hex(), "#ff08ab");
        assert_eq!(PaletteEntry::BLACK.hex(), "#000000");
    }

    #[test]
    fn palette_summary_mentions_cap() {
        let palette = Palette::new(vec![PaletteEntry::BLACK, PaletteEntry::new(1, 1, 1)]);
        assert_eq!(palette.summary(400), "2 colours (max 400)");
    }
}
