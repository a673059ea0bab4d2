//! # 调色板量化模块
//!
//! ## 设计思路
//!
//! 粗粒度分桶量化：每个通道只保留高 4 位，得到 4096 个颜色桶。
//! 取像素最多的若干个桶作为调色板，桶的代表色是落入该桶全部像素的平均色
//! （而不是截断后的桶色），使调色板贴近原图。
//!
//! ## 实现思路
//!
//! 1. 第一遍：统计每个不透明像素所在桶的数量与通道累加和
//! 2. 按数量降序排序（稳定排序，同数量保持首次出现顺序），截取前 `max_colors` 个
//! 3. 全透明图像回退为单个黑色条目，保证下游永远拿到非空调色板
//! 4. 第二遍：为每个不透明像素选择距离平方最小的条目，下标升序遍历、仅严格更小才替换

use std::cmp::Reverse;

use super::source::{Assignment, AssignmentMap, Palette, PaletteEntry, PixelBuffer, is_opaque};
use super::{DrawError, config};

const BUCKET_COUNT: usize = 1 << 12;

#[derive(Debug, Clone, Copy, Default)]
struct BucketAccumulator {
    count: u64,
    sum_r: u64,
    sum_g: u64,
    sum_b: u64,
}

impl BucketAccumulator {
    fn add(&mut self, r: u8, g: u8, b: u8) {
        self.count += 1;
        self.sum_r += u64::from(r);
        self.sum_g += u64::from(g);
        self.sum_b += u64::from(b);
    }

    fn average(&self) -> PaletteEntry {
        let count = self.count.max(1);
        PaletteEntry::new(
            rounded_mean(self.sum_r, count),
            rounded_mean(self.sum_g, count),
            rounded_mean(self.sum_b, count),
        )
    }
}

/// 四舍五入（0.5 向上）的整数均值。
fn rounded_mean(sum: u64, count: u64) -> u8 {
    ((2 * sum + count) / (2 * count)).min(255) as u8
}

fn bucket_key(r: u8, g: u8, b: u8) -> usize {
    (usize::from(r >> 4) << 8) | (usize::from(g >> 4) << 4) | usize::from(b >> 4)
}

/// 将像素缓冲量化为至多 `max_colors` 色的调色板，并给出每个像素的分配。
///
/// # 示例
/// ```rust
/// use pixel_autodraw::autodraw::{PixelBuffer, quantize};
///
/// let pixels = PixelBuffer::new(2, 1, vec![255, 0, 0, 255, 0, 255, 0, 255])?;
/// let (palette, assignments) = quantize(&pixels, 400)?;
/// assert_eq!(palette.len(), 2);
/// assert_eq!(assignments.as_slice(), &[Some(0), Some(1)]);
/// # Ok::<(), pixel_autodraw::autodraw::DrawError>(())
/// ```
pub fn quantize(
    pixels: &PixelBuffer,
    max_colors: usize,
) -> Result<(Palette, AssignmentMap), DrawError> {
    config::validate_max_colors(max_colors)?;

    let mut buckets = vec![BucketAccumulator::default(); BUCKET_COUNT];
    let mut first_seen: Vec<usize> = Vec::new();

    for [r, g, b, a] in pixels.pixels() {
        if !is_opaque([r, g, b, a]) {
            continue;
        }
        let key = bucket_key(r, g, b);
        if buckets[key].count == 0 {
            first_seen.push(key);
        }
        buckets[key].add(r, g, b);
    }

    let populated = first_seen.len();
    first_seen.sort_by_key(|&key| Reverse(buckets[key].count));
    first_seen.truncate(max_colors);

    let mut entries: Vec<PaletteEntry> = first_seen
        .iter()
        .map(|&key| buckets[key].average())
        .collect();

    if entries.is_empty() {
        entries.push(PaletteEntry::BLACK);
    }

    let palette = Palette::new(entries);
    let assignments = assign_nearest(pixels, &palette);

    log::debug!(
        "🎨 量化完成 - {}x{} 有效桶: {} 调色板: {}",
        pixels.width(),
        pixels.height(),
        populated,
        palette.len()
    );

    Ok((palette, assignments))
}

fn assign_nearest(pixels: &PixelBuffer, palette: &Palette) -> AssignmentMap {
    let entries = palette.entries();
    let assignments: Vec<Assignment> = pixels
        .pixels()
        .map(|px| {
            if !is_opaque(px) {
                return None;
            }
            let [r, g, b, _] = px;
            let mut best_index = 0usize;
            let mut best_distance = u32::MAX;
            for (index, entry) in entries.iter().enumerate() {
                let distance = entry.distance_sq(r, g, b);
                if distance < best_distance {
                    best_distance = distance;
                    best_index = index;
                }
            }
            Some(best_index as u16)
        })
        .collect();

    AssignmentMap::from_vec(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn buffer_from(width: u32, height: u32, pixels: &[[u8; 4]]) -> PixelBuffer {
        PixelBuffer::new(width, height, pixels.concat()).expect("valid test buffer")
    }

    #[test]
    fn rejects_zero_max_colors() {
        let pixels = buffer_from(1, 1, &[[1, 2, 3, 255]]);
        assert!(matches!(quantize(&pixels, 0), Err(DrawError::Configuration(_))));
    }

    #[test]
    fn transparent_image_gets_black_fallback() {
        let pixels = buffer_from(4, 4, &[[200, 10, 10, 0]; 16]);
        let (palette, assignments) = quantize(&pixels, 400).expect("quantize");

        assert_eq!(palette.entries(), &[PaletteEntry::BLACK]);
        assert_eq!(assignments.len(), 16);
        assert!(assignments.as_slice().iter().all(|a| a.is_none()));
        assert_eq!(assignments.drawable_count(), 0);
    }

    #[test]
    fn palette_color_is_bucket_average_not_truncation() {
        // 同一桶 (0xf0, 0x00, 0x00) 内的两个像素
        let pixels = buffer_from(2, 1, &[[241, 1, 2, 255], [250, 4, 5, 255]]);
        let (palette, _) = quantize(&pixels, 400).expect("quantize");

        // (241+250)/2 = 245.5 -> 246, (1+4)/2 = 2.5 -> 3, (2+5)/2 = 3.5 -> 4
        assert_eq!(palette.entries(), &[PaletteEntry::new(246, 3, 4)]);
    }

    #[test]
    fn buckets_ranked_by_population_then_first_seen() {
        let blue = [0, 0, 255, 255];
        let red = [255, 0, 0, 255];
        let green = [0, 255, 0, 255];
        let pixels = buffer_from(5, 1, &[blue, red, green, green, red]);
        let (palette, assignments) = quantize(&pixels, 400).expect("quantize");

        assert_eq!(
            palette.entries(),
            &[
                PaletteEntry::new(255, 0, 0),
                PaletteEntry::new(0, 255, 0),
                PaletteEntry::new(0, 0, 255),
            ]
        );
        assert_eq!(
            assignments.as_slice(),
            &[Some(2), Some(0), Some(1), Some(1), Some(0)]
        );
    }

    #[test]
    fn truncated_palette_maps_dropped_colors_to_nearest() {
        let pixels = buffer_from(
            4,
            1,
            &[[0, 0, 0, 255], [0, 0, 0, 255], [250, 250, 250, 255], [40, 40, 40, 255]],
        );
        let (palette, assignments) = quantize(&pixels, 2).expect("quantize");

        assert_eq!(palette.len(), 2);
        assert_eq!(palette.entries()[0], PaletteEntry::BLACK);
        assert_eq!(palette.entries()[1], PaletteEntry::new(250, 250, 250));
        assert_eq!(assignments.get(3), Some(Some(0)));
    }

    #[test]
    fn semi_transparent_pixels_are_skipped() {
        let pixels = buffer_from(3, 1, &[[9, 9, 9, 15], [9, 9, 9, 16], [9, 9, 9, 255]]);
        let (_, assignments) = quantize(&pixels, 400).expect("quantize");
        assert_eq!(assignments.as_slice(), &[None, Some(0), Some(0)]);
    }

    fn arb_image() -> impl Strategy<Value = PixelBuffer> {
        (1u32..12, 1u32..12).prop_flat_map(|(w, h)| {
            prop::collection::vec(any::<[u8; 4]>(), (w * h) as usize)
                .prop_map(move |pixels| buffer_from(w, h, &pixels))
        })
    }

    proptest! {
        #[test]
        fn palette_and_assignment_invariants_hold(
            pixels in arb_image(),
            max_colors in 1usize..16,
        ) {
            let (palette, assignments) = quantize(&pixels, max_colors).expect("quantize");

            prop_assert!(!palette.is_empty());
            prop_assert!(palette.len() <= max_colors);
            prop_assert_eq!(assignments.len(), pixels.pixel_count());

            for (px, assignment) in pixels.pixels().zip(assignments.as_slice()) {
                match assignment {
                    None => prop_assert!(!is_opaque(px)),
                    Some(index) => {
                        let index = usize::from(*index);
                        prop_assert!(index < palette.len());
                        let [r, g, b, _] = px;
                        let assigned = palette.entries()[index].distance_sq(r, g, b);
                        for entry in palette.entries() {
                            prop_assert!(assigned <= entry.distance_sq(r, g, b));
                        }
                    }
                }
            }
        }

        #[test]
        fn quantize_is_deterministic(pixels in arb_image(), max_colors in 1usize..16) {
            let first = quantize(&pixels, max_colors).expect("quantize");
            let second = quantize(&pixels, max_colors).expect("quantize");
            prop_assert_eq!(first, second);
        }
    }
}
