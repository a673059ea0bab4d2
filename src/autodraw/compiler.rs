//! # 笔画编译模块
//!
//! ## 设计思路
//!
//! 每个有效像素对应一条极短的线段（微笔画），坐标归一化到目标画布。
//! 源图按 1:1 像素居中放置，不做缩放；超出画布的部分由远端裁剪。
//!
//! ## 实现思路
//!
//! - 偏移量 `max(0, (画布尺寸 - 图像尺寸) / 2)`，两轴独立计算
//! - 起点 `(offset + x + 0.05, offset + y + 0.05)`，终点在起点基础上各加 `0.1`
//! - 端点除以画布宽高后夹到 `[0.0001, 0.9999]`，避免远端边缘伪影
//! - 输出严格按行优先（先 y 后 x），决定远端可见的绘制顺序

use std::fmt;

use super::DrawError;
use super::canvas::CanvasSurface;
use super::source::PreparedImage;

const STROKE_INSET: f64 = 0.05;
const STROKE_LENGTH: f64 = 0.1;
const COORD_MIN: f64 = 0.0001;
const COORD_MAX: f64 = 0.9999;

/// 单条绘制指令。
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeCommand {
    /// `#rrggbb` 形式的颜色。
    pub color: String,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl StrokeCommand {
    /// 序列化为远端协议要求的文本帧。
    ///
    /// # 示例
    /// ```rust
    /// use pixel_autodraw::autodraw::StrokeCommand;
    ///
    /// let cmd = StrokeCommand { color: "#ff0000".into(), x1: 0.5, y1: 0.5, x2: 0.501, y2: 0.501 };
    /// assert_eq!(
    ///     cmd.to_frame(),
    ///     r##"42["drawcmd",0,[0.500000,0.500000,0.501000,0.501000,false,-1,"#ff0000",0,0,{}]]"##
    /// );
    /// ```
    pub fn to_frame(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StrokeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"42["drawcmd",0,[{:.6},{:.6},{:.6},{:.6},false,-1,"{}",0,0,{{}}]]"#,
            self.x1, self.y1, self.x2, self.y2, self.color
        )
    }
}

fn normalize(value: f64, extent: f64) -> f64 {
    (value / extent).clamp(COORD_MIN, COORD_MAX)
}

/// 将量化结果编译为有序笔画序列。
///
/// 全部像素都被跳过时返回空序列，由调用方决定如何处理“无可绘制内容”。
pub fn compile(
    prepared: &PreparedImage,
    canvas: CanvasSurface,
) -> Result<Vec<StrokeCommand>, DrawError> {
    let width = prepared.width as usize;
    let height = prepared.height as usize;
    let assignments = prepared.assignments.as_slice();

    if assignments.len() != width * height {
        return Err(DrawError::Internal(format!(
            "assignment map has {} entries for a {}x{} image",
            assignments.len(),
            width,
            height
        )));
    }

    let hex: Vec<String> = prepared.palette.entries().iter().map(|e| e.hex()).collect();

    let board_width = f64::from(canvas.width.max(1));
    let board_height = f64::from(canvas.height.max(1));
    let offset_x = ((board_width - f64::from(prepared.width)) / 2.0).max(0.0);
    let offset_y = ((board_height - f64::from(prepared.height)) / 2.0).max(0.0);

    let mut commands = Vec::with_capacity(prepared.assignments.drawable_count());

    for y in 0..height {
        for x in 0..width {
            let Some(palette_index) = assignments[y * width + x] else {
                continue;
            };
            let color = hex.get(usize::from(palette_index)).ok_or_else(|| {
                DrawError::Internal(format!("palette index {} out of range", palette_index))
            })?;

            let start_x = offset_x + x as f64 + STROKE_INSET;
            let start_y = offset_y + y as f64 + STROKE_INSET;
            let end_x = start_x + STROKE_LENGTH;
            let end_y = start_y + STROKE_LENGTH;

            commands.push(StrokeCommand {
                color: color.clone(),
                x1: normalize(start_x, board_width),
                y1: normalize(start_y, board_height),
                x2: normalize(end_x, board_width),
                y2: normalize(end_y, board_height),
            });
        }
    }

    Ok(commands)
}
