//! # 画布选择
//!
//! 页面上可能存在多块候选画布，约定选择面积最大的一块；面积相同取先出现者。
//! 面积为零的候选视为不可用。

use std::sync::Mutex;

/// 候选绘图表面的像素尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSurface {
    pub width: u32,
    pub height: u32,
}

impl CanvasSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// 画布协作者：枚举当前所有候选表面。
pub trait CanvasProvider: Send + Sync {
    fn surfaces(&self) -> Vec<CanvasSurface>;
}

impl CanvasProvider for Vec<CanvasSurface> {
    fn surfaces(&self) -> Vec<CanvasSurface> {
        self.clone()
    }
}

impl CanvasProvider for CanvasSurface {
    fn surfaces(&self) -> Vec<CanvasSurface> {
        vec![*self]
    }
}

/// 运行期可替换候选列表的画布协作者。
#[derive(Debug, Default)]
pub struct CanvasRegistry {
    surfaces: Mutex<Vec<CanvasSurface>>,
}

impl CanvasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, surfaces: Vec<CanvasSurface>) {
        match self.surfaces.lock() {
            Ok(mut guard) => *guard = surfaces,
            Err(poisoned) => *poisoned.into_inner() = surfaces,
        }
    }
}

impl CanvasProvider for CanvasRegistry {
    fn surfaces(&self) -> Vec<CanvasSurface> {
        match self.surfaces.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// 选出面积最大的画布，平局时保留先出现者。
pub fn select_largest(candidates: &[CanvasSurface]) -> Option<CanvasSurface> {
    candidates
        .iter()
        .copied()
        .filter(|surface| surface.area() > 0)
        .fold(None, |best: Option<CanvasSurface>, candidate| match best {
            Some(current) if candidate.area() <= current.area() => Some(current),
            _ => Some(candidate),
        })
}
