//! 禁放区登记
//!
//! 每个 episode 一份，随物体放置单调增长，不会移除；后登记的区域对已接受的放置不做追溯检查。

use nalgebra::Vector2;
use serde::Serialize;

/// 地面上的轴对齐矩形
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExclusionZone {
    pub min: Vector2<f64>,
    pub max: Vector2<f64>,
}

impl ExclusionZone {
    /// 中心 ± (半尺寸 + padding)
    pub fn around(center: Vector2<f64>, half_extent: Vector2<f64>, padding: f64) -> Self {
        let half = half_extent.add_scalar(padding);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// 字面边界 `[x0, y0, x1, y1]`，角点顺序任意
    pub fn from_bounds(bounds: [f64; 4]) -> Self {
        Self {
            min: Vector2::new(bounds[0].min(bounds[2]), bounds[1].min(bounds[3])),
            max: Vector2::new(bounds[0].max(bounds[2]), bounds[1].max(bounds[3])),
        }
    }

    pub fn contains(&self, point: Vector2<f64>) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProhibitedAreaRegistry {
    zones: Vec<ExclusionZone>,
}

impl ProhibitedAreaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, zone: ExclusionZone) {
        tracing::debug!(min = ?zone.min, max = ?zone.max, "prohibited area registered");
        self.zones.push(zone);
    }

    pub fn register_around(&mut self, center: Vector2<f64>, half_extent: Vector2<f64>, padding: f64) {
        self.register(ExclusionZone::around(center, half_extent, padding));
    }

    pub fn register_bounds(&mut self, bounds: [f64; 4]) {
        self.register(ExclusionZone::from_bounds(bounds));
    }

    /// 点是否落在任一禁放区内（边界算在内）
    pub fn contains(&self, point: Vector2<f64>) -> bool {
        self.zones.iter().any(|z| z.contains(point))
    }

    pub fn zones(&self) -> &[ExclusionZone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_around_includes_padding() {
        let zone = ExclusionZone::around(Vector2::new(0.1, 0.1), Vector2::zeros(), 0.05);
        assert!(zone.contains(Vector2::new(0.14, 0.06)));
        assert!(!zone.contains(Vector2::new(0.16, 0.1)));
    }

    #[test]
    fn test_bounds_any_corner_order() {
        let zone = ExclusionZone::from_bounds([-0.04, -0.13, 0.04, -0.05]);
        let flipped = ExclusionZone::from_bounds([0.04, -0.05, -0.04, -0.13]);
        assert_eq!(zone, flipped);
        assert!(zone.contains(Vector2::new(0.0, -0.1)));
    }

    #[test]
    fn test_registry_is_monotonic() {
        let mut registry = ProhibitedAreaRegistry::new();
        let probe = Vector2::new(-0.2, 0.0);
        assert!(!registry.contains(probe));

        registry.register_bounds([-0.25, -0.25, 0.25, 0.1]);
        assert!(registry.contains(probe));

        registry.register_around(Vector2::new(1.0, 1.0), Vector2::zeros(), 0.1);
        assert!(registry.contains(probe));
        assert_eq!(registry.len(), 2);
    }
}
