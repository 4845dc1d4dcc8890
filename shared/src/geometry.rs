//! Axis-aligned rectangle helpers shared by the simulation and the wire format.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }
}

/// Strict overlap test: rectangles that only share an edge do not intersect.
pub fn rects_intersect(a: &Rect, b: &Rect) -> bool {
    !(b.x >= a.right() || b.right() <= a.x || b.y >= a.bottom() || b.bottom() <= a.y)
}

/// Inclusive containment test.
pub fn point_in_rect(x: f32, y: f32, rect: &Rect) -> bool {
    x >= rect.x && x <= rect.right() && y >= rect.y && y <= rect.bottom()
}

pub fn distance(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_overlapping_rects_intersect() {
        let a = Rect::new(0.0, 0.0, 40.0, 40.0);
        let b = Rect::new(20.0, 20.0, 40.0, 40.0);
        assert!(rects_intersect(&a, &b));
        assert!(rects_intersect(&b, &a));
    }

    #[test]
    fn test_edge_touching_is_not_a_collision() {
        let a = Rect::new(0.0, 0.0, 40.0, 40.0);
        let right = Rect::new(40.0, 0.0, 10.0, 40.0);
        let below = Rect::new(0.0, 40.0, 40.0, 10.0);
        assert!(!rects_intersect(&a, &right));
        assert!(!rects_intersect(&a, &below));
    }

    #[test]
    fn test_contained_rect_intersects() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        let inner = Rect::new(10.0, 10.0, 5.0, 5.0);
        assert!(rects_intersect(&outer, &inner));
    }

    #[test]
    fn test_point_in_rect_is_inclusive() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(point_in_rect(10.0, 10.0, &r));
        assert!(point_in_rect(30.0, 30.0, &r));
        assert!(point_in_rect(15.0, 25.0, &r));
        assert!(!point_in_rect(30.1, 15.0, &r));
        assert!(!point_in_rect(9.9, 15.0, &r));
    }

    #[test]
    fn test_center() {
        let r = Rect::new(100.0, 200.0, 40.0, 60.0);
        assert_eq!(r.center(), (120.0, 230.0));
    }

    #[test]
    fn test_distance() {
        assert_approx_eq!(distance(0.0, 0.0, 3.0, 4.0), 5.0);
        assert_approx_eq!(distance(10.0, 10.0, 10.0, 10.0), 0.0);
        assert_approx_eq!(distance(-1.0, 2.0, 2.0, -2.0), 5.0);
    }
}
