use serde::{Deserialize, Serialize};

/// Screen-space vector: +x right, +y down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit step for a heading in degrees, where 0 points right and 90 points up.
    pub fn from_heading_degrees(heading_degrees: f64) -> Self {
        let radians = heading_degrees.to_radians();
        Self {
            x: radians.cos(),
            y: -radians.sin(),
        }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn from_position_size(position: Vec2, size: Vec2) -> Self {
        Self {
            min: position,
            max: position + size,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2 {
            x: (self.min.x + self.max.x) * 0.5,
            y: (self.min.y + self.max.y) * 0.5,
        }
    }

    /// Penetration depth on each axis; non-positive components mean no overlap.
    pub fn overlap(&self, other: &Aabb) -> Vec2 {
        Vec2 {
            x: self.max.x.min(other.max.x) - self.min.x.max(other.min.x),
            y: self.max.y.min(other.max.y) - self.min.y.max(other.min.y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "{actual} vs {expected}"
        );
    }

    #[test]
    fn heading_ninety_points_up_on_screen() {
        let up = Vec2::from_heading_degrees(90.0);
        assert_close(up.x, 0.0);
        assert_close(up.y, -1.0);

        let left = Vec2::from_heading_degrees(180.0);
        assert_close(left.x, -1.0);
        assert_close(left.y, 0.0);
    }

    #[test]
    fn touching_boxes_have_zero_overlap() {
        let a = Aabb::from_position_size(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        let b = Aabb::from_position_size(Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0));
        let overlap = a.overlap(&b);
        assert_close(overlap.x, 0.0);
        assert_close(overlap.y, 10.0);
    }
}
