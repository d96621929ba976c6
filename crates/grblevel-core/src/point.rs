//! 3-D coordinate primitive shared by the VM, mesh and leveller.

use serde::{Deserialize, Serialize};

/// A point in machine space, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn cross(self, other: Point) -> Point {
        Point {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// 2-D Euclidean distance from this point's XY to (x, y).
    pub fn distance_xy(self, x: f64, y: f64) -> f64 {
        ((x - self.x).powi(2) + (y - self.y).powi(2)).sqrt()
    }

    /// Evenly spaced sub-points between `self` and `target`, not including
    /// `self`. `relative` returns the per-step delta instead of absolute
    /// positions.
    pub fn split(self, target: Point, n: usize, relative: bool) -> Vec<Point> {
        let step = Point {
            x: (target.x - self.x) / n as f64,
            y: (target.y - self.y) / n as f64,
            z: (target.z - self.z) / n as f64,
        };

        (1..=n)
            .map(|i| {
                if relative {
                    step
                } else {
                    self + step * i as f64
                }
            })
            .collect()
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Div<f64> for Point {
    type Output = Point;
    fn div(self, rhs: f64) -> Point {
        Point::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_halves_a_diagonal_move() {
        let start = Point::new(0.0, 0.0, 0.0);
        let end = Point::new(10.0, 10.0, 10.0);
        let mid = start.split(end, 2, false);
        assert_eq!(mid, vec![Point::new(5.0, 5.0, 5.0), Point::new(10.0, 10.0, 10.0)]);
    }

    #[test]
    fn split_relative_returns_the_step_only() {
        let start = Point::new(0.0, 0.0, 0.0);
        let end = Point::new(9.0, 0.0, 0.0);
        let steps = start.split(end, 3, true);
        assert_eq!(steps, vec![Point::new(3.0, 0.0, 0.0); 3]);
    }

    #[test]
    fn distance_xy_ignores_z() {
        let p = Point::new(0.0, 0.0, 100.0);
        assert_eq!(p.distance_xy(3.0, 4.0), 5.0);
    }
}
