use core::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

impl Point2f {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f32 {
        (self - other).norm()
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2f {
    pub x: f32,
    pub y: f32,
}

impl Vec2f {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    pub fn cross(self, rhs: Self) -> f32 {
        self.x * rhs.y - self.y * rhs.x
    }

    pub fn norm(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn normalize(self) -> Self {
        let n = self.norm();
        if n == 0.0 {
            Self::default()
        } else {
            self * (1.0 / n)
        }
    }

    /// `(-y, x)`: +90 degrees, which is clockwise on screen (y down).
    pub fn perp(self) -> Self {
        Self {
            x: -self.y,
            y: self.x,
        }
    }
}

impl Add<Vec2f> for Point2f {
    type Output = Point2f;

    fn add(self, rhs: Vec2f) -> Self::Output {
        Point2f {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub<Vec2f> for Point2f {
    type Output = Point2f;

    fn sub(self, rhs: Vec2f) -> Self::Output {
        Point2f {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Sub<Point2f> for Point2f {
    type Output = Vec2f;

    fn sub(self, rhs: Point2f) -> Self::Output {
        Vec2f {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Add for Vec2f {
    type Output = Vec2f;

    fn add(self, rhs: Vec2f) -> Self::Output {
        Vec2f {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Vec2f {
    type Output = Vec2f;

    fn sub(self, rhs: Vec2f) -> Self::Output {
        Vec2f {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f32> for Vec2f {
    type Output = Vec2f;

    fn mul(self, rhs: f32) -> Self::Output {
        Vec2f {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl Mul<Vec2f> for f32 {
    type Output = Vec2f;

    fn mul(self, rhs: Vec2f) -> Self::Output {
        rhs * self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line2f {
    pub p: Point2f,
    pub dir: Vec2f,
}

impl Line2f {
    /// Signed distance of `q` from the line; `dir` is assumed normalized.
    pub fn signed_distance(&self, q: Point2f) -> f32 {
        self.dir.cross(q - self.p)
    }

    /// Parameter of the orthogonal projection of `q` onto the line.
    pub fn project(&self, q: Point2f) -> f32 {
        self.dir.dot(q - self.p)
    }

    pub fn at(&self, t: f32) -> Point2f {
        self.p + self.dir * t
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polyline2f {
    pub points: Vec<Point2f>,
}

/// Integer pixel rectangle. `x`/`y` is the top-left pixel; the rectangle
/// covers `[x, x + width) x [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.right() && y < self.bottom()
    }

    pub fn center(&self) -> Point2f {
        Point2f {
            x: self.x as f32 + 0.5 * (self.width - 1) as f32,
            y: self.y as f32 + 0.5 * (self.height - 1) as f32,
        }
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        Rect {
            x: x0,
            y: y0,
            width: (x1 - x0).max(0),
            height: (y1 - y0).max(0),
        }
    }

    /// Corners in clockwise screen order starting at the top-left pixel
    /// centre, spanning pixel centres rather than pixel edges.
    pub fn corners(&self) -> [Point2f; 4] {
        let x0 = self.x as f32;
        let y0 = self.y as f32;
        let x1 = (self.right() - 1) as f32;
        let y1 = (self.bottom() - 1) as f32;
        [
            Point2f::new(x0, y0),
            Point2f::new(x1, y0),
            Point2f::new(x1, y1),
            Point2f::new(x0, y1),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RotatedRect {
    pub center: Point2f,
    pub width: f32,
    pub height: f32,
    /// Rotation of the `width` side from +x, degrees.
    pub angle_deg: f32,
}

impl RotatedRect {
    pub fn corners(&self) -> [Point2f; 4] {
        let (s, c) = self.angle_deg.to_radians().sin_cos();
        let u = Vec2f::new(c, s) * (0.5 * self.width);
        let v = Vec2f::new(-s, c) * (0.5 * self.height);
        [
            self.center - u - v,
            self.center + u - v,
            self.center + u + v,
            self.center - u + v,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point2f,
    pub semi_major: f32,
    pub semi_minor: f32,
    /// Major-axis direction from +x, degrees in `(-90, 90]`.
    pub angle_deg: f32,
}

impl Ellipse {
    pub fn sample_points(&self, n: usize) -> Vec<Point2f> {
        let (s, c) = self.angle_deg.to_radians().sin_cos();
        (0..n)
            .map(|i| {
                let t = core::f32::consts::TAU * i as f32 / n as f32;
                let (ts, tc) = t.sin_cos();
                let ex = self.semi_major * tc;
                let ey = self.semi_minor * ts;
                Point2f::new(
                    self.center.x + ex * c - ey * s,
                    self.center.y + ex * s + ey * c,
                )
            })
            .collect()
    }
}
