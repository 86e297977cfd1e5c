/// A point in frame pixel coordinates. Corners found by a decoder may lie
/// slightly outside the frame, so coordinates are signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Corner quadrilateral of a located code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Quad {
    pub const fn new(
        top_left: Point,
        top_right: Point,
        bottom_right: Point,
        bottom_left: Point,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Center of the quad, rounded toward zero.
    pub fn center(&self) -> Point {
        let corners = self.corners();
        let (sx, sy) = corners
            .iter()
            .fold((0i64, 0i64), |(sx, sy), p| (sx + p.x as i64, sy + p.y as i64));
        Point::new((sx / 4) as i32, (sy / 4) as i32)
    }
}
