/// Plain 2D value types in world pixels.
///
/// Both are `Copy`: assigning a position always copies it, so two entities
/// can never share one position by accident.

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Axis-aligned rectangle, top-left origin.
///
/// Overlap is strict: rectangles that only share an edge do not collide.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Rect { x, y, w, h }
    }

    pub fn at(pos: Vec2, size: Vec2) -> Self {
        Rect::new(pos.x, pos.y, size.x, size.y)
    }

    #[inline] pub fn left(&self) -> f32 { self.x }
    #[inline] pub fn right(&self) -> f32 { self.x + self.w }
    #[inline] pub fn top(&self) -> f32 { self.y }
    #[inline] pub fn bottom(&self) -> f32 { self.y + self.h }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && self.right() > other.left()
            && self.top() < other.bottom()
            && self.bottom() > other.top()
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.left() && p.x < self.right() && p.y >= self.top() && p.y < self.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_do_not_overlap() {
        let a = Rect::new(0.0, 0.0, 16.0, 16.0);
        let b = Rect::new(16.0, 0.0, 16.0, 16.0);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&Rect::new(15.9, 0.0, 16.0, 16.0)));
    }

    #[test]
    fn contains_is_half_open() {
        let r = Rect::new(0.0, 0.0, 8.0, 15.0);
        assert!(r.contains(Vec2::new(0.0, 0.0)));
        assert!(!r.contains(Vec2::new(8.0, 3.0)));
        assert!(r.center() == Vec2::new(4.0, 7.5));
    }
}
