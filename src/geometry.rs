//! Geometric primitives in PDF user space.

/// A rectangle in PDF user space.
///
/// `(x, y)` is the lower-left corner; y grows upwards as in PDF.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// X coordinate of the lower-left corner
    pub x: f32,
    /// Y coordinate of the lower-left corner
    pub y: f32,
    /// Width of rectangle
    pub width: f32,
    /// Height of rectangle
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle from position and dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_autograph::geometry::Rect;
    ///
    /// let rect = Rect::new(36.0, 36.0, 200.0, 50.0);
    /// assert_eq!(rect.right(), 236.0);
    /// assert_eq!(rect.top(), 86.0);
    /// ```
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from the integer values a caller supplies.
    pub fn from_ints(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x as f32, y as f32, width as f32, height as f32)
    }

    /// Left edge x-coordinate.
    pub fn left(&self) -> f32 {
        self.x
    }

    /// Right edge x-coordinate.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate.
    pub fn bottom(&self) -> f32 {
        self.y
    }

    /// Top edge y-coordinate.
    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    /// Whether the box has no drawable area.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Corner form `[llx lly urx ury]` used by `/Rect` arrays.
    pub fn to_corners(&self) -> [f32; 4] {
        [self.left(), self.bottom(), self.right(), self.top()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners() {
        let rect = Rect::from_ints(36, 36, 200, 50);
        assert_eq!(rect.to_corners(), [36.0, 36.0, 236.0, 86.0]);
        assert!(!rect.is_empty());
    }

    #[test]
    fn test_negative_size_is_empty() {
        assert!(Rect::from_ints(0, 0, -5, 10).is_empty());
        assert!(Rect::new(0.0, 0.0, 10.0, 0.0).is_empty());
    }
}
