//! Display helpers: rotation, orientation, and density conversion.

/// Rotation of the display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceRotation {
    /// Natural orientation.
    #[default]
    Rotation0,
    /// Rotated a quarter turn.
    Rotation90,
    /// Upside down.
    Rotation180,
    /// Rotated three quarter turns.
    Rotation270,
}

impl SurfaceRotation {
    /// Map a platform surface constant (0..=3). Unknown values map to
    /// [`SurfaceRotation::Rotation0`].
    pub const fn from_surface(value: i32) -> Self {
        match value {
            1 => Self::Rotation90,
            2 => Self::Rotation180,
            3 => Self::Rotation270,
            _ => Self::Rotation0,
        }
    }

    /// Rotation in degrees.
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Rotation0 => 0,
            Self::Rotation90 => 90,
            Self::Rotation180 => 180,
            Self::Rotation270 => 270,
        }
    }

    /// Whether width and height swap relative to the natural orientation.
    pub const fn is_sideways(self) -> bool {
        matches!(self, Self::Rotation90 | Self::Rotation270)
    }
}

/// Screen orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Taller than wide.
    Portrait,
    /// Wider than tall.
    Landscape,
    /// Square, or not known.
    Unspecified,
}

/// Size and pixel density of a display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMetrics {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixels per density-independent pixel (1.0 at 160 dpi).
    pub density: f32,
}

impl DisplayMetrics {
    /// Create display metrics.
    pub const fn new(width: u32, height: u32, density: f32) -> Self {
        Self { width, height, density }
    }

    /// Width and height in pixels.
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Size after applying a surface rotation.
    pub const fn rotated_size(&self, rotation: SurfaceRotation) -> (u32, u32) {
        if rotation.is_sideways() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Orientation implied by the current size.
    pub const fn orientation(&self) -> Orientation {
        if self.height > self.width {
            Orientation::Portrait
        } else if self.width > self.height {
            Orientation::Landscape
        } else {
            Orientation::Unspecified
        }
    }

    /// Convert density-independent pixels to whole pixels, rounding half up.
    #[allow(clippy::cast_possible_truncation)]
    pub fn dp_to_px(&self, dp: f32) -> i32 {
        dp.mul_add(self.density, 0.5) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_degrees() {
        let degrees: Vec<u16> = (0..4).map(|v| SurfaceRotation::from_surface(v).degrees()).collect();
        assert_eq!(degrees, vec![0, 90, 180, 270]);
        assert_eq!(SurfaceRotation::from_surface(7), SurfaceRotation::Rotation0);
        assert_eq!(SurfaceRotation::from_surface(-1).degrees(), 0);
    }

    #[test]
    fn test_dp_to_px_rounds_half_up() {
        let metrics = DisplayMetrics::new(1080, 1920, 2.625);
        assert_eq!(metrics.dp_to_px(16.0), 42);
        assert_eq!(metrics.dp_to_px(1.0), 3);
        assert_eq!(DisplayMetrics::new(480, 800, 1.5).dp_to_px(1.0), 2);
        assert_eq!(DisplayMetrics::new(320, 480, 1.0).dp_to_px(0.0), 0);
    }

    #[test]
    fn test_orientation_and_rotation() {
        let metrics = DisplayMetrics::new(1080, 1920, 3.0);
        assert_eq!(metrics.orientation(), Orientation::Portrait);
        assert_eq!(metrics.rotated_size(SurfaceRotation::Rotation90), (1920, 1080));
        assert_eq!(metrics.rotated_size(SurfaceRotation::Rotation180), metrics.size());
        assert_eq!(DisplayMetrics::new(10, 10, 1.0).orientation(), Orientation::Unspecified);
        assert_eq!(DisplayMetrics::new(20, 10, 1.0).orientation(), Orientation::Landscape);
    }
}
