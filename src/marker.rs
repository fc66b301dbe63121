//! Registered marker shapes.
//!
//! Markers are rasterized into a coverage mask at their native size. The
//! renderer only consumes the opaque pixels of that mask (coverage of at
//! least one half) and the footprint dimensions.

use std::fmt;
use std::str::FromStr;

use imgref::ImgVec;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Subsamples per pixel edge used when estimating coverage.
const SUPERSAMPLING: usize = 4;

/// Marker shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerShape {
    /// Filled disc inscribed in the footprint.
    Circle,
    /// Filled triangle with its apex at the top center.
    TriangleUp,
    /// Filled square covering the footprint.
    Square,
}

impl MarkerShape {
    /// All registered shapes.
    pub const ALL: [Self; 3] = [Self::Circle, Self::TriangleUp, Self::Square];

    /// Footprint (width, height) in pixels at the given marker size.
    #[must_use]
    pub fn dimensions(self, size: u32) -> (usize, usize) {
        let size = size as usize;
        (size, size)
    }

    /// Coverage mask (0-255) at the given marker size, `None` for size 0.
    #[must_use]
    pub fn rasterize(self, size: u32) -> Option<ImgVec<u8>> {
        if size == 0 {
            return None;
        }
        let (width, height) = self.dimensions(size);
        let s = size as f64;
        let samples = (SUPERSAMPLING * SUPERSAMPLING) as f64;

        let mut pixels = Vec::with_capacity(width * height);
        for py in 0..height {
            for px in 0..width {
                let mut hits = 0usize;
                for sy in 0..SUPERSAMPLING {
                    for sx in 0..SUPERSAMPLING {
                        let x = px as f64 + (sx as f64 + 0.5) / SUPERSAMPLING as f64;
                        let y = py as f64 + (sy as f64 + 0.5) / SUPERSAMPLING as f64;
                        if self.contains(x, y, s) {
                            hits += 1;
                        }
                    }
                }
                pixels.push((255.0 * hits as f64 / samples).round() as u8);
            }
        }
        Some(ImgVec::new(pixels, width, height))
    }

    /// Pixels whose coverage is at least one half, `None` for size 0.
    #[must_use]
    pub fn opaque_mask(self, size: u32) -> Option<ImgVec<bool>> {
        let coverage = self.rasterize(size)?;
        let (width, height) = (coverage.width(), coverage.height());
        let mask = coverage.pixels().map(|c| f64::from(c) / 255.0 >= 0.5).collect();
        Some(ImgVec::new(mask, width, height))
    }

    /// Number of opaque pixels at the given size.
    #[must_use]
    pub fn opaque_pixel_count(self, size: u32) -> usize {
        self.opaque_mask(size)
            .map_or(0, |mask| mask.pixels().filter(|&p| p).count())
    }

    /// Stable name used in configs and on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::TriangleUp => "triangle-up",
            Self::Square => "square",
        }
    }

    /// Point-in-shape test in footprint coordinates (y grows downwards).
    fn contains(self, x: f64, y: f64, size: f64) -> bool {
        match self {
            Self::Circle => {
                let r = size / 2.0;
                let (dx, dy) = (x - r, y - r);
                dx * dx + dy * dy <= r * r
            }
            Self::TriangleUp => {
                // Apex (size/2, 0), base from (0, size) to (size, size).
                if y > size {
                    return false;
                }
                let half_width = 0.5 * y;
                (x - size / 2.0).abs() <= half_width
            }
            Self::Square => x <= size && y <= size,
        }
    }
}

impl fmt::Display for MarkerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MarkerShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownMarker(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_is_fully_opaque() {
        assert_eq!(MarkerShape::Square.opaque_pixel_count(5), 25);
        assert!(MarkerShape::Square.rasterize(3).unwrap().pixels().all(|c| c == 255));
    }

    #[test]
    fn test_circle_corners_are_transparent() {
        let mask = MarkerShape::Circle.opaque_mask(8).unwrap();
        let pixels: Vec<bool> = mask.pixels().collect();
        assert!(!pixels[0]);
        assert!(!pixels[7]);
        assert!(pixels[3 * 8 + 3]);
        let count = MarkerShape::Circle.opaque_pixel_count(8);
        // pi * 4^2 ~= 50
        assert!((44..=56).contains(&count), "count = {count}");
    }

    #[test]
    fn test_triangle_apex_and_base() {
        let mask = MarkerShape::TriangleUp.opaque_mask(9).unwrap();
        let rows: Vec<Vec<bool>> = mask.rows().map(|r| r.to_vec()).collect();
        assert!(!rows[0][0]);
        assert!(rows[8].iter().filter(|&&p| p).count() >= 7);
        let area = MarkerShape::TriangleUp.opaque_pixel_count(9);
        assert!((30..=50).contains(&area), "area = {area}");
    }

    #[test]
    fn test_marker_names_round_trip() {
        for marker in MarkerShape::ALL {
            assert_eq!(marker.to_string().parse::<MarkerShape>().unwrap(), marker);
        }
        assert!(matches!(
            "star".parse::<MarkerShape>(),
            Err(Error::UnknownMarker(_))
        ));
    }

    #[test]
    fn test_zero_size_marker() {
        for marker in MarkerShape::ALL {
            assert_eq!(marker.opaque_pixel_count(0), 0);
            assert!(marker.rasterize(0).is_none());
            assert!(marker.opaque_mask(0).is_none());
            assert_eq!(marker.dimensions(0), (0, 0));
        }
    }
}
