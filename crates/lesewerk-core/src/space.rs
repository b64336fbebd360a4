// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page coordinate spaces and the transform into the display frame.
//
// Every box Lesewerk handles is tagged with the frame it was produced in. The
// display frame (upright page, top-left origin, points) is the common frame
// used for comparison and output.

use serde::{Deserialize, Serialize};

use crate::geometry::Rectangle;

/// PostScript points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Where the frame's origin sits on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Raster images and the display frame: y grows downwards.
    TopLeft,
    /// PDF user space: y grows upwards.
    BottomLeft,
}

/// Unit of the frame's coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Unit {
    Points,
    /// Raster pixels. `dpi` is `None` when the rendering resolution is unknown.
    Pixels { dpi: Option<f64> },
}

/// Clockwise quarter-turn still to be applied for the page to appear upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl Rotation {
    /// Parse a PDF `/Rotate` value. Negative values are normalised; values
    /// that are not multiples of 90 are rejected.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::None),
            90 => Some(Self::Clockwise90),
            180 => Some(Self::Clockwise180),
            270 => Some(Self::Clockwise270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::Clockwise90 => 90,
            Self::Clockwise180 => 180,
            Self::Clockwise270 => 270,
        }
    }

    /// Whether width and height swap when the rotation is applied.
    pub fn is_quarter_turn(&self) -> bool {
        matches!(self, Self::Clockwise90 | Self::Clockwise270)
    }
}

/// The reference frame one page's boxes were produced in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageCoordinateSpace {
    pub origin: Origin,
    pub unit: Unit,
    /// Frame extent in its own units and its own (unrotated) orientation.
    pub width: f64,
    pub height: f64,
    pub rotation: Rotation,
}

impl PageCoordinateSpace {
    /// PDF user space of a page whose crop box is `width` x `height` points,
    /// shifted so the crop box's lower-left corner is the origin.
    pub fn pdf_user_space(width: f64, height: f64, rotation: Rotation) -> Self {
        Self {
            origin: Origin::BottomLeft,
            unit: Unit::Points,
            width,
            height,
            rotation,
        }
    }

    /// A raster image rendered upright.
    pub fn image(width_px: u32, height_px: u32, dpi: Option<f64>) -> Self {
        Self {
            origin: Origin::TopLeft,
            unit: Unit::Pixels { dpi },
            width: width_px as f64,
            height: height_px as f64,
            rotation: Rotation::None,
        }
    }

    /// The display frame of a page `width` x `height` points as viewed.
    pub fn display(width: f64, height: f64) -> Self {
        Self {
            origin: Origin::TopLeft,
            unit: Unit::Points,
            width,
            height,
            rotation: Rotation::None,
        }
    }

    /// Points per frame unit, when known.
    pub fn points_per_unit(&self) -> Option<f64> {
        match self.unit {
            Unit::Points => Some(1.0),
            Unit::Pixels { dpi: Some(dpi) } if dpi > 0.0 => Some(POINTS_PER_INCH / dpi),
            Unit::Pixels { .. } => None,
        }
    }

    /// Extent after scaling by `scale` and applying the rotation.
    pub fn display_size(&self, scale: f64) -> (f64, f64) {
        let (w, h) = (self.width * scale, self.height * scale);
        if self.rotation.is_quarter_turn() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// Aspect ratio (height / width) as the page is viewed.
    pub fn display_aspect(&self) -> f64 {
        let (w, h) = self.display_size(1.0);
        if w <= 0.0 { 0.0 } else { h / w }
    }

    /// Whether this frame is already upright, top-left and unscaled.
    pub fn is_display_frame(&self) -> bool {
        self.origin == Origin::TopLeft
            && self.rotation == Rotation::None
            && self.unit == Unit::Points
    }

    /// Map a rectangle from this frame into the display frame.
    ///
    /// `scale` converts frame units into output units (for example `72 / dpi`
    /// for pixels); the origin is flipped to top-left and the rotation is
    /// applied clockwise.
    pub fn to_display(&self, rect: &Rectangle, scale: f64) -> Rectangle {
        let w = self.width * scale;
        let h = self.height * scale;
        let r = rect.rescale(scale, scale);

        let r = match self.origin {
            Origin::TopLeft => r,
            Origin::BottomLeft => Rectangle::new(r.x_min, h - r.y_max, r.x_max, h - r.y_min),
        };

        match self.rotation {
            Rotation::None => r,
            // (x, y) -> (h - y, x)
            Rotation::Clockwise90 => Rectangle::new(h - r.y_max, r.x_min, h - r.y_min, r.x_max),
            // (x, y) -> (w - x, h - y)
            Rotation::Clockwise180 => {
                Rectangle::new(w - r.x_max, h - r.y_max, w - r.x_min, h - r.y_min)
            }
            // (x, y) -> (y, w - x)
            Rotation::Clockwise270 => Rectangle::new(r.y_min, w - r.x_max, r.y_max, w - r.x_min),
        }
    }
}

impl std::fmt::Display for PageCoordinateSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let unit = match self.unit {
            Unit::Points => "pt".to_string(),
            Unit::Pixels { dpi: Some(dpi) } => format!("px@{dpi}dpi"),
            Unit::Pixels { dpi: None } => "px".to_string(),
        };
        write!(
            f,
            "{}x{}{} {:?} rot{}",
            self.width,
            self.height,
            unit,
            self.origin,
            self.rotation.degrees()
        )
    }
}
