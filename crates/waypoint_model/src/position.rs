// SPDX-License-Identifier: MIT OR Apache-2.0
//! Relative placement of hotspots on the background canvas.
//!
//! Positions are fractions of the canvas in `[0, 1]`. Pixel values only
//! exist transiently while converting to or from a [`CanvasSize`] supplied
//! by the layout layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placement errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    /// A relative coordinate falls outside `[0, 1]`
    #[error("Position ({x}, {y}) is outside the unit square")]
    OutOfBounds {
        /// Horizontal fraction
        x: f32,
        /// Vertical fraction
        y: f32,
    },

    /// A pixel coordinate falls outside the canvas
    #[error("Pixel ({x}, {y}) is outside the {width}x{height} canvas")]
    OutsideCanvas {
        /// Horizontal pixel
        x: f32,
        /// Vertical pixel
        y: f32,
        /// Canvas width in pixels
        width: f32,
        /// Canvas height in pixels
        height: f32,
    },

    /// The canvas has no area
    #[error("Canvas has zero or negative size")]
    EmptyCanvas,
}

/// A point expressed as fractions of the canvas size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativePoint {
    /// Horizontal fraction, 0 = left edge
    pub x: f32,
    /// Vertical fraction, 0 = top edge
    pub y: f32,
}

impl RelativePoint {
    /// Create a point without validation
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Center of the canvas
    pub const fn center() -> Self {
        Self::new(0.5, 0.5)
    }

    /// Create from percentages (`0..=100`)
    pub fn from_percent(x: f32, y: f32) -> Self {
        Self::new(x / 100.0, y / 100.0)
    }

    /// Convert a pixel coordinate into a relative point
    pub fn from_pixels(x: f32, y: f32, canvas: CanvasSize) -> Result<Self, PositionError> {
        if !canvas.has_area() {
            return Err(PositionError::EmptyCanvas);
        }
        if !canvas.contains(x, y) {
            return Err(PositionError::OutsideCanvas {
                x,
                y,
                width: canvas.width,
                height: canvas.height,
            });
        }
        Ok(Self::new(x / canvas.width, y / canvas.height))
    }

    /// Project onto a canvas, returning pixel coordinates
    pub fn to_pixels(self, canvas: CanvasSize) -> (f32, f32) {
        (self.x * canvas.width, self.y * canvas.height)
    }

    /// Clamp both coordinates into the unit square
    pub fn clamped(self) -> Self {
        Self::new(self.x.clamp(0.0, 1.0), self.y.clamp(0.0, 1.0))
    }
}

impl Default for RelativePoint {
    fn default() -> Self {
        Self::center()
    }
}

/// Canvas dimensions in pixels, supplied by the layout collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
}

impl CanvasSize {
    /// Create a canvas size
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Whether the canvas has a usable area
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Whether a pixel coordinate lies within the canvas
    pub fn contains(&self, x: f32, y: f32) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }
}

/// Device class a placement variant targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceClass {
    /// Wide layouts
    #[default]
    Desktop,
    /// Narrow layouts
    Mobile,
}

/// Per-device-class placement of a hotspot
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Placement {
    /// Placement used on desktop, and on mobile when no override exists
    pub desktop: RelativePoint,
    /// Optional mobile override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<RelativePoint>,
}

impl Placement {
    /// Same placement on every device class
    pub fn uniform(point: RelativePoint) -> Self {
        Self {
            desktop: point,
            mobile: None,
        }
    }

    /// Set the mobile override
    pub fn with_mobile(mut self, point: RelativePoint) -> Self {
        self.mobile = Some(point);
        self
    }

    /// Resolve the point for a device class
    pub fn resolve(&self, device: DeviceClass) -> RelativePoint {
        match device {
            DeviceClass::Desktop => self.desktop,
            DeviceClass::Mobile => self.mobile.unwrap_or(self.desktop),
        }
    }

    /// Check every variant against the unit square
    pub fn validate(&self) -> Result<(), PositionError> {
        for point in std::iter::once(self.desktop).chain(self.mobile) {
            if !validate_position(point) {
                return Err(PositionError::OutOfBounds {
                    x: point.x,
                    y: point.y,
                });
            }
        }
        Ok(())
    }
}

/// Returns `false` if any coordinate is outside `[0, 1]` or not finite.
///
/// Callers use this to reject a placement before touching any state.
pub fn validate_position(point: RelativePoint) -> bool {
    let in_unit = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
    in_unit(point.x) && in_unit(point.y)
}
