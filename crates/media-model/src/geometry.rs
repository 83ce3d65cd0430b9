//! Frame geometry: sizes, crop rectangles and 2-D affine transforms.
//!
//! Pixel coordinates have their origin at the top-left corner with `y`
//! growing downwards, so a positive rotation turns the picture clockwise
//! on screen.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use splice_common::error::{SpliceError, SpliceResult};

const EPSILON: f64 = 1e-9;

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn swapped(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Width over height. Zero for an empty size.
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An integer pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// A `w:h` aspect ratio with non-zero integer terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    pub fn value(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl FromStr for AspectRatio {
    type Err = SpliceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            SpliceError::invalid_parameter(format!(
                "aspect ratio must match <digits>:<digits>, got {s:?}"
            ))
        };
        let (w, h) = s.split_once(':').ok_or_else(invalid)?;
        let is_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(w) || !is_digits(h) {
            return Err(invalid());
        }
        let width = w.parse::<u32>().map_err(|_| invalid())?;
        let height = h.parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(SpliceError::invalid_parameter(format!(
                "aspect ratio terms must be non-zero, got {s:?}"
            )));
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// A 2×3 affine transform.
///
/// Maps `(x, y)` to `(a·x + c·y + tx, b·x + d·y + ty)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

/// A rotation that is a whole number of clockwise quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarterTurn {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl QuarterTurn {
    /// Normalize a multiple of 90 degrees (any sign) to a quarter turn.
    pub fn from_degrees(degrees: i32) -> SpliceResult<Self> {
        if degrees % 90 != 0 {
            return Err(SpliceError::invalid_parameter(format!(
                "rotation must be a multiple of 90 degrees, got {degrees}"
            )));
        }
        Ok(match degrees.rem_euclid(360) {
            0 => Self::None,
            90 => Self::Cw90,
            180 => Self::Cw180,
            _ => Self::Cw270,
        })
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    /// Whether the turn exchanges width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Cw90 | Self::Cw270)
    }

    /// Exact `(cos, sin)` so quarter turns never pick up float noise.
    fn cos_sin(self) -> (f64, f64) {
        match self {
            Self::None => (1.0, 0.0),
            Self::Cw90 => (0.0, 1.0),
            Self::Cw180 => (-1.0, 0.0),
            Self::Cw270 => (0.0, -1.0),
        }
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Pure rotation about the origin.
    pub fn rotation(turn: QuarterTurn) -> Self {
        let (cos, sin) = turn.cos_sin();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    /// Apply `self` first, then `then`.
    pub fn then(&self, then: &Affine) -> Affine {
        Affine {
            a: self.a * then.a + self.b * then.c,
            b: self.a * then.b + self.b * then.d,
            c: self.c * then.a + self.d * then.c,
            d: self.c * then.b + self.d * then.d,
            tx: self.tx * then.a + self.ty * then.c + then.tx,
            ty: self.tx * then.b + self.ty * then.d + then.ty,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    pub fn is_identity(&self) -> bool {
        self.approx_eq(&Self::IDENTITY)
    }

    pub fn approx_eq(&self, other: &Affine) -> bool {
        [
            (self.a, other.a),
            (self.b, other.b),
            (self.c, other.c),
            (self.d, other.d),
            (self.tx, other.tx),
            (self.ty, other.ty),
        ]
        .iter()
        .all(|(l, r)| (l - r).abs() < EPSILON)
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of a `size` frame mapped
    /// through this transform.
    pub fn bounds(&self, size: Size) -> (f64, f64, f64, f64) {
        let (w, h) = (size.width as f64, size.height as f64);
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(w, 0.0),
            self.apply(0.0, h),
            self.apply(w, h),
        ];
        corners.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(min_x, min_y, max_x, max_y), (x, y)| {
                (min_x.min(*x), min_y.min(*y), max_x.max(*x), max_y.max(*y))
            },
        )
    }

    /// Size of a `size` frame after this transform, rounded to whole pixels.
    pub fn transformed_size(&self, size: Size) -> Size {
        let (min_x, min_y, max_x, max_y) = self.bounds(size);
        Size::new(
            (max_x - min_x).round().max(0.0) as u32,
            (max_y - min_y).round().max(0.0) as u32,
        )
    }

    /// Shift the transform so a `size` frame lands with its top-left bound at
    /// the origin.
    pub fn anchored(&self, size: Size) -> Affine {
        let (min_x, min_y, _, _) = self.bounds(size);
        self.then(&Affine::translation(-min_x, -min_y))
    }

    /// The quarter turn and per-axis scale of the linear part, when the
    /// transform is a quarter-turn rotation followed by a positive scale.
    pub fn decompose(&self) -> Option<(QuarterTurn, f64, f64)> {
        let zero = |v: f64| v.abs() < EPSILON;
        if zero(self.b) && zero(self.c) {
            match (self.a > 0.0, self.d > 0.0) {
                (true, true) => Some((QuarterTurn::None, self.a, self.d)),
                (false, false) => Some((QuarterTurn::Cw180, -self.a, -self.d)),
                _ => None,
            }
        } else if zero(self.a) && zero(self.d) {
            // rotate(90) = [0 -1; 1 0]; scaling afterwards multiplies the
            // output axes: c = -sx, b = sy.
            match (self.c < 0.0, self.b > 0.0) {
                (true, true) => Some((QuarterTurn::Cw90, -self.c, self.b)),
                (false, false) => Some((QuarterTurn::Cw270, self.c, -self.b)),
                _ => None,
            }
        } else {
            None
        }
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Compose `base` with an optional rotation, scale and translation, applied
/// in that fixed order: rotate, then scale, then translate.
pub fn compose_affine(
    base: Affine,
    rotation_degrees: Option<i32>,
    scale: Option<(f64, f64)>,
    translate: Option<(f64, f64)>,
) -> SpliceResult<Affine> {
    let mut out = base;
    if let Some(degrees) = rotation_degrees {
        out = out.then(&Affine::rotation(QuarterTurn::from_degrees(degrees)?));
    }
    if let Some((sx, sy)) = scale {
        if !(sx.is_finite() && sy.is_finite() && sx > 0.0 && sy > 0.0) {
            return Err(SpliceError::invalid_parameter(format!(
                "scale factors must be positive, got ({sx}, {sy})"
            )));
        }
        out = out.then(&Affine::scale(sx, sy));
    }
    if let Some((tx, ty)) = translate {
        out = out.then(&Affine::translation(tx, ty));
    }
    Ok(out)
}

/// Overscale factors that fill a `target_ratio` viewport with the source
/// while preserving its proportions; the overflowing axis is cropped
/// evenly on both sides once the frame is centered.
///
/// The pair is `(x, y)`. A source wider than the target overflows
/// horizontally, so it gets `(source_ratio / target_ratio, 1.0)`; a taller
/// one gets `(1.0, target_ratio / source_ratio)`.
///
/// Returns `(1.0, 1.0)` when the ratios already match.
pub fn aspect_ratio_fit(source_w: u32, source_h: u32, target_ratio: f64) -> (f64, f64) {
    let source_ratio = Size::new(source_w, source_h).aspect();
    if source_ratio <= 0.0 || target_ratio <= 0.0 {
        return (1.0, 1.0);
    }
    if source_ratio > target_ratio {
        (source_ratio / target_ratio, 1.0)
    } else {
        (1.0, target_ratio / source_ratio)
    }
}

/// Source region left visible when a `source_w × source_h` frame is
/// overscaled by `fit` (from [`aspect_ratio_fit`]) and centered.
pub fn visible_region_for_fit(source_w: u32, source_h: u32, fit: (f64, f64)) -> Rect {
    let width = (source_w as f64 / fit.0).round() as u32;
    let height = (source_h as f64 / fit.1).round() as u32;
    Rect {
        x: (source_w - width.min(source_w)) / 2,
        y: (source_h - height.min(source_h)) / 2,
        width,
        height,
    }
}

/// Largest centered rectangle of `target_ratio` inside the source frame.
pub fn centered_crop_rect(source_w: u32, source_h: u32, target_ratio: f64) -> Rect {
    let source_ratio = Size::new(source_w, source_h).aspect();
    let (width, height) = if source_ratio > target_ratio {
        let w = (source_h as f64 * target_ratio).round() as u32;
        (w.min(source_w), source_h)
    } else {
        let h = (source_w as f64 / target_ratio).round() as u32;
        (source_w, h.min(source_h))
    };
    Rect {
        x: (source_w - width) / 2,
        y: (source_h - height) / 2,
        width,
        height,
    }
}
