//! Typed option values and their coercion from raw text

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::glyph::Glyph;
use crate::pins::ResolvedPin;
use crate::schema::{Bounds, ValueKind};

/// RGB colour, each channel floored and clamped to 0..=255
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    /// Pack into the 16-bit RGB565 format used by the display
    pub const fn rgb565(self) -> u16 {
        ((self.r as u16 / 8) << 11) | ((self.g as u16 / 4) << 5) | (self.b as u16 / 8)
    }
}

/// Screen rectangle in pixels, right/bottom exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Check whether the rectangle lies within a `width` x `height` screen
    pub fn fits_screen(&self, width: i32, height: i32) -> bool {
        self.right <= width && self.bottom <= height
    }
}

/// Touch panel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A coerced option value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Float(f64),
    Int(i64),
    Bool(bool),
    Pin(ResolvedPin),
    Pins(Vec<ResolvedPin>),
    Floats(Vec<f64>),
    List(Vec<String>),
    Color(Color),
    Rect(Rect),
    Points(Vec<Point>),
    Glyph(Glyph),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Float view; integers widen
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_pin(&self) -> Option<&ResolvedPin> {
        match self {
            Value::Pin(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_pins(&self) -> Option<&[ResolvedPin]> {
        match self {
            Value::Pins(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Value::Floats(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match *self {
            Value::Color(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_rect(&self) -> Option<Rect> {
        match *self {
            Value::Rect(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_points(&self) -> Option<&[Point]> {
        match self {
            Value::Points(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_glyph(&self) -> Option<&Glyph> {
        match self {
            Value::Glyph(g) => Some(g),
            _ => None,
        }
    }
}

/// Why a raw value was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoerceError {
    /// Not parseable as the declared type
    Invalid(String),
    /// Parsed, but outside the declared bounds
    OutOfRange(String),
}

impl fmt::Display for CoerceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoerceError::Invalid(m) | CoerceError::OutOfRange(m) => f.write_str(m),
        }
    }
}

/// Coerce a raw value that does not involve pins
///
/// Pin kinds need the alias table and are resolved by the loader;
/// passing one here is a bug in the caller and reports `Invalid`.
pub fn coerce(kind: &ValueKind, raw: &str) -> Result<Value, CoerceError> {
    match kind {
        ValueKind::Str | ValueKind::Aliases => Ok(Value::Str(raw.trim().to_string())),
        ValueKind::Text => Ok(Value::Str(raw.to_string())),
        ValueKind::Float(bounds) => {
            let v = parse_float(raw)?;
            check_bounds(v, bounds)?;
            Ok(Value::Float(v))
        }
        ValueKind::Int(bounds) => {
            let v = parse_int(raw)?;
            check_bounds(v as f64, bounds)?;
            Ok(Value::Int(v))
        }
        ValueKind::Bool => parse_bool(raw).map(Value::Bool),
        ValueKind::Choice(choices) => {
            let word = raw.trim();
            if choices.contains(&word) {
                Ok(Value::Str(word.to_string()))
            } else {
                Err(CoerceError::Invalid(format!(
                    "choice '{}' is not valid, expected one of: {}",
                    word,
                    choices.join(", ")
                )))
            }
        }
        ValueKind::FloatList { count } => {
            let values = split_list(raw)
                .map(parse_float)
                .collect::<Result<Vec<_>, _>>()?;
            check_arity(values.len(), *count)?;
            Ok(Value::Floats(values))
        }
        ValueKind::List => Ok(Value::List(split_list(raw).map(ToString::to_string).collect())),
        ValueKind::GearRatio => parse_gear_ratio(raw).map(Value::Float),
        ValueKind::Color => parse_color(raw).map(Value::Color),
        ValueKind::Rect => parse_rect(raw).map(Value::Rect),
        ValueKind::Points => parse_points(raw).map(Value::Points),
        ValueKind::Glyph => Glyph::parse(raw)
            .map(Value::Glyph)
            .map_err(|e| CoerceError::Invalid(e.to_string())),
        ValueKind::Pin(_) | ValueKind::PinList { .. } => {
            Err(CoerceError::Invalid("pin values need an alias table".to_string()))
        }
    }
}

/// Split a comma separated list, dropping empty items
pub fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn check_arity(found: usize, expected: Option<usize>) -> Result<(), CoerceError> {
    match expected {
        Some(n) if n != found => Err(CoerceError::Invalid(format!(
            "expected {} values, found {}",
            n, found
        ))),
        _ => Ok(()),
    }
}

fn parse_float(raw: &str) -> Result<f64, CoerceError> {
    let text = raw.trim();
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CoerceError::Invalid(format!("'{}' is not a number", text))),
    }
}

fn parse_int(raw: &str) -> Result<i64, CoerceError> {
    let text = raw.trim();
    text.parse::<i64>()
        .map_err(|_| CoerceError::Invalid(format!("'{}' is not an integer", text)))
}

/// Boolean words accepted by configparser
fn parse_bool(raw: &str) -> Result<bool, CoerceError> {
    let text = raw.trim();
    match text.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(CoerceError::Invalid(format!("'{}' is not a boolean", text))),
    }
}

/// Apply schema bounds
pub fn check_bounds(v: f64, bounds: &Bounds) -> Result<(), CoerceError> {
    if let Some(min) = bounds.min {
        if v < min {
            return Err(CoerceError::OutOfRange(format!("must have minimum of {}", min)));
        }
    }
    if let Some(max) = bounds.max {
        if v > max {
            return Err(CoerceError::OutOfRange(format!("must have maximum of {}", max)));
        }
    }
    if let Some(above) = bounds.above {
        if v <= above {
            return Err(CoerceError::OutOfRange(format!("must be above {}", above)));
        }
    }
    if let Some(below) = bounds.below {
        if v >= below {
            return Err(CoerceError::OutOfRange(format!("must be below {}", below)));
        }
    }
    Ok(())
}

/// Floor towards negative infinity without `std`
pub(crate) fn floor_i64(v: f64) -> i64 {
    let truncated = v as i64;
    if (truncated as f64) > v {
        truncated - 1
    } else {
        truncated
    }
}

/// Parse comma separated numbers floored to integers
fn floored(raw: &str, what: &str) -> Result<Vec<i64>, CoerceError> {
    raw.split(',')
        .map(|p| {
            let p = p.trim();
            p.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(floor_i64)
                .ok_or_else(|| CoerceError::Invalid(format!("malformed {} '{}'", what, raw.trim())))
        })
        .collect()
}

/// Multiply out `driven:driving` pairs
fn parse_gear_ratio(raw: &str) -> Result<f64, CoerceError> {
    let mut ratio = 1.0;
    for pair in split_list(raw) {
        let parsed = pair.split_once(':').and_then(|(driven, driving)| {
            let driven = driven.trim().parse::<f64>().ok()?;
            let driving = driving.trim().parse::<f64>().ok()?;
            (driven > 0.0 && driving > 0.0 && driven.is_finite() && driving.is_finite())
                .then_some(driven / driving)
        });
        match parsed {
            Some(r) => ratio *= r,
            None => {
                return Err(CoerceError::Invalid(format!("invalid gear ratio '{}'", pair)))
            }
        }
    }
    Ok(ratio)
}

fn parse_color(raw: &str) -> Result<Color, CoerceError> {
    let parts = floored(raw, "color")?;
    let [r, g, b] = parts[..] else {
        return Err(CoerceError::Invalid(format!("malformed color '{}'", raw.trim())));
    };
    let channel = |v: i64| v.clamp(0, 255) as u8;
    Ok(Color {
        r: channel(r),
        g: channel(g),
        b: channel(b),
    })
}

fn parse_rect(raw: &str) -> Result<Rect, CoerceError> {
    let parts = floored(raw, "rectangle")?;
    let [left, top, right, bottom] = parts[..] else {
        return Err(CoerceError::Invalid(format!("malformed rectangle '{}'", raw.trim())));
    };
    let to_i32 = |v: i64| i32::try_from(v).ok();
    let (Some(left), Some(top), Some(right), Some(bottom)) =
        (to_i32(left), to_i32(top), to_i32(right), to_i32(bottom))
    else {
        return Err(CoerceError::OutOfRange(format!("rectangle '{}' outside display", raw.trim())));
    };
    if left < 0 || top < 0 {
        return Err(CoerceError::OutOfRange(format!("rectangle '{}' outside display", raw.trim())));
    }
    if right <= left || bottom <= top {
        return Err(CoerceError::OutOfRange(format!("rectangle '{}' is empty", raw.trim())));
    }
    Ok(Rect {
        left,
        top,
        right,
        bottom,
    })
}

fn parse_points(raw: &str) -> Result<Vec<Point>, CoerceError> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let parts = floored(line, "coordinate")?;
            match parts[..] {
                [x, y] => match (i32::try_from(x), i32::try_from(y)) {
                    (Ok(x), Ok(y)) => Ok(Point { x, y }),
                    _ => Err(CoerceError::OutOfRange(format!("coordinate '{}' too large", line))),
                },
                _ => Err(CoerceError::Invalid(format!("malformed coordinate '{}'", line))),
            }
        })
        .collect()
}
