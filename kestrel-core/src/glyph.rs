//! Monochrome bitmaps drawn as ASCII art
//!
//! ```text
//! button0_glyph:
//!   ..**..
//!   .****.
//!   ******
//! ```
//!
//! `.` or `0` is an unset pixel, `*` or `1` a set one. Rows are packed MSB
//! first into `ceil(width / 8)` bytes, padding bits zero.

use alloc::vec::Vec;
use core::fmt;

/// Glyph parse errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GlyphError {
    /// No non-blank rows
    Empty,
    /// Row (1-based) has a different width or an invalid character
    InvalidRow(usize),
}

impl fmt::Display for GlyphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlyphError::Empty => f.write_str("glyph has no rows"),
            GlyphError::InvalidRow(row) => write!(f, "invalid glyph line {}", row),
        }
    }
}

/// Packed glyph bitmap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Glyph {
    /// Parse a multi-line glyph value
    ///
    /// Blank lines are skipped; leading and trailing whitespace of each row
    /// is ignored.
    pub fn parse(text: &str) -> Result<Self, GlyphError> {
        let mut width = None;
        let mut height = 0;
        let mut data = Vec::new();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            height += 1;
            let row_width = line.chars().count();
            let width = *width.get_or_insert(row_width);
            if row_width != width {
                return Err(GlyphError::InvalidRow(height));
            }

            let start = data.len();
            data.resize(start + width.div_ceil(8), 0);
            for (x, c) in line.chars().enumerate() {
                let on = match c {
                    '*' | '1' => true,
                    '.' | '0' => false,
                    _ => return Err(GlyphError::InvalidRow(height)),
                };
                if on {
                    data[start + x / 8] |= 0x80 >> (x % 8);
                }
            }
        }

        match width {
            Some(width) => Ok(Self {
                width,
                height,
                data,
            }),
            None => Err(GlyphError::Empty),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes per packed row
    pub fn stride(&self) -> usize {
        self.width.div_ceil(8)
    }

    /// Packed bytes of one row
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        let stride = self.stride();
        self.data.get(y * stride..(y + 1) * stride)
    }

    /// Check a single pixel
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= self.width {
            return false;
        }
        self.row(y)
            .map(|row| row[x / 8] & (0x80 >> (x % 8)) != 0)
            .unwrap_or(false)
    }

    /// Complete packed bitmap
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
