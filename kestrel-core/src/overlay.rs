//! SAVE_CONFIG calibration block
//!
//! Calibration routines (PID tuning, probe offset, input shaper
//! measurement) never rewrite the user-authored document. Their results live
//! in an auto-generated block at the end of the file:
//!
//! ```text
//! #*# <---------------------- SAVE_CONFIG ---------------------->
//! #*# DO NOT EDIT THIS BLOCK OR BELOW. The contents are auto-generated.
//! #*#
//! #*# [extruder]
//! #*# control = pid
//! #*# pid_kp = 22.200
//! #*# checksum = 3b1c5e0a
//! ```
//!
//! The checksum is a CRC-32 over the body lines (everything between the
//! banner and the checksum line). A block whose checksum does not match was
//! edited by hand and is rejected.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::document::{self, RawOption, RawSection, SectionId};
use crate::error::ConfigError;
use crate::schema;

/// First line of the auto-generated block
pub const SENTINEL: &str = "#*# <---------------------- SAVE_CONFIG ---------------------->";

/// Second line of the auto-generated block
pub const BANNER: &str =
    "#*# DO NOT EDIT THIS BLOCK OR BELOW. The contents are auto-generated.";

/// Prefix of every line inside the block
pub const LINE_PREFIX: &str = "#*#";

/// Key of the closing integrity line
const CHECKSUM_KEY: &str = "checksum = ";

/// Calibration values to be written into the SAVE_CONFIG block
///
/// Sections and options keep insertion order so that saving an unchanged
/// overlay reproduces the block exactly.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationOverlay {
    sections: Vec<RawSection>,
}

impl CalibrationOverlay {
    /// Create an empty overlay
    pub const fn new() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    /// Check if the overlay holds no values
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.options.is_empty())
    }

    /// Sections in the overlay
    pub fn sections(&self) -> &[RawSection] {
        &self.sections
    }

    /// Get a saved value
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let id = SectionId::parse(section)?;
        self.sections
            .iter()
            .find(|s| s.id == id)?
            .get(&key.to_lowercase())
            .map(|o| o.value.as_str())
    }

    /// Set a value, replacing any previous value for the same option
    ///
    /// `section` is the header text, e.g. "extruder" or "heater_fan fan1".
    /// Returns false if the section header is empty.
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> bool {
        let Some(id) = SectionId::parse(section) else {
            return false;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim().to_string();

        let index = match self.sections.iter().position(|s| s.id == id) {
            Some(index) => index,
            None => {
                self.sections.push(RawSection::new(id, 0));
                self.sections.len() - 1
            }
        };
        let target = &mut self.sections[index];
        match target.get_mut(&key) {
            Some(option) => option.value = value,
            None => target.options.push(RawOption {
                key,
                value,
                line: 0,
            }),
        }
        true
    }

    /// Remove a value
    ///
    /// Sections left without options are dropped. Returns true if the value
    /// was present.
    pub fn remove(&mut self, section: &str, key: &str) -> bool {
        let Some(id) = SectionId::parse(section) else {
            return false;
        };
        let key = key.to_lowercase();
        let Some(index) = self.sections.iter().position(|s| s.id == id) else {
            return false;
        };
        let target = &mut self.sections[index];
        let before = target.options.len();
        target.options.retain(|o| o.key != key);
        let removed = target.options.len() != before;
        if target.options.is_empty() {
            self.sections.remove(index);
        }
        removed
    }

    /// Compare saved values, ignoring line numbers
    pub fn same_values(&self, other: &CalibrationOverlay) -> bool {
        let mine = self.sections.iter().filter(|s| !s.options.is_empty());
        let theirs = other.sections.iter().filter(|s| !s.options.is_empty());
        mine.clone().count() == theirs.clone().count()
            && mine.zip(theirs).all(|(a, b)| {
                a.id == b.id
                    && a.options.len() == b.options.len()
                    && a
                        .options
                        .iter()
                        .zip(&b.options)
                        .all(|(x, y)| x.key == y.key && x.value == y.value)
            })
    }

    /// Render the complete SAVE_CONFIG block, checksum included
    pub fn render(&self) -> String {
        let mut body: Vec<String> = Vec::new();
        for section in self.sections.iter().filter(|s| !s.options.is_empty()) {
            body.push(LINE_PREFIX.to_string());
            body.push(format!("{} [{}]", LINE_PREFIX, section.id));
            for option in &section.options {
                if option.value.contains('\n') {
                    body.push(format!("{} {} =", LINE_PREFIX, option.key));
                    for line in option.value.lines() {
                        body.push(format!("{} \t{}", LINE_PREFIX, line));
                    }
                } else {
                    body.push(format!("{} {} = {}", LINE_PREFIX, option.key, option.value));
                }
            }
        }

        let mut out = String::new();
        out.push_str(SENTINEL);
        out.push('\n');
        out.push_str(BANNER);
        out.push('\n');
        for line in &body {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&format!(
            "{} {}{:08x}\n",
            LINE_PREFIX,
            CHECKSUM_KEY,
            body_checksum(body.iter().map(String::as_str))
        ));
        out
    }

    /// Merge the saved values into the base sections
    ///
    /// Each overlay section must exist in the base, and each option must be
    /// one the base section's schema accepts; saved values replace base
    /// values for the same option.
    pub fn merge_into(&self, base: &mut [RawSection]) -> Result<(), ConfigError> {
        for section in &self.sections {
            let Some(target) = base.iter_mut().find(|s| s.id == section.id) else {
                let first = section.options.first();
                return Err(ConfigError::OverlayTargetMissing {
                    section: section.id.to_string(),
                    key: first.map(|o| o.key.clone()).unwrap_or_default(),
                    line: first.map(|o| o.line).unwrap_or(section.line),
                });
            };

            for option in &section.options {
                if !schema::accepts_key(&section.id, &option.key) {
                    return Err(ConfigError::OverlayTargetMissing {
                        section: section.id.to_string(),
                        key: option.key.clone(),
                        line: option.line,
                    });
                }
                match target.get_mut(&option.key) {
                    Some(existing) => {
                        existing.value = option.value.clone();
                        existing.line = option.line;
                    }
                    None => target.options.push(option.clone()),
                }
            }
        }
        Ok(())
    }
}

/// Parse the SAVE_CONFIG block
///
/// `block` starts at the sentinel line, `first_line` is its 1-based line
/// number in the complete document.
pub(crate) fn parse_block(block: &str, first_line: usize) -> Result<CalibrationOverlay, ConfigError> {
    let mut lines = block
        .lines()
        .enumerate()
        .map(|(i, l)| (first_line + i, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty());

    // Sentinel was located by the caller
    lines.next();

    match lines.next() {
        Some((_, line)) if line.trim_end() == BANNER => {}
        Some((line_no, _)) => {
            return Err(ConfigError::OverlayCorrupted {
                line: line_no,
                message: "missing DO NOT EDIT banner".to_string(),
            })
        }
        None => {
            return Err(ConfigError::OverlayCorrupted {
                line: first_line,
                message: "block is truncated".to_string(),
            })
        }
    }

    let mut body: Vec<(usize, &str)> = Vec::new();
    let mut checksum: Option<(usize, &str)> = None;
    for (line_no, line) in lines {
        if !line.starts_with(LINE_PREFIX) {
            return Err(ConfigError::OverlayCorrupted {
                line: line_no,
                message: "line without '#*#' prefix after SAVE_CONFIG marker".to_string(),
            });
        }
        if checksum.is_some() {
            return Err(ConfigError::OverlayCorrupted {
                line: line_no,
                message: "content after checksum line".to_string(),
            });
        }
        let content = strip_prefix(line);
        match content.strip_prefix(CHECKSUM_KEY) {
            Some(value) => checksum = Some((line_no, value.trim())),
            None => body.push((line_no, line)),
        }
    }

    let Some((checksum_line, stored)) = checksum else {
        return Err(ConfigError::OverlayCorrupted {
            line: body.last().map(|(n, _)| *n).unwrap_or(first_line),
            message: "missing checksum line".to_string(),
        });
    };
    let expected = body_checksum(body.iter().map(|(_, l)| *l));
    match u32::from_str_radix(stored, 16) {
        Ok(value) if value == expected => {}
        _ => {
            return Err(ConfigError::OverlayCorrupted {
                line: checksum_line,
                message: format!("checksum mismatch (block contains {:08x})", expected),
            })
        }
    }

    let sections = document::parse_sections(body.iter().map(|(n, l)| (*n, strip_prefix(l))))?;
    Ok(CalibrationOverlay { sections })
}

/// Remove the `#*#` marker and the single separating space
fn strip_prefix(line: &str) -> &str {
    let content = &line[LINE_PREFIX.len()..];
    content.strip_prefix(' ').unwrap_or(content)
}

/// CRC-32 over body lines joined with '\n'
fn body_checksum<'a>(lines: impl Iterator<Item = &'a str>) -> u32 {
    let mut crc: u32 = 0xFFFFFFFF;
    for (index, line) in lines.enumerate() {
        if index > 0 {
            crc = crc32_update(crc, b"\n");
        }
        crc = crc32_update(crc, line.trim_end().as_bytes());
    }
    !crc
}

/// CRC-32 (IEEE) of a byte string
///
/// Same checksum as the SAVE_CONFIG block; storage layers use it to check
/// a reassembled document.
pub fn crc32(data: &[u8]) -> u32 {
    !crc32_update(0xFFFFFFFF, data)
}

/// Simple CRC32 update function (IEEE 802.3 polynomial)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB88320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}
