//! Section/option grammar for the printer configuration document
//!
//! Supported features:
//! - `[type]` and `[type instance-name]` section headers
//! - `key: value` and `key = value` options (first separator wins)
//! - `#` and `;` comment lines, inline comments after whitespace
//! - Indented continuation lines for multiline values (glyphs, point lists)
//! - A trailing SAVE_CONFIG block, split off and handed to [`crate::overlay`]
//!
//! Option names are lower-cased. Values are kept verbatim apart from
//! surrounding whitespace; type coercion happens later against the schema.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::overlay::{self, CalibrationOverlay};

/// Identity of a section: its type plus an optional instance name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SectionId {
    /// Section type (e.g. "stepper_x", "heater_fan")
    pub kind: String,
    /// Instance name (e.g. "fan1" in `[heater_fan fan1]`)
    pub name: Option<String>,
}

impl SectionId {
    /// Create an id for an unnamed section
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: None,
        }
    }

    /// Create an id for a named section
    pub fn named(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: Some(name.to_string()),
        }
    }

    /// Parse the text between the brackets of a section header
    ///
    /// Returns None for an empty header.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let mut parts = header.splitn(2, char::is_whitespace);
        let kind = parts.next().filter(|k| !k.is_empty())?;
        let name = parts
            .next()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(ToString::to_string);
        Some(Self {
            kind: kind.to_string(),
            name,
        })
    }

    /// The name other sections use to refer to this one
    ///
    /// `[heater_generic chamber]` is "chamber", `[extruder]` is "extruder".
    pub fn short_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {}", self.kind, name),
            None => f.write_str(&self.kind),
        }
    }
}

/// A single `key: value` entry as written in the document
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawOption {
    /// Lower-cased option name
    pub key: String,
    /// Raw value; continuation lines joined with '\n'
    pub value: String,
    /// Line of the option name (1-based, 0 for programmatic entries)
    pub line: usize,
}

/// A section as written in the document, before schema validation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawSection {
    pub id: SectionId,
    /// Line of the section header
    pub line: usize,
    /// Options in document order
    pub options: Vec<RawOption>,
}

impl RawSection {
    /// Create an empty section
    pub fn new(id: SectionId, line: usize) -> Self {
        Self {
            id,
            line,
            options: Vec::new(),
        }
    }

    /// Look up an option by (lower-case) name
    pub fn get(&self, key: &str) -> Option<&RawOption> {
        self.options.iter().find(|o| o.key == key)
    }

    /// Look up an option for modification
    pub fn get_mut(&mut self, key: &str) -> Option<&mut RawOption> {
        self.options.iter_mut().find(|o| o.key == key)
    }
}

/// A parsed document: the user-authored base plus its calibration block
#[derive(Debug, Clone)]
pub struct Document {
    /// Complete source text
    text: String,
    /// Byte offset where the SAVE_CONFIG block starts (text.len() if absent)
    base_end: usize,
    /// Sections of the user-authored part
    sections: Vec<RawSection>,
    /// Parsed SAVE_CONFIG block (empty if absent)
    overlay: CalibrationOverlay,
}

impl Document {
    /// Parse a complete document
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let (base_end, overlay_line) = find_overlay_start(text);
        let base = &text[..base_end];

        let sections = parse_sections(base.lines().enumerate().map(|(i, l)| (i + 1, l)))?;

        let overlay = if base_end < text.len() {
            overlay::parse_block(&text[base_end..], overlay_line)?
        } else {
            CalibrationOverlay::new()
        };

        Ok(Self {
            text: text.to_string(),
            base_end,
            sections,
            overlay,
        })
    }

    /// Complete source text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The user-authored part, byte-for-byte
    pub fn base(&self) -> &str {
        &self.text[..self.base_end]
    }

    /// Whether the document carries a SAVE_CONFIG block
    pub fn has_overlay_block(&self) -> bool {
        self.base_end < self.text.len()
    }

    /// Sections of the user-authored part
    pub fn sections(&self) -> &[RawSection] {
        &self.sections
    }

    /// Calibration values from the SAVE_CONFIG block
    pub fn overlay(&self) -> &CalibrationOverlay {
        &self.overlay
    }
}

/// Locate the SAVE_CONFIG sentinel line
///
/// Returns the byte offset of the sentinel and its 1-based line number.
fn find_overlay_start(text: &str) -> (usize, usize) {
    let mut offset = 0;
    for (index, line) in text.split_inclusive('\n').enumerate() {
        if line.trim_end() == overlay::SENTINEL {
            return (offset, index + 1);
        }
        offset += line.len();
    }
    (text.len(), 0)
}

/// Parser state for the option currently accepting continuation lines
struct Pending {
    section: usize,
    option: usize,
}

/// Parse numbered lines into sections
///
/// Shared by the base document and the SAVE_CONFIG block (whose lines have
/// their `#*#` prefix removed by the caller).
pub(crate) fn parse_sections<'a>(
    lines: impl Iterator<Item = (usize, &'a str)>,
) -> Result<Vec<RawSection>, ConfigError> {
    let mut sections: Vec<RawSection> = Vec::new();
    let mut pending: Option<Pending> = None;

    for (line_no, raw) in lines {
        let raw = raw.trim_end_matches('\r');
        let trimmed = raw.trim();

        // Skip empty lines and comments
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        // Indented line continues the previous option
        if raw.starts_with(' ') || raw.starts_with('\t') {
            let Some(p) = &pending else {
                return Err(ConfigError::Syntax {
                    line: line_no,
                    message: "indented line does not continue an option".to_string(),
                });
            };
            let content = strip_inline_comment(trimmed);
            if content.is_empty() {
                continue;
            }
            let option = &mut sections[p.section].options[p.option];
            if !option.value.is_empty() {
                option.value.push('\n');
            }
            option.value.push_str(content);
            continue;
        }

        // Section header
        if trimmed.starts_with('[') {
            let header = strip_inline_comment(trimmed);
            if !header.ends_with(']') {
                return Err(ConfigError::Syntax {
                    line: line_no,
                    message: "unterminated section header".to_string(),
                });
            }
            let id = SectionId::parse(&header[1..header.len() - 1]).ok_or_else(|| {
                ConfigError::Syntax {
                    line: line_no,
                    message: "empty section header".to_string(),
                }
            })?;
            if let Some(first) = sections.iter().find(|s| s.id == id) {
                return Err(ConfigError::DuplicateSection {
                    section: id.to_string(),
                    line: line_no,
                    first_line: first.line,
                });
            }
            sections.push(RawSection::new(id, line_no));
            pending = None;
            continue;
        }

        // Parse key: value / key = value
        let Some(section_index) = sections.len().checked_sub(1) else {
            return Err(ConfigError::Syntax {
                line: line_no,
                message: "option outside of a section".to_string(),
            });
        };
        let (key, value) = split_option(trimmed).ok_or_else(|| ConfigError::Syntax {
            line: line_no,
            message: "expected 'key: value' or 'key = value'".to_string(),
        })?;

        let section = &mut sections[section_index];
        if section.get(&key).is_some() {
            return Err(ConfigError::Syntax {
                line: line_no,
                message: alloc::format!("option '{}' repeated in section [{}]", key, section.id),
            });
        }
        section.options.push(RawOption {
            key,
            value: strip_inline_comment(value).to_string(),
            line: line_no,
        });
        pending = Some(Pending {
            section: section_index,
            option: section.options.len() - 1,
        });
    }

    Ok(sections)
}

/// Split "key: value" or "key = value" at the first separator
///
/// Returns the lower-cased key and the trimmed value.
fn split_option(line: &str) -> Option<(String, &str)> {
    let sep = line.find([':', '='])?;
    let key = line[..sep].trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_lowercase(), line[sep + 1..].trim()))
}

/// Remove a trailing comment introduced by whitespace followed by '#' or ';'
fn strip_inline_comment(value: &str) -> &str {
    let bytes = value.as_bytes();
    for i in 1..bytes.len() {
        if (bytes[i] == b'#' || bytes[i] == b';') && bytes[i - 1].is_ascii_whitespace() {
            return value[..i].trim_end();
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Vec<RawSection>, ConfigError> {
        parse_sections(text.lines().enumerate().map(|(i, l)| (i + 1, l)))
    }

    #[test]
    fn test_section_header_with_instance() {
        let id = SectionId::parse("heater_fan  hotend_fan ").unwrap();
        assert_eq!(id.kind, "heater_fan");
        assert_eq!(id.name.as_deref(), Some("hotend_fan"));
        assert_eq!(id.short_name(), "hotend_fan");
        assert!(SectionId::parse("   ").is_none());
    }

    #[test]
    fn test_both_separators_accepted() {
        let sections = parse("[probe]\nz_offset = 0.95\nx_offset: -41\n").unwrap();
        let probe = &sections[0];
        assert_eq!(probe.get("z_offset").unwrap().value, "0.95");
        assert_eq!(probe.get("x_offset").unwrap().value, "-41");
    }

    #[test]
    fn test_first_separator_wins() {
        let sections = parse("[mcu]\nserial: /dev/serial/by-id/usb-Klipper=1\n").unwrap();
        assert_eq!(
            sections[0].get("serial").unwrap().value,
            "/dev/serial/by-id/usb-Klipper=1"
        );
    }

    #[test]
    fn test_keys_lowercased_and_comments_stripped() {
        let text = "# header comment\n[extruder]\n; another\nPID_Kp: 22.2  # tuned\n";
        let sections = parse(text).unwrap();
        let opt = sections[0].get("pid_kp").unwrap();
        assert_eq!(opt.value, "22.2");
        assert_eq!(opt.line, 4);
    }

    #[test]
    fn test_multiline_value() {
        let text = "[display]\nbutton0_glyph:\n    ..**..\n    .****.\n\n    ******\nlcd_type: st7796s\n";
        let sections = parse(text).unwrap();
        let glyph = sections[0].get("button0_glyph").unwrap();
        assert_eq!(glyph.value, "..**..\n.****.\n******");
        assert_eq!(sections[0].get("lcd_type").unwrap().value, "st7796s");
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let err = parse("[stepper_x]\nmicrosteps: 16\n[stepper_x]\nmicrosteps: 32\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateSection {
                section: "stepper_x".into(),
                line: 3,
                first_line: 1,
            }
        );
    }

    #[test]
    fn test_same_type_different_instance_allowed() {
        let sections = parse("[heater_fan a]\npin: PA1\n[heater_fan b]\npin: PA2\n").unwrap();
        assert_eq!(sections.len(), 2);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse("serial: /dev/ttyACM0\n"),
            Err(ConfigError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            parse("[mcu]\nnot an option\n"),
            Err(ConfigError::Syntax { line: 2, .. })
        ));
        assert!(matches!(
            parse("[mcu\n"),
            Err(ConfigError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            parse("[mcu]\n   dangling\n"),
            Err(ConfigError::Syntax { line: 2, .. })
        ));
        assert!(matches!(
            parse("[mcu]\nbaud: 1\nbaud: 2\n"),
            Err(ConfigError::Syntax { line: 3, .. })
        ));
    }

    #[test]
    fn test_document_splits_overlay() {
        let text = "[extruder]\nmax_temp: 250\n\n#*# <---------------------- SAVE_CONFIG ---------------------->\n";
        let (end, line) = find_overlay_start(text);
        assert_eq!(&text[..end], "[extruder]\nmax_temp: 250\n\n");
        assert_eq!(line, 4);
    }

    #[test]
    fn test_document_without_overlay() {
        let text = "[printer]\nkinematics: cartesian";
        let doc = Document::parse(text).unwrap();
        assert_eq!(doc.base(), text);
        assert!(!doc.has_overlay_block());
        assert!(doc.overlay().is_empty());
    }
}
