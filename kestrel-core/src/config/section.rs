//! Generic view of a validated section
//!
//! Every option, given or defaulted, is stored already coerced. Typed
//! section structs and the cross-field rules read through the getters here.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::document::SectionId;
use crate::error::ConfigError;
use crate::glyph::Glyph;
use crate::pins::ResolvedPin;
use crate::value::{Color, Point, Rect, Value};

/// A coerced option
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub value: Value,
    /// Line of the option, or of the section header when defaulted
    pub line: usize,
    /// Value came from the schema default
    pub defaulted: bool,
}

/// A section after coercion
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    id: SectionId,
    line: usize,
    entries: Vec<Entry>,
}

macro_rules! getters {
    ($($get:ident, $require:ident, $as:ident -> $ty:ty;)*) => {
        $(
            pub fn $get(&self, key: &str) -> Option<$ty> {
                self.value(key).and_then(Value::$as)
            }

            pub fn $require(&self, key: &str) -> Result<$ty, ConfigError> {
                self.$get(key).ok_or_else(|| self.missing(key))
            }
        )*
    };
}

impl Section {
    pub(crate) fn new(id: SectionId, line: usize) -> Self {
        Self {
            id,
            line,
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn id(&self) -> &SectionId {
        &self.id
    }

    /// Section type, e.g. "heater_generic"
    pub fn kind(&self) -> &str {
        &self.id.kind
    }

    /// Instance name, e.g. "chamber"
    pub fn name(&self) -> Option<&str> {
        self.id.name.as_deref()
    }

    /// Line of the section header
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).map(|e| &e.value)
    }

    /// Whether the option was written (not defaulted)
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some_and(|e| !e.defaulted)
    }

    /// Line to report for an option
    pub fn line_of(&self, key: &str) -> usize {
        self.get(key).map_or(self.line, |e| e.line)
    }

    getters! {
        float, require_float, as_float -> f64;
        int, require_int, as_int -> i64;
        bool, require_bool, as_bool -> bool;
        str, require_str, as_str -> &str;
        pin, require_pin, as_pin -> &ResolvedPin;
        pins, require_pins, as_pins -> &[ResolvedPin];
        floats, require_floats, as_floats -> &[f64];
        list, require_list, as_list -> &[String];
        color, require_color, as_color -> Color;
        rect, require_rect, as_rect -> Rect;
        points, require_points, as_points -> &[Point];
        glyph, require_glyph, as_glyph -> &Glyph;
    }

    /// Indices used by an indexed option family, sorted
    pub fn family_indices(&self, prefix: &str, suffixes: &[&str]) -> Vec<u32> {
        let mut indices: Vec<u32> = self
            .entries
            .iter()
            .filter_map(|e| {
                let rest = e.key.strip_prefix(prefix)?;
                let digits = rest.trim_end_matches(|c: char| !c.is_ascii_digit());
                let suffix = &rest[digits.len()..];
                if !suffixes.contains(&suffix) || digits.is_empty() {
                    return None;
                }
                digits.parse().ok()
            })
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    pub(crate) fn missing(&self, key: &str) -> ConfigError {
        ConfigError::MissingRequiredKey {
            section: self.id.to_string(),
            key: key.to_string(),
            line: self.line,
        }
    }

    pub(crate) fn range(&self, key: &str, message: String) -> ConfigError {
        ConfigError::RangeViolation {
            section: self.id.to_string(),
            key: key.to_string(),
            line: self.line_of(key),
            message,
        }
    }

    pub(crate) fn invalid(&self, key: &str, message: String) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.id.to_string(),
            key: key.to_string(),
            line: self.line_of(key),
            message,
        }
    }

    pub(crate) fn unknown(&self, key: &str) -> ConfigError {
        ConfigError::UnknownKey {
            section: self.id.to_string(),
            key: key.to_string(),
            line: self.line_of(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn section() -> Section {
        let mut s = Section::new(SectionId::new("display"), 4);
        for (key, value, line) in [
            ("button0_rect", Value::Float(0.0), 5),
            ("button0_glyph", Value::Float(0.0), 6),
            ("button1_rect", Value::Float(0.0), 7),
            ("button1_repeat_function", Value::Float(0.0), 8),
            ("screen_width", Value::Int(480), 9),
        ] {
            s.push(Entry {
                key: key.into(),
                value,
                line,
                defaulted: false,
            });
        }
        s
    }

    #[test]
    fn test_family_indices() {
        let s = section();
        assert_eq!(s.family_indices("button", &["_rect", "_glyph"]), vec![0, 1]);
        assert_eq!(s.family_indices("button", &["_repeat_function"]), vec![1]);
        assert!(s.family_indices("button", &["_points"]).is_empty());
    }

    #[test]
    fn test_typed_getters() {
        let s = section();
        assert_eq!(s.int("screen_width"), Some(480));
        assert_eq!(s.float("screen_width"), Some(480.0));
        assert_eq!(s.str("screen_width"), None);
        assert!(matches!(
            s.require_int("screen_height"),
            Err(ConfigError::MissingRequiredKey { line: 4, .. })
        ));
        assert_eq!(s.line_of("button1_rect"), 7);
        assert_eq!(s.line_of("absent"), 4);
    }
}
