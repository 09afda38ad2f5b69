//! Configuration load errors
//!
//! Every error is fatal to the load that produced it. Each variant carries
//! enough context (section, option, line) to point the operator at the
//! offending line of the document.

use alloc::string::String;
use core::fmt;

/// Errors produced while loading, validating or saving a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Malformed line or section header
    Syntax { line: usize, message: String },
    /// The same `[type name]` appears twice
    DuplicateSection {
        section: String,
        line: usize,
        first_line: usize,
    },
    /// Section type not known to the schema
    UnknownSection { section: String, line: usize },
    /// Option not declared by the section schema
    UnknownKey {
        section: String,
        key: String,
        line: usize,
    },
    /// Required option absent (line is the section header)
    MissingRequiredKey {
        section: String,
        key: String,
        line: usize,
    },
    /// Value could not be coerced to the declared type
    InvalidValue {
        section: String,
        key: String,
        line: usize,
        message: String,
    },
    /// Pin name is neither a physical pin nor a known alias
    UnresolvedAlias {
        section: String,
        key: String,
        line: usize,
        pin: String,
    },
    /// Alias defined twice for the same chip
    DuplicateAlias {
        section: String,
        alias: String,
        line: usize,
    },
    /// Alias chain loops back on itself
    AliasCycle {
        section: String,
        alias: String,
        line: usize,
    },
    /// Physical pin claimed by two roles that cannot share it
    DuplicatePinUse {
        section: String,
        key: String,
        line: usize,
        pin: String,
        other_section: String,
        other_key: String,
    },
    /// Numeric bound or cross-field invariant violated
    RangeViolation {
        section: String,
        key: String,
        line: usize,
        message: String,
    },
    /// Calibration block references a section or option the base lacks
    OverlayTargetMissing {
        section: String,
        key: String,
        line: usize,
    },
    /// Calibration block was edited by hand or truncated
    OverlayCorrupted { line: usize, message: String },
}

impl ConfigError {
    /// Line number (1-based) the error refers to
    pub fn line(&self) -> usize {
        match self {
            ConfigError::Syntax { line, .. }
            | ConfigError::DuplicateSection { line, .. }
            | ConfigError::UnknownSection { line, .. }
            | ConfigError::UnknownKey { line, .. }
            | ConfigError::MissingRequiredKey { line, .. }
            | ConfigError::InvalidValue { line, .. }
            | ConfigError::UnresolvedAlias { line, .. }
            | ConfigError::DuplicateAlias { line, .. }
            | ConfigError::AliasCycle { line, .. }
            | ConfigError::DuplicatePinUse { line, .. }
            | ConfigError::RangeViolation { line, .. }
            | ConfigError::OverlayTargetMissing { line, .. }
            | ConfigError::OverlayCorrupted { line, .. } => *line,
        }
    }

    /// Section the error refers to, if any
    pub fn section(&self) -> Option<&str> {
        match self {
            ConfigError::DuplicateSection { section, .. }
            | ConfigError::UnknownSection { section, .. }
            | ConfigError::UnknownKey { section, .. }
            | ConfigError::MissingRequiredKey { section, .. }
            | ConfigError::InvalidValue { section, .. }
            | ConfigError::UnresolvedAlias { section, .. }
            | ConfigError::DuplicateAlias { section, .. }
            | ConfigError::AliasCycle { section, .. }
            | ConfigError::DuplicatePinUse { section, .. }
            | ConfigError::RangeViolation { section, .. }
            | ConfigError::OverlayTargetMissing { section, .. } => Some(section),
            ConfigError::Syntax { .. } | ConfigError::OverlayCorrupted { .. } => None,
        }
    }

    /// Option the error refers to, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::UnknownKey { key, .. }
            | ConfigError::MissingRequiredKey { key, .. }
            | ConfigError::InvalidValue { key, .. }
            | ConfigError::UnresolvedAlias { key, .. }
            | ConfigError::DuplicatePinUse { key, .. }
            | ConfigError::RangeViolation { key, .. }
            | ConfigError::OverlayTargetMissing { key, .. } => Some(key),
            ConfigError::DuplicateAlias { alias, .. } | ConfigError::AliasCycle { alias, .. } => {
                Some(alias)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Syntax { line, message } => {
                write!(f, "line {}: {}", line, message)
            }
            ConfigError::DuplicateSection {
                section,
                line,
                first_line,
            } => write!(
                f,
                "line {}: section [{}] already defined on line {}",
                line, section, first_line
            ),
            ConfigError::UnknownSection { section, line } => {
                write!(f, "line {}: [{}] is not a valid config section", line, section)
            }
            ConfigError::UnknownKey { section, key, line } => write!(
                f,
                "line {}: option '{}' is not valid in section [{}]",
                line, key, section
            ),
            ConfigError::MissingRequiredKey { section, key, line } => write!(
                f,
                "line {}: option '{}' in section [{}] must be specified",
                line, key, section
            ),
            ConfigError::InvalidValue {
                section,
                key,
                line,
                message,
            } => write!(
                f,
                "line {}: unable to parse option '{}' in section [{}]: {}",
                line, key, section, message
            ),
            ConfigError::UnresolvedAlias {
                section,
                key,
                line,
                pin,
            } => write!(
                f,
                "line {}: pin '{}' in option '{}' of section [{}] does not resolve to a physical pin",
                line, pin, key, section
            ),
            ConfigError::DuplicateAlias {
                section,
                alias,
                line,
            } => write!(
                f,
                "line {}: duplicate alias '{}' in section [{}]",
                line, alias, section
            ),
            ConfigError::AliasCycle {
                section,
                alias,
                line,
            } => write!(
                f,
                "line {}: alias '{}' in section [{}] refers back to itself",
                line, alias, section
            ),
            ConfigError::DuplicatePinUse {
                section,
                key,
                line,
                pin,
                other_section,
                other_key,
            } => write!(
                f,
                "line {}: pin {} used by option '{}' in [{}] is already used by option '{}' in [{}]",
                line, pin, key, section, other_key, other_section
            ),
            ConfigError::RangeViolation {
                section,
                key,
                line,
                message,
            } => write!(
                f,
                "line {}: option '{}' in section [{}] {}",
                line, key, section, message
            ),
            ConfigError::OverlayTargetMissing { section, key, line } => write!(
                f,
                "line {}: saved option '{}' targets section [{}] which the configuration does not define",
                line, key, section
            ),
            ConfigError::OverlayCorrupted { line, message } => {
                write!(f, "line {}: SAVE_CONFIG block is invalid: {}", line, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_context_accessors() {
        let err = ConfigError::UnknownKey {
            section: "heater_bed".into(),
            key: "bogus_key".into(),
            line: 7,
        };
        assert_eq!(err.line(), 7);
        assert_eq!(err.section(), Some("heater_bed"));
        assert_eq!(err.key(), Some("bogus_key"));
    }

    #[test]
    fn test_display_names_location() {
        let err = ConfigError::RangeViolation {
            section: "stepper_x".into(),
            key: "position_endstop".into(),
            line: 12,
            message: "must be between position_min and position_max".into(),
        };
        let text = err.to_string();
        assert!(text.contains("line 12"));
        assert!(text.contains("position_endstop"));
        assert!(text.contains("[stepper_x]"));
    }

    #[test]
    fn test_syntax_has_no_section() {
        let err = ConfigError::Syntax {
            line: 1,
            message: "option outside of a section".into(),
        };
        assert_eq!(err.section(), None);
        assert_eq!(err.key(), None);
    }
}
