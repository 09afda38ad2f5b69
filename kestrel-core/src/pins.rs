//! Pin references, board aliases and pin ownership
//!
//! A pin reference is written `[modifiers][chip:]name`:
//! - `!` inverts the polarity
//! - `^` enables the internal pull-up
//! - `chip:` selects a secondary MCU declared as `[mcu chip]`
//!
//! Names that do not look like a physical pin (`PD7`, `gpio11`, `P1.18`) must
//! be aliases defined by a `[board_pins]` section, e.g. `EXP1_3=PD7`.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use heapless::String as HString;

use crate::error::ConfigError;

/// Maximum length of a chip or pin name
pub const MAX_PIN_NAME_LEN: usize = 24;

/// Bounded chip/pin name
pub type PinName = HString<MAX_PIN_NAME_LEN>;

/// Chip used when a reference has no `chip:` prefix
pub const DEFAULT_CHIP: &str = "mcu";

/// Virtual chip providing the probe endstop
pub const PROBE_CHIP: &str = "probe";

/// The only pin of the probe chip
pub const PROBE_VIRTUAL_ENDSTOP: &str = "z_virtual_endstop";

/// Parsed (unresolved) pin reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRef<'a> {
    /// Chip prefix, if any
    pub chip: Option<&'a str>,
    /// Pin or alias name
    pub name: &'a str,
    /// Pin is active-low (inverted)
    pub inverted: bool,
    /// Enable internal pull-up
    pub pull_up: bool,
}

/// Pin reference syntax errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinSyntaxError {
    /// No pin name after the modifiers
    Empty,
    /// A modifier appears twice
    RepeatedModifier,
    /// Empty chip prefix or embedded whitespace
    Malformed,
}

impl fmt::Display for PinSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinSyntaxError::Empty => f.write_str("missing pin name"),
            PinSyntaxError::RepeatedModifier => f.write_str("pin modifier given twice"),
            PinSyntaxError::Malformed => f.write_str("malformed pin reference"),
        }
    }
}

/// Parse a pin string like "PD7", "!PD7", "^!EXP1_3", "ender:PA1"
pub fn parse_pin_ref(value: &str) -> Result<PinRef<'_>, PinSyntaxError> {
    let mut inverted = false;
    let mut pull_up = false;
    let mut s = value.trim();

    // Check for modifiers
    loop {
        if let Some(rest) = s.strip_prefix('!') {
            if inverted {
                return Err(PinSyntaxError::RepeatedModifier);
            }
            inverted = true;
            s = rest.trim_start();
        } else if let Some(rest) = s.strip_prefix('^') {
            if pull_up {
                return Err(PinSyntaxError::RepeatedModifier);
            }
            pull_up = true;
            s = rest.trim_start();
        } else {
            break;
        }
    }

    if s.is_empty() {
        return Err(PinSyntaxError::Empty);
    }
    if s.contains(char::is_whitespace) {
        return Err(PinSyntaxError::Malformed);
    }

    let (chip, name) = match s.split_once(':') {
        Some((chip, name)) => {
            if chip.is_empty() || name.is_empty() || name.contains(':') {
                return Err(PinSyntaxError::Malformed);
            }
            (Some(chip), name)
        }
        None => (None, s),
    };

    Ok(PinRef {
        chip,
        name,
        inverted,
        pull_up,
    })
}

/// Check whether a name has the shape of a physical pin
///
/// Accepts 1-4 ASCII letters, 1-3 digits and an optional `.digits` port
/// suffix: `PD7`, `PA10`, `gpio11`, `P1.18`.
pub fn is_physical_pin(name: &str) -> bool {
    let bytes = name.as_bytes();
    let letters = bytes.iter().take_while(|b| b.is_ascii_alphabetic()).count();
    if letters == 0 || letters > 4 {
        return false;
    }
    let rest = &bytes[letters..];
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 || digits > 3 {
        return false;
    }
    match &rest[digits..] {
        [] => true,
        [b'.', port @ ..] => !port.is_empty() && port.len() <= 2 && port.iter().all(u8::is_ascii_digit),
        _ => false,
    }
}

/// A fully resolved pin: physical name plus polarity flags
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResolvedPin {
    /// Chip the pin belongs to ("mcu" unless prefixed)
    pub chip: PinName,
    /// Physical pin name after alias expansion
    pub pin: PinName,
    /// Pin is active-low (inverted)
    pub inverted: bool,
    /// Enable internal pull-up
    pub pull_up: bool,
}

impl ResolvedPin {
    /// Whether this is the probe's virtual endstop
    pub fn is_virtual(&self) -> bool {
        self.chip.as_str() == PROBE_CHIP
    }
}

impl fmt::Display for ResolvedPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pull_up {
            f.write_str("^")?;
        }
        if self.inverted {
            f.write_str("!")?;
        }
        if self.chip.as_str() != DEFAULT_CHIP {
            write!(f, "{}:", self.chip)?;
        }
        f.write_str(&self.pin)
    }
}

/// Where an option being resolved lives, for error reporting
#[derive(Debug, Clone, Copy)]
pub struct OptionSite<'a> {
    pub section: &'a str,
    pub key: &'a str,
    pub line: usize,
}

impl OptionSite<'_> {
    fn unresolved(&self, pin: &str) -> ConfigError {
        ConfigError::UnresolvedAlias {
            section: self.section.to_string(),
            key: self.key.to_string(),
            line: self.line,
            pin: pin.to_string(),
        }
    }

    fn invalid(&self, message: String) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.section.to_string(),
            key: self.key.to_string(),
            line: self.line,
            message,
        }
    }
}

/// One `NAME=PIN` entry of a `[board_pins]` section
#[derive(Debug, Clone)]
struct AliasEntry {
    target: String,
    section: String,
    line: usize,
}

/// Alias lookup table for every declared chip
///
/// Built once per load. Chains (`A=B`, `B=PD7`) are flattened when the table
/// is finished, so lookups never walk a chain and cycles are rejected before
/// any pin is resolved.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    /// Declared chips
    chips: Vec<String>,
    /// Whether the virtual probe chip exists
    probe: bool,
    /// (chip, alias) -> raw target, as written
    entries: BTreeMap<(String, String), AliasEntry>,
    /// (chip, alias) -> physical pin (or reserved `<...>` marker)
    resolved: BTreeMap<(String, String), String>,
}

impl AliasTable {
    /// Create a table for the given chips
    ///
    /// The default chip is always present.
    pub fn new<'a>(chips: impl IntoIterator<Item = &'a str>, probe: bool) -> Self {
        let mut table = Self {
            chips: alloc::vec![DEFAULT_CHIP.to_string()],
            probe,
            ..Default::default()
        };
        for chip in chips {
            if !table.has_chip(chip) {
                table.chips.push(chip.to_string());
            }
        }
        table
    }

    /// Check whether a chip is declared
    pub fn has_chip(&self, chip: &str) -> bool {
        self.chips.iter().any(|c| c == chip) || (self.probe && chip == PROBE_CHIP)
    }

    /// Declared chips, default chip first
    pub fn chips(&self) -> &[String] {
        &self.chips
    }

    /// Number of aliases across all chips
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no aliases are defined
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add the aliases of one `aliases` option
    ///
    /// `value` is a comma and/or newline separated list of `NAME=PIN`.
    pub fn add_aliases(
        &mut self,
        chips: &[String],
        value: &str,
        site: OptionSite<'_>,
    ) -> Result<(), ConfigError> {
        for chip in chips {
            if !self.chips.iter().any(|c| c == chip) {
                return Err(site.invalid(format!("unknown mcu '{}'", chip)));
            }
        }

        for item in value.split([',', '\n']).map(str::trim).filter(|i| !i.is_empty()) {
            let Some((name, target)) = item.split_once('=') else {
                return Err(site.invalid(format!("alias '{}' is not of the form NAME=PIN", item)));
            };
            let (name, target) = (name.trim(), target.trim());
            if name.is_empty() || target.is_empty() {
                return Err(site.invalid(format!("alias '{}' is not of the form NAME=PIN", item)));
            }

            for chip in chips {
                let key = (chip.clone(), name.to_string());
                if self.entries.contains_key(&key) {
                    return Err(ConfigError::DuplicateAlias {
                        section: site.section.to_string(),
                        alias: name.to_string(),
                        line: site.line,
                    });
                }
                self.entries.insert(
                    key,
                    AliasEntry {
                        target: target.to_string(),
                        section: site.section.to_string(),
                        line: site.line,
                    },
                );
            }
        }
        Ok(())
    }

    /// Flatten alias chains
    ///
    /// Rejects cycles and aliases whose chain ends in a name that is neither
    /// physical nor reserved.
    pub fn finish(&mut self) -> Result<(), ConfigError> {
        let mut resolved = BTreeMap::new();
        for ((chip, alias), entry) in &self.entries {
            let mut current = entry.target.as_str();
            let mut steps = 0;
            loop {
                if is_reserved(current) || is_physical_pin(current) {
                    break;
                }
                let Some(next) = self.entries.get(&(chip.clone(), current.to_string())) else {
                    return Err(ConfigError::UnresolvedAlias {
                        section: entry.section.clone(),
                        key: alias.clone(),
                        line: entry.line,
                        pin: current.to_string(),
                    });
                };
                steps += 1;
                if steps > self.entries.len() {
                    return Err(ConfigError::AliasCycle {
                        section: entry.section.clone(),
                        alias: alias.clone(),
                        line: entry.line,
                    });
                }
                current = next.target.as_str();
            }
            resolved.insert((chip.clone(), alias.clone()), current.to_string());
        }
        self.resolved = resolved;
        Ok(())
    }

    /// Resolve a pin reference to a physical pin
    pub fn resolve(&self, value: &str, site: OptionSite<'_>) -> Result<ResolvedPin, ConfigError> {
        let pin_ref =
            parse_pin_ref(value).map_err(|e| site.invalid(format!("{} in '{}'", e, value)))?;
        let chip = pin_ref.chip.unwrap_or(DEFAULT_CHIP);

        if !self.has_chip(chip) {
            return Err(site.unresolved(value.trim()));
        }

        let physical = if chip == PROBE_CHIP {
            if pin_ref.name != PROBE_VIRTUAL_ENDSTOP {
                return Err(site.unresolved(value.trim()));
            }
            pin_ref.name
        } else {
            match self.resolved.get(&(chip.to_string(), pin_ref.name.to_string())) {
                Some(target) if is_reserved(target) => {
                    return Err(site.invalid(format!(
                        "pin '{}' is reserved ({})",
                        pin_ref.name, target
                    )));
                }
                Some(target) => target.as_str(),
                None if is_physical_pin(pin_ref.name) => pin_ref.name,
                None => return Err(site.unresolved(pin_ref.name)),
            }
        };

        Ok(ResolvedPin {
            chip: bounded(chip).ok_or_else(|| site.invalid(format!("chip name '{}' too long", chip)))?,
            pin: bounded(physical)
                .ok_or_else(|| site.invalid(format!("pin name '{}' too long", physical)))?,
            inverted: pin_ref.inverted,
            pull_up: pin_ref.pull_up,
        })
    }
}

/// Board pins that must never be driven (`<GND>`, `<5V>`)
fn is_reserved(target: &str) -> bool {
    target.starts_with('<') && target.ends_with('>')
}

fn bounded(name: &str) -> Option<PinName> {
    let mut s = PinName::new();
    s.push_str(name).ok()?;
    Some(s)
}

/// Pin role declared by the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinKind {
    /// Digital or PWM output
    Output,
    /// Digital input (endstops, buttons)
    Input,
    /// Analog input
    Adc,
}

/// How a pin option uses its pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinUse {
    pub kind: PinKind,
    /// Other shareable options may claim the same pin
    pub shareable: bool,
}

impl PinUse {
    pub const fn exclusive(kind: PinKind) -> Self {
        Self {
            kind,
            shareable: false,
        }
    }

    pub const fn shared(kind: PinKind) -> Self {
        Self {
            kind,
            shareable: true,
        }
    }
}

#[derive(Debug, Clone)]
struct Claim {
    section: String,
    key: String,
    usage: PinUse,
    inverted: bool,
    pull_up: bool,
}

/// Tracks which option owns each physical pin
#[derive(Debug, Default)]
pub struct PinRegistry {
    claims: BTreeMap<(PinName, PinName), Vec<Claim>>,
}

impl PinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that an option uses a pin
    ///
    /// Two claims may share a pin only if both are shareable, of the same
    /// kind and agree on polarity and pull-up.
    pub fn claim(
        &mut self,
        pin: &ResolvedPin,
        usage: PinUse,
        site: OptionSite<'_>,
    ) -> Result<(), ConfigError> {
        if pin.is_virtual() {
            return Ok(());
        }

        let claims = self
            .claims
            .entry((pin.chip.clone(), pin.pin.clone()))
            .or_default();

        let conflict = claims.iter().find(|c| {
            !(usage.shareable
                && c.usage.shareable
                && c.usage.kind == usage.kind
                && c.inverted == pin.inverted
                && c.pull_up == pin.pull_up)
        });
        if let Some(other) = conflict {
            return Err(ConfigError::DuplicatePinUse {
                section: site.section.to_string(),
                key: site.key.to_string(),
                line: site.line,
                pin: format!("{}:{}", pin.chip, pin.pin),
                other_section: other.section.clone(),
                other_key: other.key.clone(),
            });
        }

        claims.push(Claim {
            section: site.section.to_string(),
            key: site.key.to_string(),
            usage,
            inverted: pin.inverted,
            pull_up: pin.pull_up,
        });
        Ok(())
    }

    /// Number of distinct physical pins in use
    pub fn pins_in_use(&self) -> usize {
        self.claims.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(key: &'static str) -> OptionSite<'static> {
        OptionSite {
            section: "display",
            key,
            line: 3,
        }
    }

    fn table_with(aliases: &str) -> Result<AliasTable, ConfigError> {
        let mut table = AliasTable::new(["ender"], false);
        let chips = alloc::vec![DEFAULT_CHIP.to_string()];
        table.add_aliases(
            &chips,
            aliases,
            OptionSite {
                section: "board_pins",
                key: "aliases",
                line: 2,
            },
        )?;
        table.finish()?;
        Ok(table)
    }

    #[test]
    fn test_parse_pin_modifiers() {
        let pin = parse_pin_ref("PD7").unwrap();
        assert_eq!(pin.name, "PD7");
        assert!(!pin.inverted && !pin.pull_up);

        let pin = parse_pin_ref("!PD7").unwrap();
        assert!(pin.inverted && !pin.pull_up);

        let pin = parse_pin_ref("^!P1_1").unwrap();
        assert!(pin.inverted && pin.pull_up);
        assert_eq!(pin.name, "P1_1");

        let pin = parse_pin_ref("!^ ender:PA1").unwrap();
        assert!(pin.inverted && pin.pull_up);
        assert_eq!(pin.chip, Some("ender"));
        assert_eq!(pin.name, "PA1");
    }

    #[test]
    fn test_parse_pin_errors() {
        assert_eq!(parse_pin_ref("!!PD7"), Err(PinSyntaxError::RepeatedModifier));
        assert_eq!(parse_pin_ref("^"), Err(PinSyntaxError::Empty));
        assert_eq!(parse_pin_ref(":PA1"), Err(PinSyntaxError::Malformed));
        assert_eq!(parse_pin_ref("PA 1"), Err(PinSyntaxError::Malformed));
    }

    #[test]
    fn test_physical_pin_shapes() {
        for name in ["PD7", "PA10", "gpio11", "P1.18", "PB0"] {
            assert!(is_physical_pin(name), "{}", name);
        }
        for name in ["P1_1", "EXP1_3", "gpio", "12", "PA1.", "ABCDE1"] {
            assert!(!is_physical_pin(name), "{}", name);
        }
    }

    #[test]
    fn test_alias_resolution() {
        let table = table_with("P1_1=PD7, P1_2=PD6").unwrap();
        let pin = table.resolve("^!P1_1", site("click_pin")).unwrap();
        assert_eq!(pin.pin.as_str(), "PD7");
        assert_eq!(pin.chip.as_str(), "mcu");
        assert!(pin.inverted && pin.pull_up);
    }

    #[test]
    fn test_alias_chain_flattened() {
        let table = table_with("EXP1_3=P1_1\nP1_1=PD7").unwrap();
        let pin = table.resolve("EXP1_3", site("dcx_pin")).unwrap();
        assert_eq!(pin.pin.as_str(), "PD7");
    }

    #[test]
    fn test_alias_cycle_rejected() {
        let err = table_with("A_1=B_1, B_1=A_1").unwrap_err();
        assert!(matches!(err, ConfigError::AliasCycle { .. }));
    }

    #[test]
    fn test_self_alias_rejected() {
        let err = table_with("A_1=A_1").unwrap_err();
        assert!(matches!(err, ConfigError::AliasCycle { .. }));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let err = table_with("P1_1=PD7, P1_1=PD6").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAlias { ref alias, .. } if alias == "P1_1"));
    }

    #[test]
    fn test_unresolved_alias() {
        let table = table_with("P1_1=PD7").unwrap();
        let err = table.resolve("EXP2_9", site("kill_pin")).unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedAlias { ref pin, .. } if pin == "EXP2_9"));

        let err = table.resolve("other:PA1", site("kill_pin")).unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedAlias { .. }));
    }

    #[test]
    fn test_reserved_pin_rejected() {
        let table = table_with("EXP1_9=<GND>").unwrap();
        let err = table.resolve("EXP1_9", site("kill_pin")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_secondary_chip_and_probe() {
        let table = AliasTable::new(["ender"], true);
        let pin = table.resolve("ender:PA1", site("pin")).unwrap();
        assert_eq!(pin.chip.as_str(), "ender");
        assert_eq!(alloc::format!("{}", pin), "ender:PA1");

        let pin = table.resolve("probe:z_virtual_endstop", site("endstop_pin")).unwrap();
        assert!(pin.is_virtual());
        assert!(table.resolve("probe:PA1", site("endstop_pin")).is_err());
    }

    #[test]
    fn test_registry_conflicts() {
        let table = AliasTable::new(core::iter::empty(), false);
        let mut registry = PinRegistry::new();
        let step = table.resolve("PA1", site("step_pin")).unwrap();
        registry
            .claim(&step, PinUse::exclusive(PinKind::Output), site("step_pin"))
            .unwrap();
        let err = registry
            .claim(&step, PinUse::exclusive(PinKind::Output), site("dir_pin"))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicatePinUse { ref other_key, .. } if other_key == "step_pin"
        ));
    }

    #[test]
    fn test_registry_shared_pins() {
        let table = AliasTable::new(core::iter::empty(), false);
        let mut registry = PinRegistry::new();
        let enable = table.resolve("!PC3", site("enable_pin")).unwrap();
        let shared = PinUse::shared(PinKind::Output);
        registry.claim(&enable, shared, site("enable_pin")).unwrap();
        registry.claim(&enable, shared, site("enable_pin")).unwrap();
        assert_eq!(registry.pins_in_use(), 1);

        // Same pin with opposite polarity cannot be shared
        let plain = table.resolve("PC3", site("enable_pin")).unwrap();
        assert!(registry.claim(&plain, shared, site("enable_pin")).is_err());
    }
}
