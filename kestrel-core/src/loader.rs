//! Load pipeline: text to validated [`PrinterConfig`]
//!
//! 1. Parse the document and its SAVE_CONFIG block
//! 2. Merge saved calibration values over the base sections
//! 3. Check every section and option against its schema
//! 4. Build the pin alias table
//! 5. Coerce values, resolve pins and record pin ownership
//! 6. Cross-field validation
//! 7. Build typed views
//!
//! The first error aborts the load.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::config::{Entry, PrinterConfig, Section};
use crate::document::{Document, RawSection};
use crate::error::ConfigError;
use crate::pins::{AliasTable, OptionSite, PinRegistry, DEFAULT_CHIP};
use crate::schema::{self, Instance, Presence, SectionSchema, ValueKind};
use crate::validate;
use crate::value::{self, check_arity, CoerceError, Value};

/// Load and validate a complete configuration document
///
/// Pin names are checked by shape only: any name that looks like a physical
/// pin (`HE0`, `TB1` as well as `PA1`) is accepted without an alias. Whether
/// the pin exists on the chip is the board layer's check, e.g.
/// `kestrel_hal_rp2040::pins::find_unknown_pin`.
pub fn load(text: &str) -> Result<PrinterConfig, ConfigError> {
    let document = Document::parse(text)?;

    let mut raw: Vec<RawSection> = document.sections().to_vec();
    document.overlay().merge_into(&mut raw)?;

    let schemas = raw
        .iter()
        .map(check_schema)
        .collect::<Result<Vec<_>, _>>()?;

    let aliases = build_alias_table(&raw)?;

    let mut registry = PinRegistry::new();
    let sections = raw
        .iter()
        .zip(&schemas)
        .map(|(section, schema)| coerce_section(section, schema, &aliases, &mut registry))
        .collect::<Result<Vec<_>, _>>()?;

    validate::check(&sections)?;

    PrinterConfig::build(document, sections)
}

/// Find the schema of a section and reject options it does not declare
fn check_schema(section: &RawSection) -> Result<&'static SectionSchema, ConfigError> {
    let Some(schema) = schema::lookup(&section.id.kind) else {
        return Err(ConfigError::UnknownSection {
            section: section.id.to_string(),
            line: section.line,
        });
    };

    let instance_error = match (schema.instance, &section.id.name) {
        (Instance::Forbidden, Some(_)) => Some("does not take an instance name"),
        (Instance::Required, None) => Some("requires an instance name"),
        _ => None,
    };
    if let Some(message) = instance_error {
        return Err(ConfigError::Syntax {
            line: section.line,
            message: alloc::format!("section [{}] {}", section.id, message),
        });
    }

    for option in &section.options {
        if schema.kind_of(&option.key).is_none() {
            return Err(ConfigError::UnknownKey {
                section: section.id.to_string(),
                key: option.key.clone(),
                line: option.line,
            });
        }
    }
    Ok(schema)
}

/// Collect chips and `[board_pins]` aliases
fn build_alias_table(sections: &[RawSection]) -> Result<AliasTable, ConfigError> {
    let chips = sections
        .iter()
        .filter(|s| s.id.kind == "mcu")
        .filter_map(|s| s.id.name.as_deref());
    let probe = sections
        .iter()
        .any(|s| matches!(s.id.kind.as_str(), "probe" | "bltouch"));
    let mut table = AliasTable::new(chips, probe);

    for section in sections.iter().filter(|s| s.id.kind == "board_pins") {
        let targets: Vec<String> = match section.get("mcu") {
            Some(option) => value::split_list(&option.value).map(ToString::to_string).collect(),
            None => alloc::vec![DEFAULT_CHIP.to_string()],
        };
        let section_name = section.id.to_string();
        for option in section
            .options
            .iter()
            .filter(|o| o.key == "aliases" || o.key.starts_with("aliases_"))
        {
            table.add_aliases(
                &targets,
                &option.value,
                OptionSite {
                    section: &section_name,
                    key: &option.key,
                    line: option.line,
                },
            )?;
        }
    }

    table.finish()?;
    Ok(table)
}

/// Coerce every option of a section, filling in defaults
fn coerce_section(
    raw: &RawSection,
    schema: &SectionSchema,
    aliases: &AliasTable,
    registry: &mut PinRegistry,
) -> Result<Section, ConfigError> {
    let section_name = raw.id.to_string();
    let mut section = Section::new(raw.id.clone(), raw.line);

    // Fixed options in schema order, then family options in document order
    for spec in schema.all_options() {
        let (text, line, defaulted) = match (raw.get(spec.key), spec.presence) {
            (Some(option), _) => (option.value.as_str(), option.line, false),
            (None, Presence::Default(default)) => (default, raw.line, true),
            (None, Presence::Optional) => continue,
            (None, Presence::Required) => {
                return Err(ConfigError::MissingRequiredKey {
                    section: section_name,
                    key: spec.key.to_string(),
                    line: raw.line,
                });
            }
        };
        let site = OptionSite {
            section: &section_name,
            key: spec.key,
            line,
        };
        section.push(Entry {
            key: spec.key.to_string(),
            value: coerce_value(&spec.kind, text, site, aliases, registry)?,
            line,
            defaulted,
        });
    }

    for option in raw.options.iter().filter(|o| schema.option(&o.key).is_none()) {
        let Some((family, _)) = schema.family(&option.key) else {
            continue;
        };
        let site = OptionSite {
            section: &section_name,
            key: &option.key,
            line: option.line,
        };
        section.push(Entry {
            key: option.key.clone(),
            value: coerce_value(&family.kind, &option.value, site, aliases, registry)?,
            line: option.line,
            defaulted: false,
        });
    }

    Ok(section)
}

fn coerce_value(
    kind: &ValueKind,
    text: &str,
    site: OptionSite<'_>,
    aliases: &AliasTable,
    registry: &mut PinRegistry,
) -> Result<Value, ConfigError> {
    match kind {
        ValueKind::Pin(usage) => {
            let pin = aliases.resolve(text, site)?;
            registry.claim(&pin, *usage, site)?;
            Ok(Value::Pin(pin))
        }
        ValueKind::PinList { usage, count } => {
            let pins = value::split_list(text)
                .map(|item| aliases.resolve(item, site))
                .collect::<Result<Vec<_>, _>>()?;
            check_arity(pins.len(), *count).map_err(|e| coerce_error(e, site))?;
            for pin in &pins {
                registry.claim(pin, *usage, site)?;
            }
            Ok(Value::Pins(pins))
        }
        _ => value::coerce(kind, text).map_err(|e| coerce_error(e, site)),
    }
}

fn coerce_error(error: CoerceError, site: OptionSite<'_>) -> ConfigError {
    let section = site.section.to_string();
    let key = site.key.to_string();
    match error {
        CoerceError::Invalid(message) => ConfigError::InvalidValue {
            section,
            key,
            line: site.line,
            message,
        },
        CoerceError::OutOfRange(message) => ConfigError::RangeViolation {
            section,
            key,
            line: site.line,
            message,
        },
    }
}
