//! Cross-field and cross-section rules
//!
//! Runs after every value has been coerced and bounds-checked, so the rules
//! here only see well-typed values.

use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::config::Section;
use crate::error::ConfigError;
use crate::schema::{self, DISPLAY_BUTTON_PARTS, ST7796S_BUS_PINS, ST7796S_KEYS};

/// Touch button option suffixes
pub(crate) const TOUCH_BUTTON_PARTS: &[&str] = &[
    "_points",
    "_function",
    "_gcode",
    "_repeat_function",
    "_repeat_gcode",
    "_longpress_function",
    "_longpress_gcode",
];

/// Run every rule over the coerced sections
pub fn check(sections: &[Section]) -> Result<(), ConfigError> {
    let heaters = heater_names(sections);
    let steppers: BTreeSet<&str> = sections
        .iter()
        .filter(|s| is_stepper(s.kind()))
        .map(|s| s.kind())
        .collect();

    for section in sections {
        if section.get("max_temp").is_some() {
            check_temperatures(section)?;
        }
        if section.get("heater_pin").is_some() {
            check_heater(section)?;
        }
        if section.get("position_max").is_some() {
            check_rail(section)?;
        }
        if let Some(endstop) = section.pin("endstop_pin") {
            if endstop.is_virtual() && section.kind() != "stepper_z" {
                return Err(section.invalid(
                    "endstop_pin",
                    format!("{} is only available to stepper_z", endstop),
                ));
            }
        }

        match schema::base_kind(section.kind()) {
            "verify_heater" => {
                let target = section.name().unwrap_or_default();
                if !heaters.contains(target) {
                    return Err(ConfigError::UnknownSection {
                        section: section.id().to_string(),
                        line: section.line(),
                    });
                }
            }
            "heater_fan" | "controller_fan" => {
                check_names(section, "heater", &heaters, "heater")?;
                check_names(section, "stepper", &steppers, "stepper")?;
            }
            "display" => check_display(section)?,
            "xpt2046" => check_touch(section)?,
            _ => {}
        }
    }

    check_single_probe(sections)
}

/// Names other sections use to refer to heaters
fn heater_names(sections: &[Section]) -> BTreeSet<&str> {
    sections
        .iter()
        .filter(|s| schema::lookup(s.kind()).is_some_and(|schema| schema.heater))
        .map(|s| s.name().unwrap_or(s.kind()))
        .collect()
}

fn is_stepper(kind: &str) -> bool {
    kind.starts_with("stepper_") || schema::base_kind(kind) == "extruder"
}

fn check_names(
    section: &Section,
    key: &str,
    known: &BTreeSet<&str>,
    what: &str,
) -> Result<(), ConfigError> {
    if let Some(names) = section.list(key) {
        if let Some(name) = names.iter().find(|n| !known.contains(n.as_str())) {
            return Err(section.range(key, format!("refers to unknown {} '{}'", what, name)));
        }
    }
    Ok(())
}

fn check_temperatures(section: &Section) -> Result<(), ConfigError> {
    let min = section.require_float("min_temp")?;
    let max = section.require_float("max_temp")?;
    if min > max {
        return Err(section.range(
            "min_temp",
            format!("({}) must not exceed max_temp ({})", min, max),
        ));
    }
    if let Some(extrude) = section.float("min_extrude_temp") {
        if extrude < min || extrude > max {
            return Err(section.range(
                "min_extrude_temp",
                format!("({}) must be between min_temp ({}) and max_temp ({})", extrude, min, max),
            ));
        }
    }
    Ok(())
}

fn check_heater(section: &Section) -> Result<(), ConfigError> {
    if section.get("sensor_pin").is_none() {
        return Err(section.missing("sensor_pin"));
    }
    if section.str("control") == Some("pid") {
        for key in ["pid_kp", "pid_ki", "pid_kd"] {
            section.require_float(key)?;
        }
    }
    Ok(())
}

/// Infer which way an axis homes from where its endstop sits
///
/// Endstops in the lower quarter of travel home towards the minimum, those
/// in the upper quarter towards the maximum.
pub fn infer_homing_positive_dir(min: f64, endstop: f64, max: f64) -> Option<bool> {
    let quarter = (max - min) / 4.0;
    if endstop <= min + quarter {
        Some(false)
    } else if endstop >= max - quarter {
        Some(true)
    } else {
        None
    }
}

fn check_rail(section: &Section) -> Result<(), ConfigError> {
    let min = section.require_float("position_min")?;
    let max = section.require_float("position_max")?;
    if min >= max {
        return Err(section.range(
            "position_max",
            format!("({}) must be greater than position_min ({})", max, min),
        ));
    }

    let virtual_endstop = section.pin("endstop_pin").is_some_and(|p| p.is_virtual());
    let Some(endstop) = section.float("position_endstop") else {
        if virtual_endstop {
            return Ok(());
        }
        return Err(section.missing("position_endstop"));
    };
    if endstop < min || endstop > max {
        return Err(section.range(
            "position_endstop",
            format!("({}) must be between position_min ({}) and position_max ({})", endstop, min, max),
        ));
    }

    // Homing away from an endstop at the end of travel never triggers it
    match section.bool("homing_positive_dir") {
        Some(true) if endstop <= min => Err(section.range(
            "homing_positive_dir",
            format!("cannot be true with position_endstop at position_min ({})", min),
        )),
        Some(false) if endstop >= max => Err(section.range(
            "homing_positive_dir",
            format!("cannot be false with position_endstop at position_max ({})", max),
        )),
        Some(_) => Ok(()),
        None if infer_homing_positive_dir(min, endstop, max).is_none() => {
            Err(section.missing("homing_positive_dir"))
        }
        None => Ok(()),
    }
}

fn check_single_probe(sections: &[Section]) -> Result<(), ConfigError> {
    let mut probes = sections
        .iter()
        .filter(|s| matches!(s.kind(), "probe" | "bltouch"));
    if let (Some(first), Some(second)) = (probes.next(), probes.next()) {
        return Err(ConfigError::DuplicateSection {
            section: second.id().to_string(),
            line: second.line(),
            first_line: first.line(),
        });
    }
    Ok(())
}

/// Family indices must run 0, 1, 2, ... without gaps
///
/// The first option of an index past a gap is reported as unknown, since
/// nothing would ever read it.
fn check_contiguous(section: &Section, indices: &[u32], parts: &[&str]) -> Result<(), ConfigError> {
    for (expected, &index) in (0u32..).zip(indices) {
        if index != expected {
            let key = parts
                .iter()
                .map(|part| format!("button{}{}", index, part))
                .find(|key| section.get(key).is_some())
                .unwrap_or_else(|| format!("button{}", index));
            return Err(section.unknown(&key));
        }
    }
    Ok(())
}

fn check_display(section: &Section) -> Result<(), ConfigError> {
    let buttons = section.family_indices("button", DISPLAY_BUTTON_PARTS);

    if section.str("lcd_type") != Some("st7796s") {
        if let Some(key) = ST7796S_KEYS.iter().find(|k| section.is_set(k)) {
            return Err(section.unknown(key));
        }
        if let Some(index) = buttons.first() {
            let key = DISPLAY_BUTTON_PARTS
                .iter()
                .map(|part| format!("button{}{}", index, part))
                .find(|key| section.get(key).is_some())
                .unwrap_or_default();
            return Err(section.unknown(&key));
        }
        return Ok(());
    }

    for key in ST7796S_BUS_PINS
        .iter()
        .chain(&["resx_pin", "screen_width", "screen_height", "rect"])
    {
        if section.get(key).is_none() {
            return Err(section.missing(key));
        }
    }

    let chip = &section.require_pin(ST7796S_BUS_PINS[0])?.chip;
    for key in &ST7796S_BUS_PINS[1..] {
        if section.require_pin(key)?.chip != *chip {
            return Err(section.invalid(key, "st7796s pins must all be on the same mcu".to_string()));
        }
    }

    let width = i32::try_from(section.require_int("screen_width")?)
        .map_err(|_| section.range("screen_width", "is too large".to_string()))?;
    let height = i32::try_from(section.require_int("screen_height")?)
        .map_err(|_| section.range("screen_height", "is too large".to_string()))?;

    let rect = section.require_rect("rect")?;
    if !rect.fits_screen(width, height) {
        return Err(section.range("rect", format!("lies outside the {}x{} display", width, height)));
    }

    check_contiguous(section, &buttons, DISPLAY_BUTTON_PARTS)?;
    for index in buttons {
        let key = |part: &str| format!("button{}{}", index, part);
        for &part in DISPLAY_BUTTON_PARTS {
            if section.get(&key(part)).is_none() {
                return Err(section.missing(&key(part)));
            }
        }

        let rect = section.require_rect(&key("_rect"))?;
        if !rect.fits_screen(width, height) {
            return Err(section.range(
                &key("_rect"),
                format!("lies outside the {}x{} display", width, height),
            ));
        }
        let glyph = section.require_glyph(&key("_glyph"))?;
        let fits = i32::try_from(glyph.width()).is_ok_and(|w| w <= rect.width())
            && i32::try_from(glyph.height()).is_ok_and(|h| h <= rect.height());
        if !fits {
            return Err(section.range(
                &key("_glyph"),
                format!(
                    "({}x{}) does not fit its {}x{} button",
                    glyph.width(),
                    glyph.height(),
                    rect.width(),
                    rect.height()
                ),
            ));
        }
    }
    Ok(())
}

fn check_touch(section: &Section) -> Result<(), ConfigError> {
    let software_spi = ["spi_software_sclk_pin", "spi_software_mosi_pin", "spi_software_miso_pin"];
    if software_spi.iter().any(|k| section.get(k).is_some()) {
        if let Some(key) = software_spi.iter().find(|k| section.get(k).is_none()) {
            return Err(section.missing(key));
        }
    }

    let buttons = section.family_indices("button", TOUCH_BUTTON_PARTS);
    check_contiguous(section, &buttons, TOUCH_BUTTON_PARTS)?;

    for index in buttons {
        let key = |part: &str| format!("button{}{}", index, part);

        let points_key = key("_points");
        let points = section.points(&points_key).ok_or_else(|| section.missing(&points_key))?;
        if points.len() < 3 {
            return Err(section.range(
                &points_key,
                format!("describes a polygon with {} vertices, at least 3 expected", points.len()),
            ));
        }

        let mut actions: Vec<&str> = Vec::new();
        for action in ["", "_repeat", "_longpress"] {
            let function = format!("button{}{}_function", index, action);
            let gcode = format!("button{}{}_gcode", index, action);
            match (section.get(&function).is_some(), section.get(&gcode).is_some()) {
                (true, true) => {
                    return Err(section.range(&gcode, format!("cannot be combined with {}", function)));
                }
                (false, false) => {}
                _ => actions.push(action),
            }
        }

        if actions.is_empty() {
            return Err(section.missing(&key("_function")));
        }
        if actions.contains(&"_repeat") && actions.contains(&"_longpress") {
            let repeat: String = [key("_repeat_function"), key("_repeat_gcode")]
                .into_iter()
                .find(|k| section.get(k).is_some())
                .unwrap_or_default();
            return Err(section.range(
                &repeat,
                "repeat and longpress actions cannot be defined at the same time".to_string(),
            ));
        }
    }
    Ok(())
}
