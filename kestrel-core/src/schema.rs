//! Declarative section schemas
//!
//! Each section type is a static table of option specs. The loader walks
//! these tables to reject unknown options, fill in defaults and pick the
//! coercion for each value; nothing about a section type lives outside its
//! table except the cross-field rules in [`crate::validate`].

use crate::document::SectionId;
use crate::pins::{PinKind, PinUse};

/// Numeric bounds, as `getfloat(minval, maxval, above, below)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub above: Option<f64>,
    pub below: Option<f64>,
}

impl Bounds {
    pub const NONE: Bounds = Bounds {
        min: None,
        max: None,
        above: None,
        below: None,
    };

    pub const fn min(min: f64) -> Self {
        Bounds {
            min: Some(min),
            ..Self::NONE
        }
    }

    pub const fn above(above: f64) -> Self {
        Bounds {
            above: Some(above),
            ..Self::NONE
        }
    }

    pub const fn range(min: f64, max: f64) -> Self {
        Bounds {
            min: Some(min),
            max: Some(max),
            ..Self::NONE
        }
    }

    /// `above < v <= max`
    pub const fn above_max(above: f64, max: f64) -> Self {
        Bounds {
            above: Some(above),
            max: Some(max),
            ..Self::NONE
        }
    }
}

/// How a raw value is coerced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    /// Single-line string, kept as written
    Str,
    /// Multi-line text (gcode templates)
    Text,
    Float(Bounds),
    Int(Bounds),
    Bool,
    /// One of a fixed set of words
    Choice(&'static [&'static str]),
    Pin(PinUse),
    /// Comma separated pins; `count` fixes the arity when set
    PinList { usage: PinUse, count: Option<usize> },
    /// Comma separated floats; `count` fixes the arity when set
    FloatList { count: Option<usize> },
    /// Comma separated words
    List,
    /// `80:16, 48:16`, reduced to the overall ratio
    GearRatio,
    /// `r, g, b`
    Color,
    /// `left, top, right, bottom`
    Rect,
    /// One `x, y` pair per line
    Points,
    /// Multi-line bitmap
    Glyph,
    /// `NAME=PIN` pairs for the alias table
    Aliases,
}

/// Whether an option must be present
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Presence {
    Required,
    Optional,
    /// Absent options take this raw value, coerced like a written one
    Default(&'static str),
}

/// One option of a section type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionSpec {
    pub key: &'static str,
    pub kind: ValueKind,
    pub presence: Presence,
}

const fn req(key: &'static str, kind: ValueKind) -> OptionSpec {
    OptionSpec {
        key,
        kind,
        presence: Presence::Required,
    }
}

const fn opt(key: &'static str, kind: ValueKind) -> OptionSpec {
    OptionSpec {
        key,
        kind,
        presence: Presence::Optional,
    }
}

const fn def(key: &'static str, kind: ValueKind, default: &'static str) -> OptionSpec {
    OptionSpec {
        key,
        kind,
        presence: Presence::Default(default),
    }
}

/// A set of options sharing a name pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FamilyPattern {
    /// `{prefix}{index}{suffix}`, e.g. `button3_rect`
    Indexed {
        prefix: &'static str,
        suffix: &'static str,
    },
    /// Any key starting with the prefix, e.g. `aliases_exp1`
    Prefixed(&'static str),
}

impl FamilyPattern {
    /// Match a key, returning the index for indexed families
    pub fn matches(&self, key: &str) -> Option<Option<u32>> {
        match *self {
            FamilyPattern::Indexed { prefix, suffix } => {
                let digits = key.strip_prefix(prefix)?.strip_suffix(suffix)?;
                parse_index(digits).map(Some)
            }
            FamilyPattern::Prefixed(prefix) => {
                let rest = key.strip_prefix(prefix)?;
                (!rest.is_empty()).then_some(None)
            }
        }
    }
}

/// Family of options, all optional
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FamilySpec {
    pub pattern: FamilyPattern,
    pub kind: ValueKind,
}

/// Instance name policy for `[type name]` headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instance {
    Forbidden,
    Required,
    Optional,
}

/// How `type1`, `type2`, ... variants are handled
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numbered {
    No,
    /// Numbered variants use this same schema
    Same,
    /// Numbered variants use a reduced schema
    Extra(&'static SectionSchema),
}

/// Schema of one section type
#[derive(Debug, PartialEq)]
pub struct SectionSchema {
    pub kind: &'static str,
    pub instance: Instance,
    pub numbered: Numbered,
    pub options: &'static [&'static [OptionSpec]],
    pub families: &'static [FamilySpec],
    /// Section defines a heater other sections can refer to
    pub heater: bool,
}

impl SectionSchema {
    /// Find a fixed option by key
    pub fn option(&self, key: &str) -> Option<&'static OptionSpec> {
        self.options.iter().flat_map(|group| group.iter()).find(|o| o.key == key)
    }

    /// Find the family a key belongs to
    pub fn family(&self, key: &str) -> Option<(&'static FamilySpec, Option<u32>)> {
        self.families
            .iter()
            .find_map(|f| f.pattern.matches(key).map(|index| (f, index)))
    }

    /// Coercion for a key, fixed options first
    pub fn kind_of(&self, key: &str) -> Option<ValueKind> {
        self.option(key)
            .map(|o| o.kind)
            .or_else(|| self.family(key).map(|(f, _)| f.kind))
    }

    /// All fixed options in declaration order
    pub fn all_options(&self) -> impl Iterator<Item = &'static OptionSpec> {
        let options: &'static [&'static [OptionSpec]] = self.options;
        options.iter().flat_map(|group| group.iter())
    }
}

/// Find the schema for a section type
///
/// Numbered variants (`stepper_z1`, `extruder2`) resolve to their base
/// type's numbered schema.
pub fn lookup(kind: &str) -> Option<&'static SectionSchema> {
    if let Some(schema) = SCHEMAS.iter().copied().find(|s| s.kind == kind) {
        return Some(schema);
    }
    let base = kind.trim_end_matches(|c: char| c.is_ascii_digit());
    parse_index(&kind[base.len()..])?;
    let schema = SCHEMAS.iter().copied().find(|s| s.kind == base)?;
    match schema.numbered {
        Numbered::No => None,
        Numbered::Same => Some(schema),
        Numbered::Extra(extra) => Some(extra),
    }
}

/// Check whether a section would accept an option
pub fn accepts_key(id: &SectionId, key: &str) -> bool {
    lookup(&id.kind).is_some_and(|schema| schema.kind_of(key).is_some())
}

/// Base type of a possibly numbered section kind
pub fn base_kind(kind: &str) -> &str {
    match lookup(kind) {
        Some(schema) if schema.kind != kind => {
            kind.trim_end_matches(|c: char| c.is_ascii_digit())
        }
        Some(schema) => schema.kind,
        None => kind,
    }
}

/// Parse a family or variant index: decimal, no leading zeros
fn parse_index(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

// ============================================================================
// Shared option groups
// ============================================================================

const OUT: ValueKind = ValueKind::Pin(PinUse::exclusive(PinKind::Output));
const OUT_SHARED: ValueKind = ValueKind::Pin(PinUse::shared(PinKind::Output));
const IN: ValueKind = ValueKind::Pin(PinUse::exclusive(PinKind::Input));
const IN_SHARED: ValueKind = ValueKind::Pin(PinUse::shared(PinKind::Input));
const ADC: ValueKind = ValueKind::Pin(PinUse::exclusive(PinKind::Adc));

const ANY: ValueKind = ValueKind::Float(Bounds::NONE);
const POSITIVE: ValueKind = ValueKind::Float(Bounds::above(0.0));
const NON_NEGATIVE: ValueKind = ValueKind::Float(Bounds::min(0.0));
const FRACTION: ValueKind = ValueKind::Float(Bounds::range(0.0, 1.0));
const POWER: ValueKind = ValueKind::Float(Bounds::above_max(0.0, 1.0));
const COUNT: ValueKind = ValueKind::Int(Bounds::min(1.0));
const INT_NON_NEGATIVE: ValueKind = ValueKind::Int(Bounds::min(0.0));

const SHAPERS: &[&str] = &["zv", "mzv", "zvd", "ei", "2hump_ei", "3hump_ei"];

/// Pins and geometry common to every stepper
const STEPPER_DRIVE: &[OptionSpec] = &[
    req("step_pin", OUT),
    req("dir_pin", OUT),
    opt("enable_pin", OUT_SHARED),
    req("microsteps", COUNT),
    req("rotation_distance", POSITIVE),
    def("full_steps_per_rotation", COUNT, "200"),
    opt("gear_ratio", ValueKind::GearRatio),
    def("step_pulse_duration", NON_NEGATIVE, "0.000002"),
];

/// Homing rail of a primary axis
const STEPPER_RAIL: &[OptionSpec] = &[
    req("endstop_pin", IN_SHARED),
    def("position_min", ANY, "0"),
    opt("position_endstop", ANY),
    req("position_max", ANY),
    def("homing_speed", POSITIVE, "5"),
    opt("second_homing_speed", POSITIVE),
    def("homing_retract_dist", NON_NEGATIVE, "5"),
    opt("homing_retract_speed", POSITIVE),
    opt("homing_positive_dir", ValueKind::Bool),
];

/// Temperature sensing shared by heaters and sensors
const SENSOR: &[OptionSpec] = &[
    req("sensor_type", ValueKind::Str),
    opt("sensor_pin", ADC),
    def("pullup_resistor", POSITIVE, "4700"),
    def("inline_resistor", NON_NEGATIVE, "0"),
    req("min_temp", ANY),
    req("max_temp", ANY),
];

/// Heater output and control loop
const HEATER: &[OptionSpec] = &[
    req("heater_pin", OUT),
    req("control", ValueKind::Choice(&["watermark", "pid"])),
    opt("pid_kp", ANY),
    opt("pid_ki", ANY),
    opt("pid_kd", ANY),
    def("max_delta", POSITIVE, "2"),
    def("max_power", POWER, "1"),
    def("smooth_time", POSITIVE, "1"),
    def("pwm_cycle_time", POSITIVE, "0.1"),
];

const FAN: &[OptionSpec] = &[
    req("pin", OUT),
    def("max_power", POWER, "1"),
    def("shutdown_speed", FRACTION, "0"),
    def("cycle_time", POSITIVE, "0.010"),
    def("hardware_pwm", ValueKind::Bool, "False"),
    def("kick_start_time", NON_NEGATIVE, "0.1"),
    def("off_below", FRACTION, "0"),
    opt("enable_pin", OUT_SHARED),
    opt("tachometer_pin", IN),
    def("tachometer_ppr", COUNT, "2"),
];

/// Probe placement and sampling
const PROBING: &[OptionSpec] = &[
    def("x_offset", ANY, "0"),
    def("y_offset", ANY, "0"),
    req("z_offset", ANY),
    def("speed", POSITIVE, "5"),
    opt("lift_speed", POSITIVE),
    def("samples", COUNT, "1"),
    def("sample_retract_dist", POSITIVE, "2"),
    def("samples_result", ValueKind::Choice(&["median", "average"]), "average"),
    def("samples_tolerance", NON_NEGATIVE, "0.100"),
    def("samples_tolerance_retries", INT_NON_NEGATIVE, "0"),
];

// ============================================================================
// Section tables
// ============================================================================

pub static MCU: SectionSchema = SectionSchema {
    kind: "mcu",
    instance: Instance::Optional,
    numbered: Numbered::No,
    options: &[&[
        req("serial", ValueKind::Str),
        def("baud", ValueKind::Int(Bounds::min(2400.0)), "250000"),
        opt(
            "restart_method",
            ValueKind::Choice(&["arduino", "cheetah", "rpi_usb", "command"]),
        ),
        opt("canbus_uuid", ValueKind::Str),
    ]],
    families: &[],
    heater: false,
};

pub static PRINTER: SectionSchema = SectionSchema {
    kind: "printer",
    instance: Instance::Forbidden,
    numbered: Numbered::No,
    options: &[&[
        req(
            "kinematics",
            ValueKind::Choice(&["cartesian", "corexy", "corexz", "delta", "none"]),
        ),
        req("max_velocity", POSITIVE),
        req("max_accel", POSITIVE),
        opt("max_z_velocity", POSITIVE),
        opt("max_z_accel", POSITIVE),
        def("square_corner_velocity", NON_NEGATIVE, "5"),
        opt("minimum_cruise_ratio", ValueKind::Float(Bounds {
            min: Some(0.0),
            below: Some(1.0),
            ..Bounds::NONE
        })),
    ]],
    families: &[],
    heater: false,
};

pub static BOARD_PINS: SectionSchema = SectionSchema {
    kind: "board_pins",
    instance: Instance::Optional,
    numbered: Numbered::No,
    options: &[&[def("mcu", ValueKind::List, "mcu"), opt("aliases", ValueKind::Aliases)]],
    families: &[FamilySpec {
        pattern: FamilyPattern::Prefixed("aliases_"),
        kind: ValueKind::Aliases,
    }],
    heater: false,
};

/// Additional steppers driving the same axis (`stepper_z1`)
pub static STEPPER_EXTRA: SectionSchema = SectionSchema {
    kind: "stepper",
    instance: Instance::Forbidden,
    numbered: Numbered::No,
    options: &[STEPPER_DRIVE, &[opt("endstop_pin", IN_SHARED)]],
    families: &[],
    heater: false,
};

macro_rules! stepper_schema {
    ($name:ident, $kind:literal) => {
        pub static $name: SectionSchema = SectionSchema {
            kind: $kind,
            instance: Instance::Forbidden,
            numbered: Numbered::Extra(&STEPPER_EXTRA),
            options: &[STEPPER_DRIVE, STEPPER_RAIL],
            families: &[],
            heater: false,
        };
    };
}

stepper_schema!(STEPPER_X, "stepper_x");
stepper_schema!(STEPPER_Y, "stepper_y");
stepper_schema!(STEPPER_Z, "stepper_z");

pub static EXTRUDER: SectionSchema = SectionSchema {
    kind: "extruder",
    instance: Instance::Forbidden,
    numbered: Numbered::Same,
    options: &[
        STEPPER_DRIVE,
        SENSOR,
        HEATER,
        &[
            req("nozzle_diameter", POSITIVE),
            req("filament_diameter", POSITIVE),
            opt("max_extrude_only_distance", NON_NEGATIVE),
            opt("max_extrude_only_velocity", POSITIVE),
            opt("max_extrude_only_accel", POSITIVE),
            opt("max_extrude_cross_section", POSITIVE),
            def("pressure_advance", NON_NEGATIVE, "0"),
            def(
                "pressure_advance_smooth_time",
                ValueKind::Float(Bounds::above_max(0.0, 0.200)),
                "0.040",
            ),
            def("instantaneous_corner_velocity", NON_NEGATIVE, "1"),
            def("min_extrude_temp", ANY, "170"),
        ],
    ],
    families: &[],
    heater: true,
};

pub static HEATER_BED: SectionSchema = SectionSchema {
    kind: "heater_bed",
    instance: Instance::Forbidden,
    numbered: Numbered::No,
    options: &[SENSOR, HEATER],
    families: &[],
    heater: true,
};

pub static HEATER_GENERIC: SectionSchema = SectionSchema {
    kind: "heater_generic",
    instance: Instance::Required,
    numbered: Numbered::No,
    options: &[SENSOR, HEATER, &[opt("gcode_id", ValueKind::Str)]],
    families: &[],
    heater: true,
};

pub static VERIFY_HEATER: SectionSchema = SectionSchema {
    kind: "verify_heater",
    instance: Instance::Required,
    numbered: Numbered::No,
    options: &[&[
        def("max_error", POSITIVE, "120"),
        opt("check_gain_time", ValueKind::Float(Bounds::min(1.0))),
        def("hysteresis", NON_NEGATIVE, "5"),
        def("heating_gain", POSITIVE, "2"),
    ]],
    families: &[],
    heater: false,
};

pub static TEMPERATURE_SENSOR: SectionSchema = SectionSchema {
    kind: "temperature_sensor",
    instance: Instance::Required,
    numbered: Numbered::No,
    options: &[SENSOR, &[opt("gcode_id", ValueKind::Str)]],
    families: &[],
    heater: false,
};

pub static FAN_SECTION: SectionSchema = SectionSchema {
    kind: "fan",
    instance: Instance::Forbidden,
    numbered: Numbered::No,
    options: &[FAN],
    families: &[],
    heater: false,
};

pub static HEATER_FAN: SectionSchema = SectionSchema {
    kind: "heater_fan",
    instance: Instance::Required,
    numbered: Numbered::No,
    options: &[
        FAN,
        &[
            def("heater", ValueKind::List, "extruder"),
            def("heater_temp", ANY, "50"),
            def("fan_speed", FRACTION, "1"),
        ],
    ],
    families: &[],
    heater: false,
};

pub static CONTROLLER_FAN: SectionSchema = SectionSchema {
    kind: "controller_fan",
    instance: Instance::Required,
    numbered: Numbered::No,
    options: &[
        FAN,
        &[
            def("fan_speed", FRACTION, "1"),
            opt("idle_speed", FRACTION),
            def("idle_timeout", INT_NON_NEGATIVE, "30"),
            opt("heater", ValueKind::List),
            opt("stepper", ValueKind::List),
        ],
    ],
    families: &[],
    heater: false,
};

pub static INPUT_SHAPER: SectionSchema = SectionSchema {
    kind: "input_shaper",
    instance: Instance::Forbidden,
    numbered: Numbered::No,
    options: &[&[
        def("shaper_freq_x", NON_NEGATIVE, "0"),
        def("shaper_freq_y", NON_NEGATIVE, "0"),
        def("shaper_type", ValueKind::Choice(SHAPERS), "mzv"),
        opt("shaper_type_x", ValueKind::Choice(SHAPERS)),
        opt("shaper_type_y", ValueKind::Choice(SHAPERS)),
        def("damping_ratio_x", FRACTION, "0.1"),
        def("damping_ratio_y", FRACTION, "0.1"),
    ]],
    families: &[],
    heater: false,
};

pub static FIRMWARE_RETRACTION: SectionSchema = SectionSchema {
    kind: "firmware_retraction",
    instance: Instance::Forbidden,
    numbered: Numbered::No,
    options: &[&[
        def("retract_length", NON_NEGATIVE, "0"),
        def("retract_speed", POSITIVE, "20"),
        def("unretract_extra_length", NON_NEGATIVE, "0"),
        def("unretract_speed", POSITIVE, "10"),
    ]],
    families: &[],
    heater: false,
};

pub static PROBE: SectionSchema = SectionSchema {
    kind: "probe",
    instance: Instance::Forbidden,
    numbered: Numbered::No,
    options: &[&[req("pin", IN)], PROBING],
    families: &[],
    heater: false,
};

pub static BLTOUCH: SectionSchema = SectionSchema {
    kind: "bltouch",
    instance: Instance::Forbidden,
    numbered: Numbered::No,
    options: &[
        &[
            req("sensor_pin", IN),
            req("control_pin", OUT),
            def("pin_move_time", POSITIVE, "0.680"),
            def("stow_on_each_sample", ValueKind::Bool, "True"),
            def("probe_with_touch_mode", ValueKind::Bool, "False"),
            def("pin_up_reports_not_triggered", ValueKind::Bool, "True"),
            def("pin_up_touch_mode_reports_triggered", ValueKind::Bool, "True"),
        ],
        PROBING,
    ],
    families: &[],
    heater: false,
};

pub static SAFE_Z_HOME: SectionSchema = SectionSchema {
    kind: "safe_z_home",
    instance: Instance::Forbidden,
    numbered: Numbered::No,
    options: &[&[
        req("home_xy_position", ValueKind::FloatList { count: Some(2) }),
        def("speed", POSITIVE, "50"),
        opt("z_hop", ANY),
        def("z_hop_speed", POSITIVE, "15"),
        def("move_to_previous", ValueKind::Bool, "False"),
    ]],
    families: &[],
    heater: false,
};

/// Display types with a parallel 16-bit TFT bus
pub const LCD_TYPES: &[&str] = &["st7796s", "st7920", "uc1701", "ssd1306", "sh1106", "hd44780"];

/// Options only meaningful for `lcd_type: st7796s`
pub const ST7796S_KEYS: &[&str] = &[
    "dcx_pin",
    "wrx_pin",
    "d8_pin",
    "d9_pin",
    "d10_pin",
    "d11_pin",
    "d12_pin",
    "d13_pin",
    "d14_pin",
    "d15_pin",
    "resx_pin",
    "csx_pin",
    "rdx_pin",
    "screen_width",
    "screen_height",
    "fgcolor",
    "bgcolor",
    "rect",
];

/// Parallel bus pins of the st7796s, in bus order
pub const ST7796S_BUS_PINS: &[&str] = &[
    "dcx_pin", "wrx_pin", "d8_pin", "d9_pin", "d10_pin", "d11_pin", "d12_pin", "d13_pin",
    "d14_pin", "d15_pin",
];

pub static DISPLAY: SectionSchema = SectionSchema {
    kind: "display",
    instance: Instance::Forbidden,
    numbered: Numbered::No,
    options: &[
        &[
            req("lcd_type", ValueKind::Choice(LCD_TYPES)),
            opt(
                "encoder_pins",
                ValueKind::PinList {
                    usage: PinUse::exclusive(PinKind::Input),
                    count: Some(2),
                },
            ),
            opt("click_pin", IN),
            opt("kill_pin", IN),
            opt("back_pin", IN),
            def("menu_timeout", INT_NON_NEGATIVE, "0"),
            def("menu_reverse_navigation", ValueKind::Bool, "False"),
        ],
        &[
            opt("dcx_pin", OUT),
            opt("wrx_pin", OUT),
            opt("d8_pin", OUT),
            opt("d9_pin", OUT),
            opt("d10_pin", OUT),
            opt("d11_pin", OUT),
            opt("d12_pin", OUT),
            opt("d13_pin", OUT),
            opt("d14_pin", OUT),
            opt("d15_pin", OUT),
            opt("resx_pin", OUT),
            opt("csx_pin", OUT),
            opt("rdx_pin", OUT),
            opt("screen_width", COUNT),
            opt("screen_height", COUNT),
            opt("fgcolor", ValueKind::Color),
            opt("bgcolor", ValueKind::Color),
            opt("rect", ValueKind::Rect),
        ],
    ],
    families: &[
        FamilySpec {
            pattern: FamilyPattern::Indexed {
                prefix: "button",
                suffix: "_rect",
            },
            kind: ValueKind::Rect,
        },
        FamilySpec {
            pattern: FamilyPattern::Indexed {
                prefix: "button",
                suffix: "_fgcolor",
            },
            kind: ValueKind::Color,
        },
        FamilySpec {
            pattern: FamilyPattern::Indexed {
                prefix: "button",
                suffix: "_bgcolor",
            },
            kind: ValueKind::Color,
        },
        FamilySpec {
            pattern: FamilyPattern::Indexed {
                prefix: "button",
                suffix: "_glyph",
            },
            kind: ValueKind::Glyph,
        },
    ],
    heater: false,
};

/// Suffixes of the display button families
pub const DISPLAY_BUTTON_PARTS: &[&str] = &["_rect", "_fgcolor", "_bgcolor", "_glyph"];

const fn touch_family(suffix: &'static str, kind: ValueKind) -> FamilySpec {
    FamilySpec {
        pattern: FamilyPattern::Indexed {
            prefix: "button",
            suffix,
        },
        kind,
    }
}

pub static XPT2046: SectionSchema = SectionSchema {
    kind: "xpt2046",
    instance: Instance::Forbidden,
    numbered: Numbered::No,
    options: &[&[
        opt("cs_pin", OUT),
        req("penirq_pin", IN),
        opt("spi_bus", ValueKind::Str),
        def("spi_speed", ValueKind::Int(Bounds::min(1.0)), "25000"),
        opt("spi_software_sclk_pin", OUT),
        opt("spi_software_mosi_pin", OUT),
        opt("spi_software_miso_pin", IN),
    ]],
    families: &[
        touch_family("_points", ValueKind::Points),
        touch_family("_function", ValueKind::Str),
        touch_family("_gcode", ValueKind::Text),
        touch_family("_repeat_function", ValueKind::Str),
        touch_family("_repeat_gcode", ValueKind::Text),
        touch_family("_longpress_function", ValueKind::Str),
        touch_family("_longpress_gcode", ValueKind::Text),
    ],
    heater: false,
};

/// Every known section type
pub static SCHEMAS: &[&SectionSchema] = &[
    &MCU,
    &PRINTER,
    &BOARD_PINS,
    &STEPPER_X,
    &STEPPER_Y,
    &STEPPER_Z,
    &EXTRUDER,
    &HEATER_BED,
    &HEATER_GENERIC,
    &VERIFY_HEATER,
    &TEMPERATURE_SENSOR,
    &FAN_SECTION,
    &HEATER_FAN,
    &CONTROLLER_FAN,
    &INPUT_SHAPER,
    &FIRMWARE_RETRACTION,
    &PROBE,
    &BLTOUCH,
    &SAFE_Z_HOME,
    &DISPLAY,
    &XPT2046,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_exact() {
        assert_eq!(lookup("heater_bed").map(|s| s.kind), Some("heater_bed"));
        assert!(lookup("bogus").is_none());
    }

    #[test]
    fn test_lookup_numbered() {
        assert!(core::ptr::eq(lookup("stepper_z1").unwrap(), &STEPPER_EXTRA));
        assert!(core::ptr::eq(lookup("extruder1").unwrap(), &EXTRUDER));
        assert!(lookup("extruder01").is_none());
        assert!(lookup("heater_bed1").is_none());
        assert_eq!(base_kind("stepper_z1"), "stepper_z");
        assert_eq!(base_kind("extruder"), "extruder");
    }

    #[test]
    fn test_families() {
        let (family, index) = DISPLAY.family("button12_glyph").unwrap();
        assert_eq!(family.kind, ValueKind::Glyph);
        assert_eq!(index, Some(12));
        assert!(DISPLAY.family("button_glyph").is_none());
        assert!(DISPLAY.family("button01_rect").is_none());

        let (family, index) = BOARD_PINS.family("aliases_exp1").unwrap();
        assert_eq!(family.kind, ValueKind::Aliases);
        assert_eq!(index, None);
        assert!(BOARD_PINS.family("aliases_").is_none());
    }

    #[test]
    fn test_touch_families_do_not_overlap() {
        // "_repeat_function" must not be read as "_function" with index "0_repeat"
        let (family, index) = XPT2046.family("button0_repeat_function").unwrap();
        assert_eq!(index, Some(0));
        assert_eq!(
            family.pattern,
            FamilyPattern::Indexed {
                prefix: "button",
                suffix: "_repeat_function"
            }
        );
    }

    #[test]
    fn test_accepts_key() {
        assert!(accepts_key(&SectionId::new("extruder"), "control"));
        assert!(accepts_key(&SectionId::new("extruder"), "pid_kp"));
        assert!(!accepts_key(&SectionId::new("extruder"), "bogus_key"));
        assert!(accepts_key(&SectionId::named("heater_generic", "chamber"), "pid_kd"));
        assert!(!accepts_key(&SectionId::new("nonexistent"), "pin"));
    }

    #[test]
    fn test_no_duplicate_keys_in_tables() {
        for schema in SCHEMAS {
            let keys: alloc::vec::Vec<_> = schema.all_options().map(|o| o.key).collect();
            for (i, key) in keys.iter().enumerate() {
                assert!(
                    !keys[i + 1..].contains(key),
                    "[{}] declares '{}' twice",
                    schema.kind,
                    key
                );
            }
        }
    }
}
