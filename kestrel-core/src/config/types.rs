//! Motion and thermal configuration types
//!
//! Built from validated [`Section`]s. Defaults that depend on other options
//! (second homing speed, idle fan speed, per-axis shaper type) are resolved
//! here so collaborators never see an unset value.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use super::Section;
use crate::error::ConfigError;
use crate::pins::ResolvedPin;
use crate::validate::infer_homing_positive_dir;

/// Secondary (or primary) MCU connection
#[derive(Debug, Clone, PartialEq)]
pub struct McuConfig {
    /// `None` for the primary `[mcu]`
    pub name: Option<String>,
    pub serial: String,
    pub baud: u32,
    pub restart_method: Option<String>,
    pub canbus_uuid: Option<String>,
}

impl McuConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        Ok(Self {
            name: s.name().map(ToString::to_string),
            serial: s.require_str("serial")?.to_string(),
            baud: u32::try_from(s.require_int("baud")?)
                .map_err(|_| s.range("baud", "is too large".to_string()))?,
            restart_method: s.str("restart_method").map(ToString::to_string),
            canbus_uuid: s.str("canbus_uuid").map(ToString::to_string),
        })
    }
}

/// Kinematic model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Kinematics {
    Cartesian,
    CoreXy,
    CoreXz,
    Delta,
    None,
}

impl Kinematics {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "cartesian" => Some(Kinematics::Cartesian),
            "corexy" => Some(Kinematics::CoreXy),
            "corexz" => Some(Kinematics::CoreXz),
            "delta" => Some(Kinematics::Delta),
            "none" => Some(Kinematics::None),
            _ => None,
        }
    }
}

/// `[printer]` motion limits
#[derive(Debug, Clone, PartialEq)]
pub struct PrinterSection {
    pub kinematics: Kinematics,
    /// mm/s
    pub max_velocity: f64,
    /// mm/s^2
    pub max_accel: f64,
    /// Defaults to `max_velocity`
    pub max_z_velocity: f64,
    /// Defaults to `max_accel`
    pub max_z_accel: f64,
    pub square_corner_velocity: f64,
    pub minimum_cruise_ratio: Option<f64>,
}

impl PrinterSection {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let max_velocity = s.require_float("max_velocity")?;
        let max_accel = s.require_float("max_accel")?;
        let kinematics = Kinematics::parse(s.require_str("kinematics")?)
            .ok_or_else(|| s.invalid("kinematics", "unknown kinematics".to_string()))?;
        Ok(Self {
            kinematics,
            max_velocity,
            max_accel,
            max_z_velocity: s.float("max_z_velocity").unwrap_or(max_velocity),
            max_z_accel: s.float("max_z_accel").unwrap_or(max_accel),
            square_corner_velocity: s.require_float("square_corner_velocity")?,
            minimum_cruise_ratio: s.float("minimum_cruise_ratio"),
        })
    }
}

/// Homing rail of a primary axis
#[derive(Debug, Clone, PartialEq)]
pub struct RailConfig {
    pub position_min: f64,
    /// `None` when homing against the probe
    pub position_endstop: Option<f64>,
    pub position_max: f64,
    pub homing_speed: f64,
    pub second_homing_speed: f64,
    pub homing_retract_dist: f64,
    pub homing_retract_speed: f64,
    pub homing_positive_dir: bool,
}

impl RailConfig {
    fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let position_min = s.require_float("position_min")?;
        let position_max = s.require_float("position_max")?;
        let position_endstop = s.float("position_endstop");
        let homing_speed = s.require_float("homing_speed")?;

        let homing_positive_dir = match (s.bool("homing_positive_dir"), position_endstop) {
            (Some(dir), _) => dir,
            (None, Some(endstop)) => {
                infer_homing_positive_dir(position_min, endstop, position_max)
                    .ok_or_else(|| s.missing("homing_positive_dir"))?
            }
            (None, None) => false,
        };

        Ok(Self {
            position_min,
            position_endstop,
            position_max,
            homing_speed,
            second_homing_speed: s.float("second_homing_speed").unwrap_or(homing_speed / 2.0),
            homing_retract_dist: s.require_float("homing_retract_dist")?,
            homing_retract_speed: s.float("homing_retract_speed").unwrap_or(homing_speed),
            homing_positive_dir,
        })
    }
}

/// One stepper motor
#[derive(Debug, Clone, PartialEq)]
pub struct StepperConfig {
    /// Section name, e.g. "stepper_z1" or "extruder"
    pub name: String,
    pub step_pin: ResolvedPin,
    pub dir_pin: ResolvedPin,
    pub enable_pin: Option<ResolvedPin>,
    pub endstop_pin: Option<ResolvedPin>,
    pub microsteps: u32,
    pub rotation_distance: f64,
    pub full_steps_per_rotation: u32,
    /// Product of all gear stages, 1.0 without gearing
    pub gear_ratio: f64,
    pub step_pulse_duration: f64,
    /// Only primary axes have a rail
    pub rail: Option<RailConfig>,
}

impl StepperConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let count = |key: &str| -> Result<u32, ConfigError> {
            u32::try_from(s.require_int(key)?).map_err(|_| s.range(key, "is too large".to_string()))
        };
        let rail = match s.get("position_max") {
            Some(_) => Some(RailConfig::from_section(s)?),
            None => None,
        };
        Ok(Self {
            name: s.kind().to_string(),
            step_pin: s.require_pin("step_pin")?.clone(),
            dir_pin: s.require_pin("dir_pin")?.clone(),
            enable_pin: s.pin("enable_pin").cloned(),
            endstop_pin: s.pin("endstop_pin").cloned(),
            microsteps: count("microsteps")?,
            rotation_distance: s.require_float("rotation_distance")?,
            full_steps_per_rotation: count("full_steps_per_rotation")?,
            gear_ratio: s.float("gear_ratio").unwrap_or(1.0),
            step_pulse_duration: s.require_float("step_pulse_duration")?,
            rail,
        })
    }

    /// Distance travelled per microstep
    pub fn step_distance(&self) -> f64 {
        self.rotation_distance
            / (self.full_steps_per_rotation as f64 * self.microsteps as f64 * self.gear_ratio)
    }
}

/// Temperature sensor wiring and limits
#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    pub sensor_type: String,
    pub sensor_pin: Option<ResolvedPin>,
    pub pullup_resistor: f64,
    pub inline_resistor: f64,
    pub min_temp: f64,
    pub max_temp: f64,
}

impl SensorConfig {
    fn from_section(s: &Section) -> Result<Self, ConfigError> {
        Ok(Self {
            sensor_type: s.require_str("sensor_type")?.to_string(),
            sensor_pin: s.pin("sensor_pin").cloned(),
            pullup_resistor: s.require_float("pullup_resistor")?,
            inline_resistor: s.require_float("inline_resistor")?,
            min_temp: s.require_float("min_temp")?,
            max_temp: s.require_float("max_temp")?,
        })
    }
}

/// Heater control algorithm
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaterControl {
    /// Bang-bang around the target, +/- `max_delta`
    Watermark { max_delta: f64 },
    Pid { kp: f64, ki: f64, kd: f64 },
}

/// A heater with its sensor
#[derive(Debug, Clone, PartialEq)]
pub struct HeaterConfig {
    /// Name other sections use, e.g. "extruder", "heater_bed", "chamber"
    pub name: String,
    pub heater_pin: ResolvedPin,
    pub sensor: SensorConfig,
    pub control: HeaterControl,
    pub max_power: f64,
    pub smooth_time: f64,
    pub pwm_cycle_time: f64,
}

impl HeaterConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let control = match s.require_str("control")? {
            "pid" => HeaterControl::Pid {
                kp: s.require_float("pid_kp")?,
                ki: s.require_float("pid_ki")?,
                kd: s.require_float("pid_kd")?,
            },
            _ => HeaterControl::Watermark {
                max_delta: s.require_float("max_delta")?,
            },
        };
        Ok(Self {
            name: s.name().unwrap_or(s.kind()).to_string(),
            heater_pin: s.require_pin("heater_pin")?.clone(),
            sensor: SensorConfig::from_section(s)?,
            control,
            max_power: s.require_float("max_power")?,
            smooth_time: s.require_float("smooth_time")?,
            pwm_cycle_time: s.require_float("pwm_cycle_time")?,
        })
    }
}

/// Extruder: stepper, hotend heater and filament geometry
#[derive(Debug, Clone, PartialEq)]
pub struct ExtruderConfig {
    pub stepper: StepperConfig,
    pub heater: HeaterConfig,
    pub nozzle_diameter: f64,
    pub filament_diameter: f64,
    pub max_extrude_only_distance: f64,
    pub max_extrude_cross_section: f64,
    pub pressure_advance: f64,
    pub pressure_advance_smooth_time: f64,
    pub instantaneous_corner_velocity: f64,
    pub min_extrude_temp: f64,
}

impl ExtruderConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let nozzle_diameter = s.require_float("nozzle_diameter")?;
        Ok(Self {
            stepper: StepperConfig::from_section(s)?,
            heater: HeaterConfig::from_section(s)?,
            nozzle_diameter,
            filament_diameter: s.require_float("filament_diameter")?,
            max_extrude_only_distance: s.float("max_extrude_only_distance").unwrap_or(50.0),
            max_extrude_cross_section: s
                .float("max_extrude_cross_section")
                .unwrap_or(4.0 * nozzle_diameter * nozzle_diameter),
            pressure_advance: s.require_float("pressure_advance")?,
            pressure_advance_smooth_time: s.require_float("pressure_advance_smooth_time")?,
            instantaneous_corner_velocity: s.require_float("instantaneous_corner_velocity")?,
            min_extrude_temp: s.require_float("min_extrude_temp")?,
        })
    }
}

/// Thermal runaway checks for one heater
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyHeaterConfig {
    pub heater: String,
    pub max_error: f64,
    pub check_gain_time: f64,
    pub hysteresis: f64,
    pub heating_gain: f64,
}

impl VerifyHeaterConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let heater = s.name().unwrap_or_default();
        let default_gain_time = if heater == "heater_bed" { 60.0 } else { 20.0 };
        Ok(Self {
            heater: heater.to_string(),
            max_error: s.require_float("max_error")?,
            check_gain_time: s.float("check_gain_time").unwrap_or(default_gain_time),
            hysteresis: s.require_float("hysteresis")?,
            heating_gain: s.require_float("heating_gain")?,
        })
    }
}

/// Monitoring-only temperature sensor
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSensorConfig {
    pub name: String,
    pub sensor: SensorConfig,
}

impl TemperatureSensorConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        Ok(Self {
            name: s.name().unwrap_or_default().to_string(),
            sensor: SensorConfig::from_section(s)?,
        })
    }
}

/// What drives a fan
#[derive(Debug, Clone, PartialEq)]
pub enum FanKind {
    /// `[fan]`, driven by M106/M107
    PartCooling,
    /// Runs while any listed heater is above `heater_temp`
    Heater {
        heaters: Vec<String>,
        heater_temp: f64,
        fan_speed: f64,
    },
    /// Runs while steppers or heaters are active
    Controller {
        heaters: Vec<String>,
        steppers: Vec<String>,
        fan_speed: f64,
        idle_speed: f64,
        idle_timeout: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FanConfig {
    /// `None` for the part cooling fan
    pub name: Option<String>,
    pub pin: ResolvedPin,
    pub max_power: f64,
    pub shutdown_speed: f64,
    pub cycle_time: f64,
    pub hardware_pwm: bool,
    pub kick_start_time: f64,
    pub off_below: f64,
    pub enable_pin: Option<ResolvedPin>,
    pub tachometer_pin: Option<ResolvedPin>,
    pub tachometer_ppr: u32,
    pub kind: FanKind,
}

impl FanConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let names = |key: &str| s.list(key).map(<[String]>::to_vec).unwrap_or_default();
        let kind = match s.kind() {
            "heater_fan" => FanKind::Heater {
                heaters: names("heater"),
                heater_temp: s.require_float("heater_temp")?,
                fan_speed: s.require_float("fan_speed")?,
            },
            "controller_fan" => {
                let fan_speed = s.require_float("fan_speed")?;
                FanKind::Controller {
                    heaters: names("heater"),
                    steppers: names("stepper"),
                    fan_speed,
                    idle_speed: s.float("idle_speed").unwrap_or(fan_speed),
                    idle_timeout: u32::try_from(s.require_int("idle_timeout")?)
                        .map_err(|_| s.range("idle_timeout", "is too large".to_string()))?,
                }
            }
            _ => FanKind::PartCooling,
        };
        Ok(Self {
            name: s.name().map(ToString::to_string),
            pin: s.require_pin("pin")?.clone(),
            max_power: s.require_float("max_power")?,
            shutdown_speed: s.require_float("shutdown_speed")?,
            cycle_time: s.require_float("cycle_time")?,
            hardware_pwm: s.require_bool("hardware_pwm")?,
            kick_start_time: s.require_float("kick_start_time")?,
            off_below: s.require_float("off_below")?,
            enable_pin: s.pin("enable_pin").cloned(),
            tachometer_pin: s.pin("tachometer_pin").cloned(),
            tachometer_ppr: u32::try_from(s.require_int("tachometer_ppr")?)
                .map_err(|_| s.range("tachometer_ppr", "is too large".to_string()))?,
            kind,
        })
    }
}

/// Input shaper algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ShaperType {
    Zv,
    Mzv,
    Zvd,
    Ei,
    TwoHumpEi,
    ThreeHumpEi,
}

impl ShaperType {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "zv" => Some(ShaperType::Zv),
            "mzv" => Some(ShaperType::Mzv),
            "zvd" => Some(ShaperType::Zvd),
            "ei" => Some(ShaperType::Ei),
            "2hump_ei" => Some(ShaperType::TwoHumpEi),
            "3hump_ei" => Some(ShaperType::ThreeHumpEi),
            _ => None,
        }
    }
}

/// Shaper for one axis; a frequency of 0 disables shaping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisShaper {
    pub shaper: ShaperType,
    pub frequency: f64,
    pub damping_ratio: f64,
}

impl AxisShaper {
    pub fn is_enabled(&self) -> bool {
        self.frequency > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputShaperConfig {
    pub x: AxisShaper,
    pub y: AxisShaper,
}

impl InputShaperConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let shared = s.require_str("shaper_type")?;
        let axis = |axis: &str| -> Result<AxisShaper, ConfigError> {
            let type_key = alloc::format!("shaper_type_{}", axis);
            let word = s.str(&type_key).unwrap_or(shared);
            Ok(AxisShaper {
                shaper: ShaperType::parse(word)
                    .ok_or_else(|| s.invalid(&type_key, "unknown shaper".to_string()))?,
                frequency: s.require_float(&alloc::format!("shaper_freq_{}", axis))?,
                damping_ratio: s.require_float(&alloc::format!("damping_ratio_{}", axis))?,
            })
        };
        Ok(Self {
            x: axis("x")?,
            y: axis("y")?,
        })
    }
}

/// G10/G11 retraction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirmwareRetractionConfig {
    pub retract_length: f64,
    pub retract_speed: f64,
    pub unretract_extra_length: f64,
    pub unretract_speed: f64,
}

impl FirmwareRetractionConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        Ok(Self {
            retract_length: s.require_float("retract_length")?,
            retract_speed: s.require_float("retract_speed")?,
            unretract_extra_length: s.require_float("unretract_extra_length")?,
            unretract_speed: s.require_float("unretract_speed")?,
        })
    }
}
