//! Validated printer configuration
//!
//! [`PrinterConfig`] is produced by [`crate::load`] and never mutated; a
//! reload builds a new one. It keeps the source document so that saving
//! calibration values can preserve the user-authored text exactly.

pub mod hardware;
pub mod section;
pub mod types;

pub use hardware::*;
pub use section::*;
pub use types::*;

use alloc::string::String;
use alloc::vec::Vec;

use crate::document::Document;
use crate::error::ConfigError;
use crate::overlay::CalibrationOverlay;
use crate::schema;

/// Complete, validated configuration
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    document: Document,
    sections: Vec<Section>,
    printer: Option<PrinterSection>,
    mcus: Vec<McuConfig>,
    steppers: Vec<StepperConfig>,
    extruders: Vec<ExtruderConfig>,
    heater_bed: Option<HeaterConfig>,
    heaters: Vec<HeaterConfig>,
    verify_heaters: Vec<VerifyHeaterConfig>,
    temperature_sensors: Vec<TemperatureSensorConfig>,
    fans: Vec<FanConfig>,
    input_shaper: Option<InputShaperConfig>,
    firmware_retraction: Option<FirmwareRetractionConfig>,
    probe: Option<ProbeConfig>,
    safe_z_home: Option<SafeZHomeConfig>,
    display: Option<DisplayConfig>,
    touch: Option<TouchConfig>,
}

impl PrinterConfig {
    /// Build typed views over validated sections
    pub(crate) fn build(document: Document, sections: Vec<Section>) -> Result<Self, ConfigError> {
        let mut config = Self {
            document,
            sections: Vec::new(),
            printer: None,
            mcus: Vec::new(),
            steppers: Vec::new(),
            extruders: Vec::new(),
            heater_bed: None,
            heaters: Vec::new(),
            verify_heaters: Vec::new(),
            temperature_sensors: Vec::new(),
            fans: Vec::new(),
            input_shaper: None,
            firmware_retraction: None,
            probe: None,
            safe_z_home: None,
            display: None,
            touch: None,
        };

        for s in &sections {
            match schema::base_kind(s.kind()) {
                "mcu" => config.mcus.push(McuConfig::from_section(s)?),
                "printer" => config.printer = Some(PrinterSection::from_section(s)?),
                "stepper_x" | "stepper_y" | "stepper_z" => {
                    config.steppers.push(StepperConfig::from_section(s)?)
                }
                "extruder" => config.extruders.push(ExtruderConfig::from_section(s)?),
                "heater_bed" => config.heater_bed = Some(HeaterConfig::from_section(s)?),
                "heater_generic" => config.heaters.push(HeaterConfig::from_section(s)?),
                "verify_heater" => config.verify_heaters.push(VerifyHeaterConfig::from_section(s)?),
                "temperature_sensor" => config
                    .temperature_sensors
                    .push(TemperatureSensorConfig::from_section(s)?),
                "fan" | "heater_fan" | "controller_fan" => {
                    config.fans.push(FanConfig::from_section(s)?)
                }
                "input_shaper" => config.input_shaper = Some(InputShaperConfig::from_section(s)?),
                "firmware_retraction" => {
                    config.firmware_retraction = Some(FirmwareRetractionConfig::from_section(s)?)
                }
                "probe" | "bltouch" => config.probe = Some(ProbeConfig::from_section(s)?),
                "safe_z_home" => config.safe_z_home = Some(SafeZHomeConfig::from_section(s)?),
                "display" => config.display = Some(DisplayConfig::from_section(s)?),
                "xpt2046" => config.touch = Some(TouchConfig::from_section(s)?),
                _ => {}
            }
        }

        config.sections = sections;
        Ok(config)
    }

    /// Generic view of any section
    ///
    /// `kind` is the section type, `name` the instance name if any.
    pub fn section(&self, kind: &str, name: Option<&str>) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.kind() == kind && s.name() == name)
    }

    /// All sections in document order
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn printer(&self) -> Option<&PrinterSection> {
        self.printer.as_ref()
    }

    pub fn mcus(&self) -> &[McuConfig] {
        &self.mcus
    }

    /// Axis steppers, including numbered extras like `stepper_z1`
    pub fn steppers(&self) -> &[StepperConfig] {
        &self.steppers
    }

    /// Look up a stepper by section name
    pub fn stepper(&self, name: &str) -> Option<&StepperConfig> {
        self.steppers.iter().find(|s| s.name == name)
    }

    pub fn extruders(&self) -> &[ExtruderConfig] {
        &self.extruders
    }

    pub fn heater_bed(&self) -> Option<&HeaterConfig> {
        self.heater_bed.as_ref()
    }

    /// `[heater_generic]` heaters
    pub fn heaters(&self) -> &[HeaterConfig] {
        &self.heaters
    }

    /// Find any heater by the name other sections use for it
    pub fn heater(&self, name: &str) -> Option<&HeaterConfig> {
        self.extruders
            .iter()
            .map(|e| &e.heater)
            .chain(self.heater_bed.iter())
            .chain(self.heaters.iter())
            .find(|h| h.name == name)
    }

    pub fn verify_heaters(&self) -> &[VerifyHeaterConfig] {
        &self.verify_heaters
    }

    pub fn temperature_sensors(&self) -> &[TemperatureSensorConfig] {
        &self.temperature_sensors
    }

    /// Part cooling, heater and controller fans
    pub fn fans(&self) -> &[FanConfig] {
        &self.fans
    }

    pub fn heater_fans(&self) -> impl Iterator<Item = &FanConfig> {
        self.fans
            .iter()
            .filter(|f| matches!(f.kind, FanKind::Heater { .. }))
    }

    pub fn input_shaper(&self) -> Option<&InputShaperConfig> {
        self.input_shaper.as_ref()
    }

    pub fn firmware_retraction(&self) -> Option<&FirmwareRetractionConfig> {
        self.firmware_retraction.as_ref()
    }

    pub fn probe(&self) -> Option<&ProbeConfig> {
        self.probe.as_ref()
    }

    pub fn safe_z_home(&self) -> Option<&SafeZHomeConfig> {
        self.safe_z_home.as_ref()
    }

    pub fn display(&self) -> Option<&DisplayConfig> {
        self.display.as_ref()
    }

    pub fn touch(&self) -> Option<&TouchConfig> {
        self.touch.as_ref()
    }

    /// Source text this configuration was loaded from
    pub fn source(&self) -> &str {
        self.document.text()
    }

    /// Calibration values currently saved in the document
    ///
    /// Clone, edit and pass to [`save`](Self::save).
    pub fn overlay(&self) -> &CalibrationOverlay {
        self.document.overlay()
    }

    /// Produce the document text carrying `overlay` as its calibration block
    ///
    /// Returns the new text together with the configuration loaded from it,
    /// so an overlay that would not validate is rejected here rather than at
    /// the next boot. Saving the overlay the document was loaded with returns
    /// the original text unchanged.
    ///
    /// The user-authored part is kept as written, except that a base not
    /// ending in a newline gets one so the calibration block starts on its
    /// own line.
    pub fn save(&self, overlay: &CalibrationOverlay) -> Result<(String, PrinterConfig), ConfigError> {
        if overlay.same_values(self.document.overlay()) {
            return Ok((String::from(self.document.text()), self.clone()));
        }

        let mut text = String::from(self.document.base());
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        if !overlay.is_empty() {
            text.push_str(&overlay.render());
        }

        let config = crate::loader::load(&text)?;
        Ok((text, config))
    }
}
