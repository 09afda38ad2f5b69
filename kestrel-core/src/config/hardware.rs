//! Probe, display and touch panel configuration types

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use super::Section;
use crate::error::ConfigError;
use crate::glyph::Glyph;
use crate::pins::ResolvedPin;
use crate::schema::ST7796S_BUS_PINS;
use crate::value::{Color, Point, Rect};

/// Probe hardware
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeKind {
    /// `[probe]`: a plain switch
    Switch { pin: ResolvedPin },
    /// `[bltouch]`: servo deployed pin
    BlTouch {
        sensor_pin: ResolvedPin,
        control_pin: ResolvedPin,
        pin_move_time: f64,
        stow_on_each_sample: bool,
        probe_with_touch_mode: bool,
        pin_up_reports_not_triggered: bool,
        pin_up_touch_mode_reports_triggered: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SamplesResult {
    Median,
    Average,
}

/// Z probe with its offsets and sampling
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    pub kind: ProbeKind,
    pub x_offset: f64,
    pub y_offset: f64,
    pub z_offset: f64,
    pub speed: f64,
    /// Defaults to `speed`
    pub lift_speed: f64,
    pub samples: u32,
    pub sample_retract_dist: f64,
    pub samples_result: SamplesResult,
    pub samples_tolerance: f64,
    pub samples_tolerance_retries: u32,
}

impl ProbeConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let kind = if s.kind() == "bltouch" {
            ProbeKind::BlTouch {
                sensor_pin: s.require_pin("sensor_pin")?.clone(),
                control_pin: s.require_pin("control_pin")?.clone(),
                pin_move_time: s.require_float("pin_move_time")?,
                stow_on_each_sample: s.require_bool("stow_on_each_sample")?,
                probe_with_touch_mode: s.require_bool("probe_with_touch_mode")?,
                pin_up_reports_not_triggered: s.require_bool("pin_up_reports_not_triggered")?,
                pin_up_touch_mode_reports_triggered: s
                    .require_bool("pin_up_touch_mode_reports_triggered")?,
            }
        } else {
            ProbeKind::Switch {
                pin: s.require_pin("pin")?.clone(),
            }
        };
        let speed = s.require_float("speed")?;
        let unsigned = |key: &str| -> Result<u32, ConfigError> {
            u32::try_from(s.require_int(key)?).map_err(|_| s.range(key, "is too large".to_string()))
        };
        Ok(Self {
            kind,
            x_offset: s.require_float("x_offset")?,
            y_offset: s.require_float("y_offset")?,
            z_offset: s.require_float("z_offset")?,
            speed,
            lift_speed: s.float("lift_speed").unwrap_or(speed),
            samples: unsigned("samples")?,
            sample_retract_dist: s.require_float("sample_retract_dist")?,
            samples_result: match s.require_str("samples_result")? {
                "median" => SamplesResult::Median,
                _ => SamplesResult::Average,
            },
            samples_tolerance: s.require_float("samples_tolerance")?,
            samples_tolerance_retries: unsigned("samples_tolerance_retries")?,
        })
    }
}

/// Home Z at a fixed XY position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeZHomeConfig {
    pub home_x: f64,
    pub home_y: f64,
    pub speed: f64,
    pub z_hop: Option<f64>,
    pub z_hop_speed: f64,
    pub move_to_previous: bool,
}

impl SafeZHomeConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let &[home_x, home_y] = s.require_floats("home_xy_position")? else {
            return Err(s.invalid("home_xy_position", "expected X, Y".to_string()));
        };
        Ok(Self {
            home_x,
            home_y,
            speed: s.require_float("speed")?,
            z_hop: s.float("z_hop"),
            z_hop_speed: s.require_float("z_hop_speed")?,
            move_to_previous: s.require_bool("move_to_previous")?,
        })
    }
}

/// Display controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LcdType {
    St7796s,
    St7920,
    Uc1701,
    Ssd1306,
    Sh1106,
    Hd44780,
}

impl LcdType {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "st7796s" => Some(LcdType::St7796s),
            "st7920" => Some(LcdType::St7920),
            "uc1701" => Some(LcdType::Uc1701),
            "ssd1306" => Some(LcdType::Ssd1306),
            "sh1106" => Some(LcdType::Sh1106),
            "hd44780" => Some(LcdType::Hd44780),
            _ => None,
        }
    }
}

/// On-screen button of the st7796s
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayButton {
    pub rect: Rect,
    pub fgcolor: Color,
    pub bgcolor: Color,
    pub glyph: Glyph,
}

impl DisplayButton {
    /// Top-left corner of the glyph, centred in the button
    pub fn glyph_origin(&self) -> Point {
        let w = i32::try_from(self.glyph.width()).unwrap_or(i32::MAX);
        let h = i32::try_from(self.glyph.height()).unwrap_or(i32::MAX);
        Point {
            x: self.rect.left + (self.rect.width() - w) / 2,
            y: self.rect.top + (self.rect.height() - h) / 2,
        }
    }
}

/// 16-bit parallel TFT panel
#[derive(Debug, Clone, PartialEq)]
pub struct St7796sConfig {
    /// dcx, wrx, d8..d15 in bus order, all on one chip
    pub bus_pins: Vec<ResolvedPin>,
    pub resx_pin: ResolvedPin,
    pub csx_pin: Option<ResolvedPin>,
    pub rdx_pin: Option<ResolvedPin>,
    pub screen_width: u32,
    pub screen_height: u32,
    pub fgcolor: Color,
    pub bgcolor: Color,
    /// Menu area
    pub rect: Rect,
    pub buttons: Vec<DisplayButton>,
}

impl St7796sConfig {
    fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let bus_pins = ST7796S_BUS_PINS
            .iter()
            .map(|key| s.require_pin(key).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let dimension = |key: &str| -> Result<u32, ConfigError> {
            u32::try_from(s.require_int(key)?).map_err(|_| s.range(key, "is too large".to_string()))
        };

        let mut buttons = Vec::new();
        for index in s.family_indices("button", crate::schema::DISPLAY_BUTTON_PARTS) {
            let key = |part: &str| format!("button{}_{}", index, part);
            buttons.push(DisplayButton {
                rect: s.require_rect(&key("rect"))?,
                fgcolor: s.require_color(&key("fgcolor"))?,
                bgcolor: s.require_color(&key("bgcolor"))?,
                glyph: s.require_glyph(&key("glyph"))?.clone(),
            });
        }

        Ok(Self {
            bus_pins,
            resx_pin: s.require_pin("resx_pin")?.clone(),
            csx_pin: s.pin("csx_pin").cloned(),
            rdx_pin: s.pin("rdx_pin").cloned(),
            screen_width: dimension("screen_width")?,
            screen_height: dimension("screen_height")?,
            fgcolor: s.color("fgcolor").unwrap_or(Color::WHITE),
            bgcolor: s.color("bgcolor").unwrap_or(Color::BLACK),
            rect: s.require_rect("rect")?,
            buttons,
        })
    }
}

/// `[display]`: panel and front-panel inputs
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub lcd_type: LcdType,
    pub encoder_pins: Option<(ResolvedPin, ResolvedPin)>,
    pub click_pin: Option<ResolvedPin>,
    pub kill_pin: Option<ResolvedPin>,
    pub back_pin: Option<ResolvedPin>,
    /// Seconds, 0 disables the timeout
    pub menu_timeout: u32,
    pub menu_reverse_navigation: bool,
    /// Present when `lcd_type` is st7796s
    pub st7796s: Option<St7796sConfig>,
}

impl DisplayConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let lcd_type = LcdType::parse(s.require_str("lcd_type")?)
            .ok_or_else(|| s.invalid("lcd_type", "unknown display".to_string()))?;
        let encoder_pins = match s.pins("encoder_pins") {
            Some([a, b]) => Some((a.clone(), b.clone())),
            Some(_) => return Err(s.invalid("encoder_pins", "expected two pins".to_string())),
            None => None,
        };
        Ok(Self {
            lcd_type,
            encoder_pins,
            click_pin: s.pin("click_pin").cloned(),
            kill_pin: s.pin("kill_pin").cloned(),
            back_pin: s.pin("back_pin").cloned(),
            menu_timeout: u32::try_from(s.require_int("menu_timeout")?)
                .map_err(|_| s.range("menu_timeout", "is too large".to_string()))?,
            menu_reverse_navigation: s.require_bool("menu_reverse_navigation")?,
            st7796s: match lcd_type {
                LcdType::St7796s => Some(St7796sConfig::from_section(s)?),
                _ => None,
            },
        })
    }
}

/// What a touch button does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TouchAction {
    /// Menu key event, e.g. "up", "click"
    Menu(String),
    /// Gcode template
    Gcode(String),
}

/// How a touch button reacts to being held
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TouchBehavior {
    OneShot,
    /// Fires the action again while held
    Repeat(TouchAction),
    /// Fires the action once held long enough
    LongPress(TouchAction),
}

/// Polygonal touch button
#[derive(Debug, Clone, PartialEq)]
pub struct TouchButton {
    /// Polygon vertices, at least 3
    pub points: Vec<Point>,
    /// Action on press; a held-only button has none
    pub action: Option<TouchAction>,
    pub behavior: TouchBehavior,
}

impl TouchButton {
    /// Even-odd test of a touch location against the polygon
    pub fn contains(&self, at: Point) -> bool {
        let mut inside = false;
        let n = self.points.len();
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + n - 1) % n];
            if (a.y > at.y) != (b.y > at.y) {
                let (dx, dy) = (i64::from(b.x - a.x), i64::from(b.y - a.y));
                let lhs = i64::from(at.x - a.x) * dy;
                let rhs = dx * i64::from(at.y - a.y);
                if (dy > 0 && lhs < rhs) || (dy < 0 && lhs > rhs) {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

/// SPI pins when the panel is bit-banged
#[derive(Debug, Clone, PartialEq)]
pub struct SoftwareSpi {
    pub sclk: ResolvedPin,
    pub mosi: ResolvedPin,
    pub miso: ResolvedPin,
}

/// `[xpt2046]` resistive touch panel
#[derive(Debug, Clone, PartialEq)]
pub struct TouchConfig {
    pub cs_pin: Option<ResolvedPin>,
    pub penirq_pin: ResolvedPin,
    pub spi_bus: Option<String>,
    pub spi_speed: u32,
    pub software_spi: Option<SoftwareSpi>,
    pub buttons: Vec<TouchButton>,
}

impl TouchConfig {
    pub fn from_section(s: &Section) -> Result<Self, ConfigError> {
        let action = |prefix: &str| -> Option<TouchAction> {
            if let Some(f) = s.str(&format!("{}_function", prefix)) {
                return Some(TouchAction::Menu(f.to_string()));
            }
            s.str(&format!("{}_gcode", prefix))
                .map(|g| TouchAction::Gcode(g.to_string()))
        };

        let mut buttons = Vec::new();
        for index in s.family_indices("button", crate::validate::TOUCH_BUTTON_PARTS) {
            let prefix = format!("button{}", index);
            let behavior = match (
                action(&format!("{}_repeat", prefix)),
                action(&format!("{}_longpress", prefix)),
            ) {
                (Some(repeat), _) => TouchBehavior::Repeat(repeat),
                (None, Some(long)) => TouchBehavior::LongPress(long),
                (None, None) => TouchBehavior::OneShot,
            };
            buttons.push(TouchButton {
                points: s.require_points(&format!("{}_points", prefix))?.to_vec(),
                action: action(&prefix),
                behavior,
            });
        }

        let software_spi = match (
            s.pin("spi_software_sclk_pin"),
            s.pin("spi_software_mosi_pin"),
            s.pin("spi_software_miso_pin"),
        ) {
            (Some(sclk), Some(mosi), Some(miso)) => Some(SoftwareSpi {
                sclk: sclk.clone(),
                mosi: mosi.clone(),
                miso: miso.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            cs_pin: s.pin("cs_pin").cloned(),
            penirq_pin: s.require_pin("penirq_pin")?.clone(),
            spi_bus: s.str("spi_bus").map(ToString::to_string),
            spi_speed: u32::try_from(s.require_int("spi_speed")?)
                .map_err(|_| s.range("spi_speed", "is too large".to_string()))?,
            software_spi,
            buttons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_touch_polygon_contains() {
        let button = TouchButton {
            points: vec![
                Point { x: 0, y: 0 },
                Point { x: 100, y: 0 },
                Point { x: 100, y: 50 },
                Point { x: 0, y: 50 },
            ],
            action: Some(TouchAction::Menu("up".into())),
            behavior: TouchBehavior::OneShot,
        };
        assert!(button.contains(Point { x: 10, y: 10 }));
        assert!(button.contains(Point { x: 99, y: 49 }));
        assert!(!button.contains(Point { x: 150, y: 10 }));
        assert!(!button.contains(Point { x: 10, y: 60 }));
    }

    #[test]
    fn test_glyph_centred_in_button() {
        let button = DisplayButton {
            rect: Rect {
                left: 10,
                top: 20,
                right: 50,
                bottom: 40,
            },
            fgcolor: Color::WHITE,
            bgcolor: Color::BLACK,
            glyph: Glyph::parse("****\n****").unwrap(),
        };
        assert_eq!(button.glyph_origin(), Point { x: 28, y: 29 });
    }
}
