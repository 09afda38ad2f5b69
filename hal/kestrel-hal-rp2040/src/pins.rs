//! RP2040 pin names
//!
//! Configuration documents name RP2040 pins `gpio0` to `gpio29`. The loader
//! only checks that a name looks like a pin; this module checks that pins
//! on the local chip actually exist.

use kestrel_core::config::Section;
use kestrel_core::pins::DEFAULT_CHIP;
use kestrel_core::value::Value;
use kestrel_core::{PrinterConfig, ResolvedPin};

/// Number of user GPIOs on the RP2040
pub const GPIO_COUNT: u8 = 30;

/// A configured pin the RP2040 does not have
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownPin<'a> {
    pub section: &'a Section,
    pub key: &'a str,
    pub pin: &'a ResolvedPin,
}

/// GPIO number of a pin name, e.g. `gpio23` -> 23
pub fn gpio_number(name: &str) -> Option<u8> {
    let digits = name.strip_prefix("gpio")?;
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    let n: u8 = digits.parse().ok()?;
    (n < GPIO_COUNT).then_some(n)
}

/// First pin on the local mcu that is not an RP2040 GPIO
///
/// Pins on other chips belong to secondary mcus and are not checked.
pub fn find_unknown_pin(config: &PrinterConfig) -> Option<UnknownPin<'_>> {
    config.sections().iter().find_map(|section| {
        section.entries().iter().find_map(|entry| {
            let pins = match &entry.value {
                Value::Pin(pin) => core::slice::from_ref(pin),
                Value::Pins(pins) => pins.as_slice(),
                _ => return None,
            };
            pins.iter()
                .find(|p| p.chip == DEFAULT_CHIP && gpio_number(&p.pin).is_none())
                .map(|pin| UnknownPin {
                    section,
                    key: &entry.key,
                    pin,
                })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpio_number() {
        assert_eq!(gpio_number("gpio0"), Some(0));
        assert_eq!(gpio_number("gpio29"), Some(29));
        assert_eq!(gpio_number("gpio30"), None);
        assert_eq!(gpio_number("gpio07"), None);
        assert_eq!(gpio_number("PA1"), None);
        assert_eq!(gpio_number("gpio"), None);
    }

    #[test]
    fn test_find_unknown_pin() {
        let config = kestrel_core::load("[fan]\npin: gpio17\n").unwrap();
        assert_eq!(find_unknown_pin(&config), None);

        // Pins on a secondary mcu are not RP2040 pins
        let config =
            kestrel_core::load("[mcu ender]\nserial: /dev/ttyUSB0\n\n[fan]\npin: ender:PA1\n").unwrap();
        assert_eq!(find_unknown_pin(&config), None);

        let config = kestrel_core::load("[fan]\npin: HE0\n").unwrap();
        let unknown = find_unknown_pin(&config).unwrap();
        assert_eq!(unknown.key, "pin");
        assert_eq!(unknown.pin.pin.as_str(), "HE0");
    }
}
