//! Property tests over generated documents

use kestrel_core::config::{TouchAction, TouchBehavior, TouchButton};
use kestrel_core::glyph::Glyph;
use kestrel_core::value::Point;
use kestrel_core::{load, CalibrationOverlay, ConfigError};
use proptest::prelude::*;

fn alias_chain_doc(order: &[usize], physical: &str, last_target: Option<&str>, pin: &str) -> String {
    let n = order.len();
    let items: Vec<String> = order
        .iter()
        .map(|&i| {
            let target = if i + 1 < n {
                format!("ALIAS_{}", i + 1)
            } else {
                last_target.unwrap_or(physical).to_string()
            };
            format!("ALIAS_{}={}", i, target)
        })
        .collect();
    format!(
        "[board_pins]\naliases: {}\n\n[fan]\npin: {}\n",
        items.join(", "),
        pin
    )
}

fn heater_bed_doc(min_temp: i32, max_temp: i32) -> String {
    format!(
        "[heater_bed]\nheater_pin: PA2\nsensor_type: ATC Semitec 104GT-2\nsensor_pin: PC1\n\
         control: watermark\nmin_temp: {}\nmax_temp: {}\n",
        min_temp, max_temp
    )
}

fn chain_order() -> impl Strategy<Value = Vec<usize>> {
    (1usize..8).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #[test]
    fn alias_chains_resolve_to_physical_pin(
        order in chain_order(),
        physical in "P[A-D][0-9]{1,2}",
        inverted in any::<bool>(),
    ) {
        let pin = if inverted { "!ALIAS_0" } else { "ALIAS_0" };
        let text = alias_chain_doc(&order, &physical, None, pin);

        let first = load(&text).unwrap();
        let second = load(&text).unwrap();
        let fan = &first.fans()[0];
        prop_assert_eq!(fan.pin.pin.as_str(), physical.as_str());
        prop_assert_eq!(fan.pin.chip.as_str(), "mcu");
        prop_assert_eq!(fan.pin.inverted, inverted);
        prop_assert_eq!(&second.fans()[0].pin, &fan.pin);
    }

    #[test]
    fn alias_cycles_rejected(order in chain_order()) {
        let text = alias_chain_doc(&order, "PA1", Some("ALIAS_0"), "ALIAS_0");
        let err = load(&text).unwrap_err();
        prop_assert!(matches!(err, ConfigError::AliasCycle { .. }), "{:?}", err);
    }

    #[test]
    fn min_temp_never_exceeds_max_temp(min_temp in -50i32..400, max_temp in -50i32..400) {
        let result = load(&heater_bed_doc(min_temp, max_temp));
        if min_temp > max_temp {
            let err = result.unwrap_err();
            prop_assert!(
                matches!(err, ConfigError::RangeViolation { ref key, .. } if key == "min_temp"),
                "{:?}", err
            );
        } else {
            let config = result.unwrap();
            let bed = config.heater_bed().unwrap();
            prop_assert_eq!(bed.sensor.min_temp, f64::from(min_temp));
            prop_assert_eq!(bed.sensor.max_temp, f64::from(max_temp));
        }
    }

    #[test]
    fn endstop_within_travel(
        position_min in -50i32..=0,
        span in 10i32..500,
        position_endstop in -600i32..600,
    ) {
        let position_max = position_min + span;
        let text = format!(
            "[stepper_y]\nstep_pin: PC6\ndir_pin: PC7\nendstop_pin: ^PA1\nmicrosteps: 16\n\
             rotation_distance: 40\nposition_min: {}\nposition_endstop: {}\n\
             position_max: {}\nhoming_positive_dir: true\n",
            position_min, position_endstop, position_max
        );
        let result = load(&text);
        if position_endstop == position_min {
            let err = result.unwrap_err();
            prop_assert!(
                matches!(err, ConfigError::RangeViolation { ref key, .. } if key == "homing_positive_dir"),
                "{:?}", err
            );
        } else if (position_min..=position_max).contains(&position_endstop) {
            let config = result.unwrap();
            let rail = config.steppers()[0].rail.clone().unwrap();
            prop_assert_eq!(rail.position_endstop, Some(f64::from(position_endstop)));
            prop_assert!(rail.homing_positive_dir);
        } else {
            let err = result.unwrap_err();
            prop_assert!(
                matches!(err, ConfigError::RangeViolation { ref key, .. } if key == "position_endstop"),
                "{:?}", err
            );
        }
    }

    #[test]
    fn saved_calibration_reloads(
        whole in 1u32..200,
        frac in 0u32..100,
        damping in 1u32..99,
    ) {
        let base = "# resonance compensation\n[input_shaper]\nshaper_freq_x: 40\nshaper_freq_y: 40\n";
        let freq = format!("{}.{:02}", whole, frac);
        let ratio = format!("0.{:02}", damping);

        let config = load(base).unwrap();
        let mut overlay = CalibrationOverlay::new();
        overlay.set("input_shaper", "shaper_freq_x", &freq);
        overlay.set("input_shaper", "damping_ratio_y", &ratio);
        let (saved, _) = config.save(&overlay).unwrap();
        prop_assert!(saved.starts_with(base));

        let reloaded = load(&saved).unwrap();
        let shaper = reloaded.input_shaper().unwrap();
        prop_assert_eq!(shaper.x.frequency, freq.parse::<f64>().unwrap());
        prop_assert_eq!(shaper.y.damping_ratio, ratio.parse::<f64>().unwrap());
        prop_assert_eq!(shaper.y.frequency, 40.0);

        // Saving what was loaded changes nothing
        prop_assert_eq!(reloaded.save(reloaded.overlay()).unwrap().0, saved);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored(
        inserts in proptest::collection::vec((0usize..8, 0usize..3), 0..6),
    ) {
        let plain = heater_bed_doc(0, 120);
        let mut lines: Vec<String> = plain.lines().map(str::to_string).collect();
        for (at, kind) in inserts {
            let filler = match kind {
                0 => "",
                1 => "# comment",
                _ => "; comment",
            };
            // Keep the header first
            let at = 1 + at % lines.len();
            lines.insert(at, filler.to_string());
        }
        let noisy = lines.join("\n");

        let a = load(&plain).unwrap();
        let b = load(&noisy).unwrap();
        prop_assert_eq!(a.heater_bed(), b.heater_bed());
    }

    #[test]
    fn glyph_pixels_match_rows(rows in proptest::collection::vec("[.*]{1,20}", 1..12)) {
        let width = rows[0].len();
        let rows: Vec<String> = rows
            .iter()
            .map(|r| r.chars().cycle().take(width).collect())
            .collect();
        let glyph = Glyph::parse(&rows.join("\n")).unwrap();

        prop_assert_eq!(glyph.width(), width);
        prop_assert_eq!(glyph.height(), rows.len());
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                prop_assert_eq!(glyph.pixel(x, y), c == '*');
            }
        }
    }

    #[test]
    fn touch_rectangle_contains_interior(
        left in 0i32..400,
        top in 0i32..300,
        w in 2i32..200,
        h in 2i32..200,
        dx in 0.0f64..1.0,
        dy in 0.0f64..1.0,
    ) {
        let (right, bottom) = (left + w, top + h);
        let button = TouchButton {
            points: vec![
                Point { x: left, y: top },
                Point { x: right, y: top },
                Point { x: right, y: bottom },
                Point { x: left, y: bottom },
            ],
            action: Some(TouchAction::Menu("click".into())),
            behavior: TouchBehavior::OneShot,
        };
        let inside = Point {
            x: left + 1 + ((w - 2) as f64 * dx) as i32,
            y: top + 1 + ((h - 2) as f64 * dy) as i32,
        };
        prop_assert!(button.contains(inside));
        let right_of = Point { x: right + 1, y: inside.y };
        let above = Point { x: inside.x, y: top - 1 };
        prop_assert!(!button.contains(right_of));
        prop_assert!(!button.contains(above));
    }
}
