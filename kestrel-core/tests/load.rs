//! End-to-end loading of complete documents

use kestrel_core::config::{
    FanKind, HeaterControl, LcdType, ProbeKind, ShaperType, TouchAction, TouchBehavior,
};
use kestrel_core::value::Color;
use kestrel_core::{load, CalibrationOverlay, ConfigError};

const FIXTURE: &str = include_str!("data/printer.cfg");

const EXTRUDER_WITHOUT_CONTROL: &str = "\
[extruder]
step_pin: PD2
dir_pin: PD3
microsteps: 16
rotation_distance: 7.5
nozzle_diameter: 0.4
filament_diameter: 1.75
heater_pin: PC8
sensor_type: EPCOS 100K B57560G104F
sensor_pin: PC5
pid_kp: 22.2
pid_ki: 1.08
pid_kd: 114
min_temp: 0
max_temp: 260
";

fn stepper_x(position_min: &str, position_endstop: &str, position_max: &str) -> String {
    format!(
        "[stepper_x]\nstep_pin: PC2\ndir_pin: PC4\nendstop_pin: ^PA0\nmicrosteps: 16\n\
         rotation_distance: 40\nposition_min: {}\nposition_endstop: {}\nposition_max: {}\n",
        position_min, position_endstop, position_max
    )
}

fn with_overlay(base: &str, overlay: &CalibrationOverlay) -> String {
    format!("{}\n{}", base, overlay.render())
}

#[test]
fn test_fixture_loads() {
    let config = load(FIXTURE).unwrap();

    assert_eq!(config.steppers().len(), 4);
    let z1 = config.stepper("stepper_z1").unwrap();
    assert!(z1.rail.is_none());
    let x = config.stepper("stepper_x").unwrap();
    let rail = x.rail.as_ref().unwrap();
    assert_eq!(rail.position_max, 235.0);
    assert_eq!(rail.second_homing_speed, 25.0);
    assert!(!rail.homing_positive_dir);
    assert!(x.enable_pin.as_ref().unwrap().inverted);

    let z = config.stepper("stepper_z").unwrap();
    assert!(z.endstop_pin.as_ref().unwrap().is_virtual());
    assert_eq!(z.rail.as_ref().unwrap().position_endstop, None);

    let extruder = &config.extruders()[0];
    assert!((extruder.stepper.gear_ratio - 50.0 / 17.0).abs() < 1e-12);
    assert_eq!(
        extruder.heater.control,
        HeaterControl::Pid {
            kp: 22.2,
            ki: 1.08,
            kd: 114.0
        }
    );
    assert_eq!(extruder.min_extrude_temp, 170.0);
    assert!(config.heater("chamber").is_some());
    assert_eq!(config.verify_heaters()[0].check_gain_time, 20.0);
}

#[test]
fn test_fixture_fans_and_shaper() {
    let config = load(FIXTURE).unwrap();

    assert_eq!(config.fans().len(), 3);
    let hotend = config.heater_fans().next().unwrap();
    assert_eq!(hotend.name.as_deref(), Some("hotend_fan"));
    match &hotend.kind {
        FanKind::Heater { heaters, .. } => assert_eq!(heaters, &["extruder"]),
        other => panic!("unexpected fan kind {:?}", other),
    }
    let board = config
        .fans()
        .iter()
        .find(|f| f.name.as_deref() == Some("board_fan"))
        .unwrap();
    match &board.kind {
        FanKind::Controller {
            steppers,
            idle_speed,
            idle_timeout,
            ..
        } => {
            assert_eq!(steppers.len(), 4);
            assert_eq!(*idle_speed, 1.0);
            assert_eq!(*idle_timeout, 60);
        }
        other => panic!("unexpected fan kind {:?}", other),
    }

    let shaper = config.input_shaper().unwrap();
    assert_eq!(shaper.x.shaper, ShaperType::Mzv);
    assert_eq!(shaper.y.shaper, ShaperType::Ei);
    assert_eq!(shaper.x.frequency, 48.6);

    let retraction = config.firmware_retraction().unwrap();
    assert_eq!(retraction.retract_length, 0.8);
    assert_eq!(retraction.unretract_speed, 10.0);
}

#[test]
fn test_fixture_display_and_touch() {
    let config = load(FIXTURE).unwrap();

    let display = config.display().unwrap();
    assert_eq!(display.lcd_type, LcdType::St7796s);
    let click = display.click_pin.as_ref().unwrap();
    assert_eq!(click.pin.as_str(), "PB0");
    assert!(click.inverted && click.pull_up);

    let panel = display.st7796s.as_ref().unwrap();
    assert_eq!(panel.bus_pins[0].pin.as_str(), "PB5");
    assert_eq!(panel.bus_pins.len(), 10);
    assert_eq!(panel.fgcolor, Color::WHITE);
    assert_eq!(panel.bgcolor, Color { r: 0, g: 0, b: 40 });
    assert_eq!(panel.buttons.len(), 2);
    assert_eq!(panel.buttons[0].glyph.width(), 8);
    assert_eq!(panel.buttons[0].glyph.row(0), Some(&[0b0001_1000][..]));

    let touch = config.touch().unwrap();
    assert_eq!(touch.spi_speed, 25000);
    assert!(touch.software_spi.is_some());
    assert_eq!(touch.buttons.len(), 2);
    assert_eq!(
        touch.buttons[0].behavior,
        TouchBehavior::Repeat(TouchAction::Menu("up".into()))
    );
    assert_eq!(
        touch.buttons[1].action,
        Some(TouchAction::Gcode("G28\nM117 Homed".into()))
    );
}

#[test]
fn test_fixture_overlay_applied() {
    let config = load(FIXTURE).unwrap();
    let probe = config.probe().unwrap();
    assert_eq!(probe.z_offset, 2.125);
    assert_eq!(probe.samples, 2);
    assert!(matches!(probe.kind, ProbeKind::BlTouch { .. }));
    assert_eq!(config.overlay().get("bltouch", "z_offset"), Some("2.125"));
}

#[test]
fn test_save_unchanged_is_identical() {
    let config = load(FIXTURE).unwrap();
    let (text, saved) = config.save(config.overlay()).unwrap();
    assert_eq!(text, FIXTURE);
    assert_eq!(saved.source(), FIXTURE);
}

#[test]
fn test_save_preserves_base_text() {
    let config = load(FIXTURE).unwrap();
    let base_end = FIXTURE.find("#*# <----").unwrap();

    let mut overlay = config.overlay().clone();
    overlay.set("bltouch", "z_offset", "2.200");
    overlay.set("extruder", "pid_kp", "24.5");
    let (saved, updated) = config.save(&overlay).unwrap();

    assert!(saved.starts_with(&FIXTURE[..base_end]));
    assert_eq!(updated.source(), saved);
    assert_eq!(updated.probe().unwrap().z_offset, 2.2);
    assert!(matches!(
        updated.extruders()[0].heater.control,
        HeaterControl::Pid { kp, .. } if kp == 24.5
    ));
    assert_eq!(load(&saved).unwrap().probe().unwrap().z_offset, 2.2);
}

#[test]
fn test_save_terminates_unterminated_base() {
    let base = "[input_shaper]\nshaper_freq_x: 40\nshaper_freq_y: 40";
    let config = load(base).unwrap();
    let mut overlay = CalibrationOverlay::new();
    overlay.set("input_shaper", "shaper_freq_x", "52.4");

    let (saved, updated) = config.save(&overlay).unwrap();
    assert!(saved.starts_with(&format!("{}\n#*# <----", base)));
    assert_eq!(updated.input_shaper().unwrap().x.frequency, 52.4);
}

#[test]
fn test_save_empty_overlay_drops_block() {
    let config = load(FIXTURE).unwrap();
    let (saved, updated) = config.save(&CalibrationOverlay::new()).unwrap();
    assert!(!saved.contains("SAVE_CONFIG"));
    assert_eq!(updated.probe().unwrap().z_offset, 2.0);
}

#[test]
fn test_save_rejects_invalid_overlay() {
    let config = load(FIXTURE).unwrap();
    let mut overlay = config.overlay().clone();
    overlay.set("bltouch", "samples", "0");
    let err = config.save(&overlay).unwrap_err();
    assert!(matches!(err, ConfigError::RangeViolation { ref key, .. } if key == "samples"));
}

#[test]
fn test_overlay_adds_control_to_extruder() {
    let mut overlay = CalibrationOverlay::new();
    overlay.set("extruder", "control", "pid");
    let text = with_overlay(EXTRUDER_WITHOUT_CONTROL, &overlay);

    let config = load(&text).unwrap();
    let extruder = config.section("extruder", None).unwrap();
    assert_eq!(extruder.str("control"), Some("pid"));
    assert_eq!(extruder.float("pid_kp"), Some(22.2));
    assert_eq!(extruder.float("max_temp"), Some(260.0));
}

#[test]
fn test_overlay_for_missing_section() {
    let mut overlay = CalibrationOverlay::new();
    overlay.set("heater_bed", "pid_kp", "60");
    let text = with_overlay(EXTRUDER_WITHOUT_CONTROL, &overlay);
    let err = load(&text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::OverlayTargetMissing { ref section, .. } if section == "heater_bed"
    ));
}

#[test]
fn test_overlay_hand_edit_rejected() {
    let text = FIXTURE.replace("z_offset = 2.125", "z_offset = 1.500");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::OverlayCorrupted { .. }));
}

#[test]
fn test_missing_control_without_overlay() {
    let err = load(EXTRUDER_WITHOUT_CONTROL).unwrap_err();
    assert_eq!(
        err,
        ConfigError::MissingRequiredKey {
            section: "extruder".into(),
            key: "control".into(),
            line: 1,
        }
    );
}

#[test]
fn test_duplicate_stepper_section() {
    let text = format!("{}\n{}", stepper_x("0", "0", "200"), stepper_x("0", "0", "200"));
    let err = load(&text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::DuplicateSection { ref section, first_line: 1, .. } if section == "stepper_x"
    ));
}

#[test]
fn test_unknown_key_in_heater_bed() {
    let text = FIXTURE.replace("[heater_bed]\n", "[heater_bed]\nbogus_key: 1\n");
    let err = load(&text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::UnknownKey { ref section, ref key, .. }
            if section == "heater_bed" && key == "bogus_key"
    ));
}

#[test]
fn test_unknown_section() {
    let text = format!("{}\n[frobnicator]\nspeed: 3\n", stepper_x("0", "0", "200"));
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownSection { line: 11, .. }));
}

#[test]
fn test_endstop_at_negative_minimum() {
    let config = load(&stepper_x("-3", "-3", "300")).unwrap();
    let rail = config.steppers()[0].rail.as_ref().unwrap();
    assert_eq!(rail.position_endstop, Some(-3.0));
    assert_eq!(rail.position_min, -3.0);
}

#[test]
fn test_endstop_beyond_maximum() {
    let err = load(&stepper_x("-3", "400", "300")).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::RangeViolation { ref key, line: 8, .. } if key == "position_endstop"
    ));
}

#[test]
fn test_min_temp_above_max_temp() {
    let text = FIXTURE.replace("max_temp: 130", "max_temp: -10");
    let err = load(&text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::RangeViolation { ref section, .. } if section == "heater_bed"
    ));
}

#[test]
fn test_min_extrude_temp_outside_heater_range() {
    let extruder = format!("{}control: pid\n", EXTRUDER_WITHOUT_CONTROL);

    // The default threshold of 170 is out of reach of a 150 degree heater
    let err = load(&extruder.replace("max_temp: 260", "max_temp: 150")).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::RangeViolation { ref key, .. } if key == "min_extrude_temp"
    ));

    let err = load(&format!("{}min_extrude_temp: 300\n", extruder)).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::RangeViolation { ref key, line: 17, .. } if key == "min_extrude_temp"
    ));

    let config = load(&format!(
        "{}min_extrude_temp: 120\n",
        extruder.replace("max_temp: 260", "max_temp: 150")
    ))
    .unwrap();
    assert_eq!(config.extruders()[0].min_extrude_temp, 120.0);
}

#[test]
fn test_board_names_accepted_by_shape() {
    let text = "[heater_generic chamber]\nheater_pin: HE0\nsensor_type: EPCOS 100K B57560G104F\n\
                sensor_pin: TB1\ncontrol: watermark\nmin_temp: 0\nmax_temp: 70\n";
    let config = load(text).unwrap();
    let chamber = config.heater("chamber").unwrap();
    assert_eq!(chamber.heater_pin.pin.as_str(), "HE0");

    let err = load(&text.replace("HE0", "HEATER_0")).unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvedAlias { ref key, .. } if key == "heater_pin"));
}

#[test]
fn test_homing_away_from_endstop() {
    let err = load(&format!("{}homing_positive_dir: true\n", stepper_x("0", "0", "200"))).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::RangeViolation { ref key, line: 9, .. } if key == "homing_positive_dir"
    ));

    let err = load(&format!("{}homing_positive_dir: false\n", stepper_x("0", "200", "200"))).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::RangeViolation { ref key, line: 9, .. } if key == "homing_positive_dir"
    ));

    let config = load(&format!("{}homing_positive_dir: false\n", stepper_x("0", "0", "200"))).unwrap();
    assert!(!config.steppers()[0].rail.as_ref().unwrap().homing_positive_dir);
}

#[test]
fn test_instance_name_policy() {
    let text = FIXTURE.replace("[heater_bed]", "[heater_bed main]");
    assert!(matches!(load(&text).unwrap_err(), ConfigError::Syntax { .. }));

    let text = FIXTURE.replace("[heater_generic chamber]", "[heater_generic]");
    assert!(matches!(load(&text).unwrap_err(), ConfigError::Syntax { .. }));
}

#[test]
fn test_unresolved_display_alias() {
    let text = FIXTURE.replace("csx_pin: EXP2_7", "csx_pin: EXP3_7");
    let err = load(&text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::UnresolvedAlias { ref key, ref pin, .. } if key == "csx_pin" && pin == "EXP3_7"
    ));
}

#[test]
fn test_reserved_alias_rejected() {
    let text = FIXTURE.replace("csx_pin: EXP2_7", "csx_pin: EXP2_9");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "csx_pin"));
}

#[test]
fn test_duplicate_pin_use() {
    let text = FIXTURE.replace("[fan]\npin: PA8", "[fan]\npin: PA3");
    let err = load(&text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::DuplicatePinUse { ref section, ref other_section, .. }
            if section == "fan" && other_section == "heater_generic chamber"
    ));
}

#[test]
fn test_alias_and_physical_name_collide() {
    // EXP1_6 is PB9; the display claims it after the fan already has
    let text = FIXTURE.replace("[fan]\npin: PA8", "[fan]\npin: PB9");
    let err = load(&text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::DuplicatePinUse { ref key, ref other_section, .. }
            if key == "d12_pin" && other_section == "fan"
    ));
}

#[test]
fn test_virtual_endstop_needs_probe() {
    let start = FIXTURE.find("[bltouch]").unwrap();
    let end = FIXTURE.find("[safe_z_home]").unwrap();
    let block = FIXTURE.find("#*# <----").unwrap();
    let text = format!("{}{}", &FIXTURE[..start], &FIXTURE[end..block]);
    let err = load(&text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::UnresolvedAlias { ref key, .. } if key == "endstop_pin"
    ));
}

#[test]
fn test_st7796s_keys_need_st7796s() {
    let text = FIXTURE.replace("lcd_type: st7796s", "lcd_type: st7920");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownKey { ref key, .. } if key == "dcx_pin"));
}

#[test]
fn test_st7796s_pins_on_one_mcu() {
    let text = FIXTURE
        .replace("[printer]", "[mcu ender]\nserial: /dev/ttyUSB1\n\n[printer]")
        .replace("d15_pin: EXP2_3", "d15_pin: ender:PA1");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "d15_pin"));
}

#[test]
fn test_display_rect_outside_screen() {
    let text = FIXTURE.replace("button1_rect: 400, 80, 480, 160", "button1_rect: 400, 80, 500, 160");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::RangeViolation { ref key, .. } if key == "button1_rect"));
}

#[test]
fn test_glyph_larger_than_button() {
    let text = FIXTURE.replace("button1_rect: 400, 80, 480, 160", "button1_rect: 400, 80, 404, 160");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::RangeViolation { ref key, .. } if key == "button1_glyph"));
}

#[test]
fn test_display_button_incomplete() {
    let text = FIXTURE.replace("button1_fgcolor: 255, 255, 255\n", "");
    let err = load(&text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::MissingRequiredKey { ref key, .. } if key == "button1_fgcolor"
    ));
}

#[test]
fn test_display_button_gap() {
    let text = FIXTURE
        .replace("button1_rect:", "button2_rect:")
        .replace("button1_fgcolor:", "button2_fgcolor:")
        .replace("button1_bgcolor:", "button2_bgcolor:")
        .replace("button1_glyph:", "button2_glyph:");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownKey { ref key, .. } if key == "button2_rect"));
}

#[test]
fn test_touch_polygon_needs_three_points() {
    let text = FIXTURE.replace("    480, 160\n    400, 160\n", "");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::RangeViolation { ref key, .. } if key == "button1_points"));
}

#[test]
fn test_touch_repeat_and_longpress_exclusive() {
    let text = FIXTURE.replace(
        "button0_repeat_function: up\n",
        "button0_repeat_function: up\nbutton0_longpress_function: back\n",
    );
    let err = load(&text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::RangeViolation { ref key, .. } if key == "button0_repeat_function"
    ));
}

#[test]
fn test_touch_function_and_gcode_exclusive() {
    let text = FIXTURE.replace("button0_function: up\n", "button0_function: up\nbutton0_gcode: G28\n");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::RangeViolation { ref key, .. } if key == "button0_gcode"));
}

#[test]
fn test_touch_button_needs_action() {
    let text = FIXTURE.replace("button1_gcode:\n    G28\n    M117 Homed\n", "");
    let err = load(&text).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::MissingRequiredKey { ref key, .. } if key == "button1_function"
    ));
}

#[test]
fn test_verify_heater_needs_heater() {
    let text = FIXTURE.replace("[verify_heater extruder]", "[verify_heater extruder2]");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownSection { ref section, .. } if section == "verify_heater extruder2"));
}

#[test]
fn test_heater_fan_unknown_heater() {
    let text = FIXTURE.replace("heater: extruder\n", "heater: extruder1\n");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::RangeViolation { ref key, .. } if key == "heater"));
}

#[test]
fn test_pid_needs_gains() {
    let text = FIXTURE.replace("pid_kd: 114\n", "");
    let err = load(&text).unwrap_err();
    assert!(matches!(err, ConfigError::MissingRequiredKey { ref key, .. } if key == "pid_kd"));
}
