use super::*;

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_charge_power_w: 1380.0,
            single_phase_max_power_w: 4140.0,
            two_phase_hold_power_w: 3680.0,
            grid_feed_allowance_w: 300.0,
            snap_pv_threshold_w: 1680.0,
            grid_import_boost_w: 27000.0,
            smoothing_previous_weight: 5.0,
            smoothing_min_delta_w: 200.0,
            phase_voltage_v: 230.0,
            line_voltage_v: 400.0,
            three_phase_factor: 1.73,
            phase_settle_seconds: 30,
            enable_settle_seconds: 15,
            discharge_boost_soc_on: 97.0,
            discharge_boost_soc_off: 95.0,
            discharge_boost_grid_w: -300.0,
            min_amp: 6,
            max_amp_single_phase: 18,
            max_amp_multi_phase: 32,
            used_phase_threshold_w: 500.0,
            mode_change_instant_seconds: 1,
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            active_window_seconds: 10,
            repeat_guard_seconds: 1,
            brightness_active: 255,
            brightness_default: 50,
            accessible_modes: vec![0, 1, 2, 3, 5, 7],
        }
    }
}

impl Default for EntitiesConfig {
    fn default() -> Self {
        Self {
            grid_power: "sensor.custom_globalGrid".to_string(),
            battery_power: "sensor.custom_batteryPower".to_string(),
            battery_soc: "sensor.custom_batterySOC".to_string(),
            car_charge_power: "sensor.go_echarger_nrg_11".to_string(),
            phase_powers: vec![
                "sensor.go_echarger_nrg_7".to_string(),
                "sensor.go_echarger_nrg_8".to_string(),
                "sensor.go_echarger_nrg_9".to_string(),
            ],
            total_energy: "sensor.go_echarger_eto".to_string(),
            priority_mode: "select.custom_chargeprio".to_string(),
            max_battery_charge_power: "sensor.custom_maxBatteryChargePower".to_string(),
            battery_soc_min: "number.custom_confSOCMin".to_string(),
            manual_charge_power: "number.custom_manualCarChargePower".to_string(),
            target_power_amount: "number.custom_targetCarPowerAmount".to_string(),
            automatic_curve: (0..CURVE_POINTS)
                .map(|i| format!("number.custom_automaticCurve{}", i * 10))
                .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/goe_surplus.log".to_string(),
            backup_count: 5,
            console_output: true,
            console_only: false,
            json_format: false,
        }
    }
}

fn default_led_colors() -> BTreeMap<u8, String> {
    [
        (0, "#FF0000"),
        (1, "#00FF00"),
        (2, "#0000FF"),
        (3, "#00FFFF"),
        (4, "#FFFF00"),
        (5, "#FF00FF"),
        (6, "#FFFFFF"),
        (7, "#FF8000"),
        (8, "#8000FF"),
    ]
    .into_iter()
    .map(|(mode, color)| (mode, color.to_string()))
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: "go-eCharger".to_string(),
            tick_interval_ms: 5000,
            state_file: None,
            controller: ControllerConfig::default(),
            button: ButtonConfig::default(),
            led_colors: default_led_colors(),
            entities: EntitiesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
