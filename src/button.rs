//! Mode-cycling button
//!
//! The first press lights the LED up and shows the colour of the current
//! priority. Further presses while the LED is bright step through the
//! button-accessible priorities. Once the active window has passed without a
//! press the LED dims again.

use crate::actuation::Command;
use crate::config::{Config, MAX_MODE_CODE};
use crate::debounce::window;
use crate::state::ControllerState;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What a press did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ButtonEvent {
    /// LED woke up, priority unchanged
    Activated,
    /// Selected the next accessible priority
    Cycled { from: u8, to: u8 },
    /// Too soon after the previous press
    Ignored,
}

/// Result of handling a press
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonOutcome {
    pub event: ButtonEvent,
    pub commands: Vec<Command>,
}

impl ButtonOutcome {
    /// Whether the rest of the cycle is skipped
    pub fn ends_cycle(&self) -> bool {
        !matches!(self.event, ButtonEvent::Ignored)
    }
}

/// LED colour command for `mode`, if a colour is configured
pub fn led_color_command(config: &Config, mode: u8) -> Option<Command> {
    config
        .led_color(mode)
        .map(|color| Command::LedColor(color.to_string()))
}

/// First accessible mode above `current`, wrapping to Off
pub fn next_accessible_mode(current: u8, accessible: &[u8]) -> u8 {
    (current.saturating_add(1)..=MAX_MODE_CODE)
        .find(|code| accessible.contains(code))
        .unwrap_or(0)
}

/// Handle a button press while `current_mode` is selected
pub fn on_press(
    state: &mut ControllerState,
    current_mode: u8,
    config: &Config,
    now: DateTime<Utc>,
) -> ButtonOutcome {
    let button = &config.button;

    if !state.led_brightness_active {
        state.led_brightness_active = true;
        state.last_button_press = Some(now);
        let mut commands = vec![Command::LedBrightness(button.brightness_active)];
        commands.extend(led_color_command(config, current_mode));
        return ButtonOutcome {
            event: ButtonEvent::Activated,
            commands,
        };
    }

    let guard = window(button.repeat_guard_seconds);
    let ready = state
        .last_button_press
        .is_none_or(|last| now - last >= guard);
    if !ready {
        return ButtonOutcome {
            event: ButtonEvent::Ignored,
            commands: Vec::new(),
        };
    }

    let next = next_accessible_mode(current_mode, &button.accessible_modes);
    state.last_button_press = Some(now);
    let mut commands = vec![Command::PriorityMode(next)];
    commands.extend(led_color_command(config, next));
    ButtonOutcome {
        event: ButtonEvent::Cycled {
            from: current_mode,
            to: next,
        },
        commands,
    }
}

/// Dim the LED once the active window has elapsed
pub fn on_tick(state: &mut ControllerState, config: &Config, now: DateTime<Utc>) -> Option<Command> {
    if !state.led_brightness_active {
        return None;
    }
    let active = window(config.button.active_window_seconds);
    let expired = state
        .last_button_press
        .is_none_or(|last| now - last >= active);
    if !expired {
        return None;
    }
    state.led_brightness_active = false;
    Some(Command::LedBrightness(config.button.brightness_default))
}
