// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Named logical controls.
//!
//! A [`NamedControl`] implements every capability, keeps its latest state and
//! logs each event. Profiles create one per declared binding.

use parking_lot::Mutex;
use tracing::info;

use super::{ButtonControl, ButtonEvent, ContinuousControl, RelativeControl, TouchControl};

/// Snapshot of a control's latest state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlState {
    /// Button currently held
    pub pressed: bool,
    /// Last velocity or position (0.0 - 1.0)
    pub value: f64,
    /// Touch sensor active
    pub touched: bool,
    /// Number of events received
    pub events: u64,
}

/// A control identified by name
#[derive(Debug)]
pub struct NamedControl {
    name: String,
    /// Position change per relative step of 1.0
    step: f64,
    state: Mutex<ControlState>,
}

impl NamedControl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step: 1.0 / 127.0,
            state: Mutex::new(ControlState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ControlState {
        *self.state.lock()
    }
}

impl ButtonControl for NamedControl {
    fn trigger(&self, event: ButtonEvent, velocity: f64) {
        let mut state = self.state.lock();
        state.pressed = event == ButtonEvent::Down;
        state.value = velocity;
        state.events += 1;
        info!(control = %self.name, "{:?} velocity {:.3}", event, velocity);
    }
}

impl ContinuousControl for NamedControl {
    fn handle_value(&self, normalized: f64) {
        let mut state = self.state.lock();
        state.value = normalized.clamp(0.0, 1.0);
        state.events += 1;
        info!(control = %self.name, "value {:.4}", state.value);
    }
}

impl RelativeControl for NamedControl {
    fn handle_delta(&self, delta: f64) {
        let mut state = self.state.lock();
        state.value = (state.value + delta * self.step).clamp(0.0, 1.0);
        state.events += 1;
        info!(control = %self.name, "delta {:+} -> {:.4}", delta, state.value);
    }
}

impl TouchControl for NamedControl {
    fn trigger_touch(&self, active: bool) {
        let mut state = self.state.lock();
        state.touched = active;
        state.events += 1;
        info!(control = %self.name, "touch {}", if active { "on" } else { "off" });
    }
}
