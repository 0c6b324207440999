// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Raw MIDI dispatch.
//!
//! A [`Dispatcher`] belongs to one input port and runs on that port's delivery
//! thread. It classifies each short message, looks it up in the shared
//! registry, reconstructs 14-bit values and fires the matched controls. Controls
//! are fired after the registry lock is released.

use smallvec::SmallVec;
use tracing::trace;

use super::registry::{
    ButtonRef, ChannelBindings, ContinuousBinding, ContinuousRef, RelativeRef, SharedRegistry,
    TouchRef,
};
use super::{ButtonEvent, Trigger};
use crate::midi::{self, messages};

/// Receives every message that is not swallowed by a binding
pub type RawCallback = Box<dyn FnMut(u8, u8, u8) + Send>;

/// Largest 14-bit value, used to normalize hi-res CC pairs and pitch bend
pub const MAX_14BIT: f64 = 16383.0;

/// Most recent MSB per channel and base controller (0-31)
#[derive(Debug, Clone)]
pub struct HiResAccumulator {
    msb: [[u8; 32]; 16],
}

impl HiResAccumulator {
    pub fn new() -> Self {
        Self { msb: [[0; 32]; 16] }
    }

    /// Remember the MSB sent on `base_cc`
    pub fn store(&mut self, channel: u8, base_cc: u8, value: u8) {
        self.msb[(channel & 0x0F) as usize][(base_cc & 0x1F) as usize] = value & 0x7F;
    }

    pub fn msb(&self, channel: u8, base_cc: u8) -> u8 {
        self.msb[(channel & 0x0F) as usize][(base_cc & 0x1F) as usize]
    }

    /// Combine the stored MSB with an LSB into a 14-bit value
    pub fn combine(&self, channel: u8, base_cc: u8, lsb: u8) -> u16 {
        (self.msb(channel, base_cc) as u16) * 128 + (lsb & 0x7F) as u16
    }
}

impl Default for HiResAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a message goes on to the raw callback.
///
/// Note messages always do; anything else only when no binding consumed it.
pub fn should_forward(status: u8, consumed: bool) -> bool {
    !consumed || midi::is_note_command(status)
}

/// A control update collected under the registry lock
enum Fire {
    Button(ButtonRef, ButtonEvent, f64),
    Touch(TouchRef, bool),
    Value(ContinuousRef, f64),
    Delta(RelativeRef, f64),
}

impl Fire {
    fn run(self) {
        match self {
            Fire::Button(button, event, velocity) => button.trigger(event, velocity),
            Fire::Touch(touch, active) => touch.trigger_touch(active),
            Fire::Value(control, value) => control.handle_value(value),
            Fire::Delta(control, delta) => control.handle_delta(delta),
        }
    }
}

type Fires = SmallVec<[Fire; 2]>;

/// Per-port MIDI dispatcher
pub struct Dispatcher {
    registry: SharedRegistry,
    hi_res: HiResAccumulator,
    forward: Option<RawCallback>,
}

impl Dispatcher {
    /// Create a dispatcher reading from a shared registry
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            hi_res: HiResAccumulator::new(),
            forward: None,
        }
    }

    /// Set the callback receiving forwarded messages
    pub fn with_forward<F>(mut self, callback: F) -> Self
    where
        F: FnMut(u8, u8, u8) + Send + 'static,
    {
        self.forward = Some(Box::new(callback));
        self
    }

    /// Dispatch a raw packet as delivered by the transport.
    ///
    /// System messages (SysEx, system common, real-time) are ignored. Short
    /// channel messages are padded with zero data bytes.
    pub fn handle_bytes(&mut self, data: &[u8]) -> bool {
        let Some(&status) = data.first() else {
            return false;
        };
        if status < 0x80 || status >= messages::SYSEX_START {
            trace!("Ignoring {}", midi::format_hex(data));
            return false;
        }
        let data1 = data.get(1).copied().unwrap_or(0);
        let data2 = data.get(2).copied().unwrap_or(0);
        self.dispatch(status, data1, data2)
    }

    /// Process one short message; returns true if a binding consumed it.
    ///
    /// The message is then handed to the forward callback unless
    /// [`should_forward`] says it was swallowed.
    pub fn dispatch(&mut self, status: u8, data1: u8, data2: u8) -> bool {
        let data1 = data1 & 0x7F;
        let data2 = data2 & 0x7F;
        let consumed = self.process(status, data1, data2);
        trace!(
            "{:02X} {:02X} {:02X} consumed={}",
            status,
            data1,
            data2,
            consumed
        );

        if should_forward(status, consumed) {
            if let Some(forward) = self.forward.as_mut() {
                forward(status, data1, data2);
            }
        }
        consumed
    }

    fn process(&mut self, status: u8, data1: u8, data2: u8) -> bool {
        let channel = midi::channel(status);
        let mut fires = Fires::new();

        let consumed = {
            let registry = self.registry.read();
            let tables = registry.channel(channel);
            match midi::command(status) {
                messages::CONTROL_CHANGE => {
                    collect_cc(tables, &mut self.hi_res, channel, data1, data2, &mut fires)
                }
                messages::NOTE_OFF | messages::NOTE_ON => {
                    let is_note_off = midi::command(status) == messages::NOTE_OFF || data2 == 0;
                    collect_note(tables, data1, data2, is_note_off, &mut fires)
                }
                messages::PITCH_BEND => match &tables.pitch_bend {
                    Some(control) => {
                        let value = (data2 as u16) * 128 + data1 as u16;
                        fires.push(Fire::Value(control.clone(), value as f64 / MAX_14BIT));
                        true
                    }
                    None => false,
                },
                _ => false,
            }
        };

        for fire in fires {
            fire.run();
        }
        consumed
    }
}

fn collect_cc(
    tables: &ChannelBindings,
    hi_res: &mut HiResAccumulator,
    channel: u8,
    data1: u8,
    data2: u8,
    fires: &mut Fires,
) -> bool {
    if let Some(by_trigger) = tables.cc_buttons.get(&data1) {
        let mut matched = false;
        for (trigger, button) in by_trigger {
            if trigger.matches(data2) {
                let event = if *trigger == Trigger::Value(0) || data2 > 0 {
                    ButtonEvent::Down
                } else {
                    ButtonEvent::Up
                };
                fires.push(Fire::Button(button.clone(), event, data2 as f64 / 127.0));
                matched = true;
            }
        }
        if matched {
            return true;
        }
    }

    if let Some(touch) = tables.cc_touch.get(&data1) {
        fires.push(Fire::Touch(touch.clone(), data2 > 0));
        return true;
    }

    match tables.continuous.get(&data1) {
        Some(ContinuousBinding::HiRes(control)) => {
            if data1 < 32 {
                // MSB: wait for the companion LSB
                hi_res.store(channel, data1, data2);
                false
            } else if data1 < 64 {
                let value = hi_res.combine(channel, data1 - 32, data2);
                fires.push(Fire::Value(control.clone(), value as f64 / MAX_14BIT));
                true
            } else {
                false
            }
        }
        Some(ContinuousBinding::Absolute(control)) => {
            fires.push(Fire::Value(control.clone(), data2 as f64 / 127.0));
            true
        }
        Some(ContinuousBinding::Relative(control, codec)) => {
            fires.push(Fire::Delta(control.clone(), codec.decode(data2)));
            true
        }
        None => false,
    }
}

fn collect_note(
    tables: &ChannelBindings,
    note: u8,
    velocity: u8,
    is_note_off: bool,
    fires: &mut Fires,
) -> bool {
    if let Some(by_trigger) = tables.note_buttons.get(&note) {
        let event = if is_note_off {
            ButtonEvent::Up
        } else {
            ButtonEvent::Down
        };
        let mut matched = false;
        for (trigger, button) in by_trigger {
            if trigger.matches(velocity) {
                fires.push(Fire::Button(button.clone(), event, velocity as f64 / 127.0));
                matched = true;
            }
        }
        if matched {
            return true;
        }
    }

    if let Some(touch) = tables.note_touch.get(&note) {
        fires.push(Fire::Touch(touch.clone(), !is_note_off));
        return true;
    }
    false
}
