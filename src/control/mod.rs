// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Control surface bindings.
//!
//! This module provides:
//! - Capability traits for logical controls (buttons, continuous, relative, touch)
//! - The binding registry keyed by channel and control number
//! - The dispatcher turning raw MIDI into control updates
//! - Relative encoder codecs

pub mod dispatch;
pub mod named;
pub mod registry;
pub mod relative;

pub use dispatch::{should_forward, Dispatcher, HiResAccumulator, RawCallback};
pub use named::{ControlState, NamedControl};
pub use registry::{BindingRegistry, SharedRegistry};
pub use relative::{RelativeCodec, RelativeEncoding};

use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Channels an `Any` binding is registered on (MPE member channels).
pub const ANY_CHANNELS: RangeInclusive<u8> = 1..=15;

/// Button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonEvent {
    Down,
    Up,
}

/// A control that is pressed and released
pub trait ButtonControl: Send + Sync {
    /// Called with the transition and velocity normalized to 0.0..=1.0
    fn trigger(&self, event: ButtonEvent, velocity: f64);
}

/// A control with an absolute position (fader, absolute knob, pitch wheel)
pub trait ContinuousControl: Send + Sync {
    /// Called with the new position normalized to 0.0..=1.0
    fn handle_value(&self, normalized: f64);
}

/// An endless encoder reporting increments
pub trait RelativeControl: Send + Sync {
    /// Called with the decoded, sensitivity-scaled increment
    fn handle_delta(&self, delta: f64);
}

/// A touch-sensitive surface (fader cap, knob top)
pub trait TouchControl: Send + Sync {
    fn trigger_touch(&self, active: bool);
}

/// A logical control tagged with the capability it is bound through
#[derive(Clone)]
pub enum BoundControl {
    Button(Arc<dyn ButtonControl>),
    Continuous(Arc<dyn ContinuousControl>),
    Relative(Arc<dyn RelativeControl>),
    Touch(Arc<dyn TouchControl>),
}

impl BoundControl {
    /// Identity used for unbinding; shared by every capability of one object
    pub fn identity(&self) -> usize {
        match self {
            BoundControl::Button(c) => identity_of(c),
            BoundControl::Continuous(c) => identity_of(c),
            BoundControl::Relative(c) => identity_of(c),
            BoundControl::Touch(c) => identity_of(c),
        }
    }
}

impl std::fmt::Debug for BoundControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            BoundControl::Button(_) => "Button",
            BoundControl::Continuous(_) => "Continuous",
            BoundControl::Relative(_) => "Relative",
            BoundControl::Touch(_) => "Touch",
        };
        write!(f, "{}@{:#x}", kind, self.identity())
    }
}

/// Address of the object behind an `Arc`, ignoring any trait-object metadata
pub fn identity_of<T: ?Sized>(control: &Arc<T>) -> usize {
    Arc::as_ptr(control) as *const () as usize
}

/// Channel selector used at bind time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Channel {
    /// Channels 1-15; channel 0 is the MPE master channel and is left out
    #[default]
    Any,
    /// A single channel (0-15)
    Fixed(u8),
}

impl Channel {
    /// Map the conventional integer form (-1 = any).
    ///
    /// Values above 15 stay invalid so the registry refuses them.
    pub fn from_raw(raw: i32) -> Self {
        if raw < 0 {
            Channel::Any
        } else {
            Channel::Fixed(u8::try_from(raw).unwrap_or(u8::MAX))
        }
    }

    /// Concrete channels this selector expands to
    pub fn expand(self) -> RangeInclusive<u8> {
        match self {
            Channel::Any => ANY_CHANNELS,
            Channel::Fixed(ch) => ch..=ch,
        }
    }

    pub fn is_valid(self) -> bool {
        match self {
            Channel::Any => true,
            Channel::Fixed(ch) => ch < 16,
        }
    }
}

impl From<Option<u8>> for Channel {
    fn from(channel: Option<u8>) -> Self {
        channel.map(Channel::Fixed).unwrap_or(Channel::Any)
    }
}

/// Data value a button reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Trigger {
    /// Matches every data value
    #[default]
    Any,
    /// Matches exactly this data value
    Value(u8),
}

impl Trigger {
    /// Map the conventional integer form (-1 = any).
    ///
    /// Values above 127 stay invalid so the registry refuses them.
    pub fn from_raw(raw: i32) -> Self {
        if raw < 0 {
            Trigger::Any
        } else {
            Trigger::Value(u8::try_from(raw).unwrap_or(u8::MAX))
        }
    }

    pub fn is_valid(self) -> bool {
        match self {
            Trigger::Any => true,
            Trigger::Value(v) => v <= 127,
        }
    }

    pub fn matches(self, data2: u8) -> bool {
        match self {
            Trigger::Any => true,
            Trigger::Value(v) => v == data2,
        }
    }
}

impl From<Option<u8>> for Trigger {
    fn from(value: Option<u8>) -> Self {
        value.map(Trigger::Value).unwrap_or(Trigger::Any)
    }
}

/// Message family a binding listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Cc,
    Note,
    PitchBend,
}

/// Where a control is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub channel: Channel,
    pub number: u8,
    pub kind: MessageKind,
    pub trigger: Trigger,
}

impl BindingKey {
    pub fn cc(channel: Channel, number: u8) -> Self {
        Self {
            channel,
            number,
            kind: MessageKind::Cc,
            trigger: Trigger::Any,
        }
    }

    pub fn note(channel: Channel, number: u8) -> Self {
        Self {
            channel,
            number,
            kind: MessageKind::Note,
            trigger: Trigger::Any,
        }
    }

    pub fn pitch_bend(channel: Channel) -> Self {
        Self {
            channel,
            number: 0, // Not used for pitch bend
            kind: MessageKind::PitchBend,
            trigger: Trigger::Any,
        }
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }
}

/// Format a binding key for display
pub fn format_key(key: &BindingKey) -> String {
    let channel = match key.channel {
        Channel::Any => "ChAny".to_string(),
        Channel::Fixed(c) => format!("Ch{}", u16::from(c) + 1),
    };
    let trigger = match key.trigger {
        Trigger::Any => String::new(),
        Trigger::Value(v) => format!(" ={}", v),
    };
    match key.kind {
        MessageKind::Cc => format!("{} CC {}{}", channel, key.number, trigger),
        MessageKind::Note => format!("{} Note {}{}", channel, key.number, trigger),
        MessageKind::PitchBend => format!("{} PitchBend", channel),
    }
}
