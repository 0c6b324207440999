// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Binding registry.
//!
//! Per-channel lookup tables from control number to the logical controls bound
//! there. Buttons are keyed a second time by trigger value so several buttons
//! can share one CC or note. A reverse index from control identity to the
//! occupied slots makes unbinding proportional to the control's own bindings.
//!
//! The registry is shared between the MIDI delivery thread (reads) and
//! whichever thread rebinds controls (writes) through [`SharedRegistry`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::relative::RelativeCodec;
use super::{
    format_key, identity_of, BindingKey, BoundControl, ButtonControl, Channel, ContinuousControl,
    MessageKind, RelativeControl, TouchControl, Trigger,
};

/// Registry handle shared by dispatchers and configuration code
pub type SharedRegistry = Arc<RwLock<BindingRegistry>>;

pub(crate) type ButtonRef = Arc<dyn ButtonControl>;
pub(crate) type ContinuousRef = Arc<dyn ContinuousControl>;
pub(crate) type RelativeRef = Arc<dyn RelativeControl>;
pub(crate) type TouchRef = Arc<dyn TouchControl>;

/// How a CC-bound continuous control interprets its data byte
#[derive(Clone)]
pub(crate) enum ContinuousBinding {
    /// 7-bit absolute position
    Absolute(ContinuousRef),
    /// One half of a 14-bit MSB/LSB pair
    HiRes(ContinuousRef),
    /// Endless encoder with its own codec
    Relative(RelativeRef, RelativeCodec),
}

impl ContinuousBinding {
    fn identity(&self) -> usize {
        match self {
            ContinuousBinding::Absolute(c) | ContinuousBinding::HiRes(c) => identity_of(c),
            ContinuousBinding::Relative(c, _) => identity_of(c),
        }
    }
}

/// Bindings for one MIDI channel
#[derive(Default)]
pub(crate) struct ChannelBindings {
    pub(crate) cc_buttons: HashMap<u8, BTreeMap<Trigger, ButtonRef>>,
    pub(crate) note_buttons: HashMap<u8, BTreeMap<Trigger, ButtonRef>>,
    pub(crate) cc_touch: HashMap<u8, TouchRef>,
    pub(crate) note_touch: HashMap<u8, TouchRef>,
    pub(crate) continuous: HashMap<u8, ContinuousBinding>,
    pub(crate) pitch_bend: Option<ContinuousRef>,
}

/// One occupied table cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    CcButton { channel: u8, number: u8, trigger: Trigger },
    NoteButton { channel: u8, number: u8, trigger: Trigger },
    CcTouch { channel: u8, number: u8 },
    NoteTouch { channel: u8, number: u8 },
    Continuous { channel: u8, number: u8 },
    PitchBend { channel: u8 },
}

/// Lookup tables from MIDI addresses to bound controls
pub struct BindingRegistry {
    channels: [ChannelBindings; 16],
    index: HashMap<usize, Vec<Slot>>,
}

impl BindingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            channels: std::array::from_fn(|_| ChannelBindings::default()),
            index: HashMap::new(),
        }
    }

    /// Create an empty registry behind a shared lock
    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    pub(crate) fn channel(&self, channel: u8) -> &ChannelBindings {
        &self.channels[(channel & 0x0F) as usize]
    }

    /// Bind a control through the capability it is tagged with.
    ///
    /// Buttons and touch sensors accept CC and note keys, continuous controls
    /// accept CC and pitch bend keys, relative controls accept CC keys with a
    /// unit-sensitivity two's complement codec. Other combinations are ignored.
    pub fn bind(&mut self, control: BoundControl, key: BindingKey) {
        match (control, key.kind) {
            (BoundControl::Button(button), MessageKind::Cc | MessageKind::Note) => {
                self.bind_button(button, key)
            }
            (BoundControl::Touch(touch), MessageKind::Cc) => {
                self.bind_cc_touch(touch, key.channel, key.number)
            }
            (BoundControl::Touch(touch), MessageKind::Note) => {
                self.bind_note_touch(touch, key.channel, key.number)
            }
            (BoundControl::Continuous(control), MessageKind::Cc) => {
                self.bind_continuous(control, key.channel, key.number)
            }
            (BoundControl::Continuous(control), MessageKind::PitchBend) => {
                self.bind_pitch_bend(control, key.channel)
            }
            (BoundControl::Relative(control), MessageKind::Cc) => {
                self.bind_relative(control, key.channel, key.number, RelativeCodec::default())
            }
            (control, _) => {
                warn!("Cannot bind {:?} to {}", control, format_key(&key));
            }
        }
    }

    /// Bind a button to a CC or note key, honoring its trigger value
    pub fn bind_button(&mut self, button: ButtonRef, key: BindingKey) {
        if !Self::valid(key.channel, key.number) {
            return;
        }
        if !key.trigger.is_valid() {
            warn!(
                "Ignoring button on {} with invalid trigger {:?}",
                format_key(&key),
                key.trigger
            );
            return;
        }
        let id = identity_of(&button);
        for channel in key.channel.expand() {
            let tables = &mut self.channels[channel as usize];
            let (table, slot) = match key.kind {
                MessageKind::Cc => (
                    &mut tables.cc_buttons,
                    Slot::CcButton { channel, number: key.number, trigger: key.trigger },
                ),
                MessageKind::Note => (
                    &mut tables.note_buttons,
                    Slot::NoteButton { channel, number: key.number, trigger: key.trigger },
                ),
                MessageKind::PitchBend => {
                    warn!("Buttons cannot be bound to pitch bend");
                    return;
                }
            };
            let displaced = table
                .entry(key.number)
                .or_default()
                .insert(key.trigger, button.clone())
                .map(|old| identity_of(&old));
            self.occupy(id, slot, displaced);
        }
        debug!("Bound button {:#x} to {}", id, format_key(&key));
    }

    /// Bind a button to a CC; `Trigger::Any` reacts to every value
    pub fn bind_cc_button(&mut self, button: ButtonRef, channel: Channel, cc: u8, trigger: Trigger) {
        self.bind_button(button, BindingKey::cc(channel, cc).trigger(trigger));
    }

    /// Bind a button to a note; `Trigger::Any` reacts to every velocity
    pub fn bind_note_button(
        &mut self,
        button: ButtonRef,
        channel: Channel,
        note: u8,
        trigger: Trigger,
    ) {
        self.bind_button(button, BindingKey::note(channel, note).trigger(trigger));
    }

    /// Bind a 7-bit absolute control to a CC
    pub fn bind_continuous(&mut self, control: ContinuousRef, channel: Channel, cc: u8) {
        self.bind_cc_slot(channel, cc, ContinuousBinding::Absolute(control));
    }

    /// Bind a 14-bit control to the CC pair `base_cc` / `base_cc + 32`.
    ///
    /// `base_cc` must be below 32.
    pub fn bind_hi_res(&mut self, control: ContinuousRef, channel: Channel, base_cc: u8) {
        if base_cc >= 32 {
            warn!("Hi-res base CC {} is not an MSB controller (0-31)", base_cc);
            return;
        }
        self.bind_cc_slot(channel, base_cc, ContinuousBinding::HiRes(control.clone()));
        self.bind_cc_slot(channel, base_cc + 32, ContinuousBinding::HiRes(control));
    }

    /// Bind an endless encoder to a CC with its own codec
    pub fn bind_relative(
        &mut self,
        control: RelativeRef,
        channel: Channel,
        cc: u8,
        codec: RelativeCodec,
    ) {
        self.bind_cc_slot(channel, cc, ContinuousBinding::Relative(control, codec));
    }

    /// Bind a continuous control to the pitch wheel of a channel
    pub fn bind_pitch_bend(&mut self, control: ContinuousRef, channel: Channel) {
        if !Self::valid(channel, 0) {
            return;
        }
        let id = identity_of(&control);
        for ch in channel.expand() {
            let displaced = self.channels[ch as usize]
                .pitch_bend
                .replace(control.clone())
                .map(|old| identity_of(&old));
            self.occupy(id, Slot::PitchBend { channel: ch }, displaced);
        }
        debug!("Bound {:#x} to {}", id, format_key(&BindingKey::pitch_bend(channel)));
    }

    /// Bind a touch sensor to a CC (value > 0 = touched)
    pub fn bind_cc_touch(&mut self, touch: TouchRef, channel: Channel, cc: u8) {
        if !Self::valid(channel, cc) {
            return;
        }
        let id = identity_of(&touch);
        for ch in channel.expand() {
            let displaced = self.channels[ch as usize]
                .cc_touch
                .insert(cc, touch.clone())
                .map(|old| identity_of(&old));
            self.occupy(id, Slot::CcTouch { channel: ch, number: cc }, displaced);
        }
        debug!("Bound touch {:#x} to {}", id, format_key(&BindingKey::cc(channel, cc)));
    }

    /// Bind a touch sensor to a note (note on = touched)
    pub fn bind_note_touch(&mut self, touch: TouchRef, channel: Channel, note: u8) {
        if !Self::valid(channel, note) {
            return;
        }
        let id = identity_of(&touch);
        for ch in channel.expand() {
            let displaced = self.channels[ch as usize]
                .note_touch
                .insert(note, touch.clone())
                .map(|old| identity_of(&old));
            self.occupy(id, Slot::NoteTouch { channel: ch, number: note }, displaced);
        }
        debug!("Bound touch {:#x} to {}", id, format_key(&BindingKey::note(channel, note)));
    }

    fn bind_cc_slot(&mut self, channel: Channel, cc: u8, binding: ContinuousBinding) {
        if !Self::valid(channel, cc) {
            return;
        }
        let id = binding.identity();
        for ch in channel.expand() {
            let displaced = self.channels[ch as usize]
                .continuous
                .insert(cc, binding.clone())
                .map(|old| old.identity());
            self.occupy(id, Slot::Continuous { channel: ch, number: cc }, displaced);
        }
        debug!("Bound {:#x} to {}", id, format_key(&BindingKey::cc(channel, cc)));
    }

    /// Remove every binding of a control. Unknown controls are ignored.
    pub fn unbind<T: ?Sized>(&mut self, control: &Arc<T>) {
        self.unbind_identity(identity_of(control));
    }

    /// Remove every binding of the control with this identity
    pub fn unbind_identity(&mut self, id: usize) {
        let Some(slots) = self.index.remove(&id) else {
            debug!("Unbind of {:#x} ignored, not bound", id);
            return;
        };
        for slot in &slots {
            self.clear_slot(*slot, id);
        }
        debug!("Unbound {:#x} from {} slot(s)", id, slots.len());
    }

    /// Change the sensitivity of every relative binding of a control.
    ///
    /// Returns false when the control has no relative binding.
    pub fn set_sensitivity<T: ?Sized>(&mut self, control: &Arc<T>, factor: f64) -> bool {
        let id = identity_of(control);
        let Some(slots) = self.index.get(&id) else {
            return false;
        };
        let mut changed = false;
        for slot in slots {
            if let Slot::Continuous { channel, number } = *slot {
                if let Some(ContinuousBinding::Relative(_, codec)) =
                    self.channels[channel as usize].continuous.get_mut(&number)
                {
                    codec.set_sensitivity(factor);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Check whether a control occupies any slot
    pub fn is_bound<T: ?Sized>(&self, control: &Arc<T>) -> bool {
        self.index.contains_key(&identity_of(control))
    }

    /// Number of occupied table cells (an `Any` binding counts once per channel)
    pub fn binding_count(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }

    /// Remove all bindings
    pub fn clear(&mut self) {
        self.channels = std::array::from_fn(|_| ChannelBindings::default());
        self.index.clear();
    }

    fn valid(channel: Channel, number: u8) -> bool {
        if !channel.is_valid() {
            warn!("Ignoring binding on invalid channel {:?}", channel);
            return false;
        }
        if number > 127 {
            warn!("Ignoring binding on invalid control number {}", number);
            return false;
        }
        true
    }

    /// Record that `id` now owns `slot`, which previously belonged to `displaced`
    fn occupy(&mut self, id: usize, slot: Slot, displaced: Option<usize>) {
        if let Some(old) = displaced.filter(|old| *old != id) {
            if let Some(slots) = self.index.get_mut(&old) {
                slots.retain(|s| *s != slot);
                if slots.is_empty() {
                    self.index.remove(&old);
                }
            }
        }
        let slots = self.index.entry(id).or_default();
        if !slots.contains(&slot) {
            slots.push(slot);
        }
    }

    fn clear_slot(&mut self, slot: Slot, id: usize) {
        match slot {
            Slot::CcButton { channel, number, trigger } => {
                remove_button(&mut self.channels[channel as usize].cc_buttons, number, trigger, id)
            }
            Slot::NoteButton { channel, number, trigger } => remove_button(
                &mut self.channels[channel as usize].note_buttons,
                number,
                trigger,
                id,
            ),
            Slot::CcTouch { channel, number } => {
                let table = &mut self.channels[channel as usize].cc_touch;
                if table.get(&number).is_some_and(|t| identity_of(t) == id) {
                    table.remove(&number);
                }
            }
            Slot::NoteTouch { channel, number } => {
                let table = &mut self.channels[channel as usize].note_touch;
                if table.get(&number).is_some_and(|t| identity_of(t) == id) {
                    table.remove(&number);
                }
            }
            Slot::Continuous { channel, number } => {
                let table = &mut self.channels[channel as usize].continuous;
                if table.get(&number).is_some_and(|b| b.identity() == id) {
                    table.remove(&number);
                }
            }
            Slot::PitchBend { channel } => {
                let pitch_bend = &mut self.channels[channel as usize].pitch_bend;
                if pitch_bend.as_ref().is_some_and(|c| identity_of(c) == id) {
                    *pitch_bend = None;
                }
            }
        }
    }
}

fn remove_button(
    table: &mut HashMap<u8, BTreeMap<Trigger, ButtonRef>>,
    number: u8,
    trigger: Trigger,
    id: usize,
) {
    if let Some(by_trigger) = table.get_mut(&number) {
        if by_trigger.get(&trigger).is_some_and(|b| identity_of(b) == id) {
            by_trigger.remove(&trigger);
        }
        if by_trigger.is_empty() {
            table.remove(&number);
        }
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
