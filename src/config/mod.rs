// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Controller profiles.
//!
//! A profile names the hardware input, the note inputs of that port and the
//! controls bound on it. Profiles are YAML (`.yaml`, `.yml`) or TOML
//! (`.toml`) files and are validated before anything is bound.

pub mod watcher;

pub use watcher::{validate_config, ConfigEvent, ConfigWatcher};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::control::{
    format_key, BindingKey, BindingRegistry, Channel, MessageKind, NamedControl, RelativeCodec,
    RelativeEncoding, Trigger,
};
use crate::notes::{compile_filters, NoteInputs, NoteRouter, PortId};

/// Root of a controller profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SurfaceProfile {
    /// Hardware input selection
    #[serde(default)]
    pub device: DeviceConfig,
    /// Note inputs of the port; the first is the default input
    #[serde(default)]
    pub note_inputs: Vec<NoteInputConfig>,
    /// Control bindings
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

impl SurfaceProfile {
    /// Load a profile, choosing the format by file extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {:?}", path))?;

        let profile = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&contents),
            _ => Self::from_yaml(&contents),
        };
        profile.with_context(|| format!("Invalid profile: {:?}", path))
    }

    /// Parse a profile from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML profile")
    }

    /// Parse a profile from a TOML string
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse TOML profile")
    }

    /// Check every binding and note input without touching a registry.
    ///
    /// Two bindings may not occupy the same registry cell, since binding the
    /// second would displace the first.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let mut occupied: HashMap<Cell, &str> = HashMap::new();
        for binding in &self.bindings {
            binding
                .validate()
                .with_context(|| format!("Binding '{}'", binding.name))?;
            if !names.insert(binding.name.as_str()) {
                bail!("Binding '{}' is declared twice", binding.name);
            }
            for cell in binding.cells() {
                if let Some(owner) = occupied.insert(cell, binding.name.as_str()) {
                    bail!(
                        "Bindings '{}' and '{}' both occupy {}",
                        owner,
                        binding.name,
                        format_key(&binding.key())
                    );
                }
            }
        }

        for input in &self.note_inputs {
            compile_filters(input.filters.as_slice())
                .with_context(|| format!("Note input '{}'", input.name))?;
        }
        Ok(())
    }

    /// Create a named control for each binding and register it.
    ///
    /// The returned controls are what a later reload unbinds.
    pub fn bind_into(&self, registry: &mut BindingRegistry) -> Vec<Arc<NamedControl>> {
        let controls: Vec<_> = self
            .bindings
            .iter()
            .map(|binding| {
                let control = Arc::new(NamedControl::new(binding.name.clone()));
                binding.bind(control.clone(), registry);
                control
            })
            .collect();
        info!("Bound {} controls", controls.len());
        controls
    }

    /// Build the note inputs of a port
    pub fn note_inputs(
        &self,
        port: PortId,
        router: Arc<dyn NoteRouter>,
    ) -> crate::Result<NoteInputs> {
        let Some((first, rest)) = self.note_inputs.split_first() else {
            return NoteInputs::new(port, router);
        };

        let mut inputs = NoteInputs::with_default(port, router, first.filters.as_slice())?;
        if let Some(input) = inputs.get_mut(0) {
            first.mpe.apply_to(input);
        }
        for config in rest {
            let input = inputs.create(config.filters.as_slice())?;
            config.mpe.apply_to(input);
        }
        Ok(inputs)
    }
}

/// Hardware input selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DeviceConfig {
    /// Substring of the input port name
    #[serde(default)]
    pub input: Option<String>,
}

/// One note input of the port
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteInputConfig {
    pub name: String,
    /// Filter patterns; empty selects the default set
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub mpe: MpeConfig,
}

/// MPE settings of a note input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MpeConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Pitch bend range in semitones
    #[serde(default = "default_pitch_bend_sensitivity")]
    pub pitch_bend_sensitivity: u8,
}

fn default_pitch_bend_sensitivity() -> u8 {
    crate::notes::DEFAULT_MPE_PITCH_BEND_SENSITIVITY
}

impl Default for MpeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pitch_bend_sensitivity: default_pitch_bend_sensitivity(),
        }
    }
}

impl MpeConfig {
    fn apply_to(&self, input: &mut crate::notes::NoteInput) {
        if *self != Self::default() {
            input.set_mpe(self.enabled, self.pitch_bend_sensitivity);
        }
    }
}

/// Capability a binding uses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Button,
    Continuous,
    HiRes,
    Relative,
    Touch,
    PitchBend,
}

/// Message family of button and touch bindings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Cc,
    Note,
}

/// Registry table cell, as (kind, channel, number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Cell {
    Button(MessageKind, u8, u8, Trigger),
    Touch(MessageKind, u8, u8),
    Cc(u8, u8),
    PitchBend(u8),
}

/// A single control binding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BindingConfig {
    /// Control name, unique within the profile
    pub name: String,
    pub kind: BindingKind,
    /// CC or note (buttons and touch only)
    #[serde(default)]
    pub source: SourceKind,
    /// MIDI channel (0-15); omitted binds channels 1-15
    #[serde(default)]
    pub channel: Option<u8>,
    /// CC or note number; the MSB controller for hi-res bindings
    #[serde(default)]
    pub number: u8,
    /// Data value a button reacts to; omitted reacts to any value
    #[serde(default)]
    pub trigger: Option<u8>,
    /// Relative encoding scheme
    #[serde(default)]
    pub encoding: RelativeEncoding,
    /// Relative increment multiplier
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
}

fn default_sensitivity() -> f64 {
    1.0
}

impl BindingConfig {
    pub fn channel(&self) -> Channel {
        Channel::from(self.channel)
    }

    /// Registry key this binding occupies
    pub fn key(&self) -> BindingKey {
        let channel = self.channel();
        let key = match (self.kind, self.source) {
            (BindingKind::PitchBend, _) => BindingKey::pitch_bend(channel),
            (BindingKind::Button | BindingKind::Touch, SourceKind::Note) => {
                BindingKey::note(channel, self.number)
            }
            _ => BindingKey::cc(channel, self.number),
        };
        key.trigger(Trigger::from(self.trigger))
    }

    /// Cells this binding occupies once bound, per concrete channel
    fn cells(&self) -> Vec<Cell> {
        let key = self.key();
        let numbers = match self.kind {
            BindingKind::HiRes => vec![self.number, self.number.saturating_add(32)],
            _ => vec![self.number],
        };
        let mut cells = Vec::new();
        for channel in key.channel.expand() {
            for &number in &numbers {
                cells.push(match self.kind {
                    BindingKind::Button => Cell::Button(key.kind, channel, number, key.trigger),
                    BindingKind::Touch => Cell::Touch(key.kind, channel, number),
                    BindingKind::PitchBend => Cell::PitchBend(channel),
                    _ => Cell::Cc(channel, number),
                });
            }
        }
        cells
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("name is empty");
        }
        if let Some(channel) = self.channel {
            if channel > 15 {
                bail!("channel {} is out of range (0-15)", channel);
            }
        }
        if self.number > 127 {
            bail!("number {} is out of range (0-127)", self.number);
        }
        if let Some(trigger) = self.trigger {
            if trigger > 127 {
                bail!("trigger {} is out of range (0-127)", trigger);
            }
            if self.kind != BindingKind::Button {
                bail!("trigger is only valid for buttons");
            }
        }
        if self.source == SourceKind::Note
            && !matches!(self.kind, BindingKind::Button | BindingKind::Touch)
        {
            bail!("{:?} bindings cannot use a note source", self.kind);
        }
        if self.kind == BindingKind::HiRes && self.number >= 32 {
            bail!("hi-res base CC {} must be below 32", self.number);
        }
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            bail!("sensitivity {} must be a positive number", self.sensitivity);
        }
        Ok(())
    }

    /// Register `control` through the capability this binding names
    pub fn bind(&self, control: Arc<NamedControl>, registry: &mut BindingRegistry) {
        let channel = self.channel();
        match self.kind {
            BindingKind::Button => registry.bind_button(control, self.key()),
            BindingKind::Continuous => registry.bind_continuous(control, channel, self.number),
            BindingKind::HiRes => registry.bind_hi_res(control, channel, self.number),
            BindingKind::Relative => registry.bind_relative(
                control,
                channel,
                self.number,
                RelativeCodec::with_sensitivity(self.encoding, self.sensitivity),
            ),
            BindingKind::Touch => match self.source {
                SourceKind::Cc => registry.bind_cc_touch(control, channel, self.number),
                SourceKind::Note => registry.bind_note_touch(control, channel, self.number),
            },
            BindingKind::PitchBend => registry.bind_pitch_bend(control, channel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{Dispatcher, MessageKind};
    use crate::notes::TracingNoteRouter;

    const PROFILE: &str = r#"
device:
  input: "X-Touch"

note_inputs:
  - name: Keys
    filters: ["9?????", "8?????"]
    mpe:
      enabled: true
  - name: Pedals
    filters: ["B?40??"]

bindings:
  - name: play
    kind: button
    channel: 0
    number: 94
    trigger: 127
  - name: pad1
    kind: button
    source: note
    number: 36
  - name: fader1
    kind: hi_res
    channel: 0
    number: 7
  - name: fader1_touch
    kind: touch
    source: note
    channel: 0
    number: 104
  - name: jog
    kind: relative
    channel: 0
    number: 60
    encoding: signed_bit
    sensitivity: 0.5
  - name: wheel
    kind: pitch_bend
    channel: 1
"#;

    #[test]
    fn test_parse_profile() {
        let profile = SurfaceProfile::from_yaml(PROFILE).unwrap();
        assert_eq!(profile.device.input.as_deref(), Some("X-Touch"));
        assert_eq!(profile.note_inputs.len(), 2);
        assert!(profile.note_inputs[0].mpe.enabled);
        assert_eq!(profile.note_inputs[0].mpe.pitch_bend_sensitivity, 48);
        assert_eq!(profile.bindings.len(), 6);

        let play = &profile.bindings[0];
        assert_eq!(play.kind, BindingKind::Button);
        assert_eq!(play.key().trigger, Trigger::Value(127));

        let pad = &profile.bindings[1];
        assert_eq!(pad.channel(), Channel::Any);
        assert_eq!(pad.key().kind, MessageKind::Note);

        let jog = &profile.bindings[4];
        assert_eq!(jog.encoding, RelativeEncoding::SignedBit);
        assert_eq!(jog.sensitivity, 0.5);
        assert_eq!(profile.bindings[5].key(), BindingKey::pitch_bend(Channel::Fixed(1)));

        profile.validate().unwrap();
    }

    #[test]
    fn test_parse_toml_profile() {
        let text = r#"
[device]
input = "Launch Control"

[[bindings]]
name = "knob1"
kind = "relative"
number = 21
encoding = "offset_binary"

[[bindings]]
name = "mute1"
kind = "button"
channel = 8
number = 41
"#;
        let profile = SurfaceProfile::from_toml(text).unwrap();
        assert_eq!(profile.bindings.len(), 2);
        assert_eq!(profile.bindings[0].encoding, RelativeEncoding::OffsetBinary);
        assert_eq!(profile.bindings[0].sensitivity, 1.0);
        assert_eq!(profile.bindings[1].channel(), Channel::Fixed(8));
        assert!(profile.note_inputs.is_empty());
        profile.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects() {
        let cases = [
            "bindings: [{name: a, kind: button, channel: 16, number: 1}]",
            "bindings: [{name: a, kind: button, number: 128}]",
            "bindings: [{name: a, kind: hi_res, number: 40}]",
            "bindings: [{name: a, kind: continuous, source: note, number: 1}]",
            "bindings: [{name: a, kind: relative, number: 1, sensitivity: 0}]",
            "bindings: [{name: a, kind: touch, number: 1, trigger: 1}]",
            "bindings: [{name: a, kind: button, number: 1}, {name: a, kind: touch, number: 2}]",
            "note_inputs: [{name: k, filters: ['8???00']}]",
            // Slot collisions
            "bindings: [{name: a, kind: continuous, number: 7}, {name: b, kind: relative, number: 7}]",
            "bindings: [{name: a, kind: hi_res, channel: 0, number: 7}, {name: b, kind: continuous, channel: 0, number: 39}]",
            "bindings: [{name: a, kind: button, number: 5}, {name: b, kind: button, channel: 3, number: 5}]",
            "bindings: [{name: a, kind: pitch_bend}, {name: b, kind: pitch_bend, channel: 9}]",
        ];
        for yaml in cases {
            let profile = SurfaceProfile::from_yaml(yaml).unwrap();
            assert!(profile.validate().is_err(), "accepted: {}", yaml);
        }
    }

    #[test]
    fn test_shared_numbers_on_separate_cells() {
        let yaml = r#"
bindings:
  - { name: low, kind: button, channel: 0, number: 20, trigger: 0 }
  - { name: high, kind: button, channel: 0, number: 20, trigger: 64 }
  - { name: knob, kind: continuous, channel: 0, number: 20 }
  - { name: knob_touch, kind: touch, channel: 0, number: 20 }
  - { name: pad, kind: button, source: note, channel: 0, number: 20 }
  - { name: master, kind: continuous, channel: 0, number: 21 }
  - { name: member, kind: continuous, number: 21 }
"#;
        SurfaceProfile::from_yaml(yaml).unwrap().validate().unwrap();

        let clash = "bindings: [{name: a, kind: continuous, number: 7}, {name: b, kind: relative, number: 7}]";
        let err = SurfaceProfile::from_yaml(clash).unwrap().validate().unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("'a'") && message.contains("'b'"), "{}", message);
    }

    #[test]
    fn test_unknown_kind_fails_to_parse() {
        assert!(SurfaceProfile::from_yaml("bindings: [{name: a, kind: slider}]").is_err());
    }

    #[test]
    fn test_bind_into_registry() {
        let profile = SurfaceProfile::from_yaml(PROFILE).unwrap();
        let registry = BindingRegistry::shared();
        let controls = profile.bind_into(&mut registry.write());
        assert_eq!(controls.len(), 6);
        for control in &controls {
            assert!(registry.read().is_bound(control));
        }

        let mut dispatcher = Dispatcher::new(registry.clone());
        assert!(dispatcher.dispatch(0xB0, 94, 127));
        assert!(controls[0].state().pressed);

        // Hi-res pair: MSB stored, LSB fires
        dispatcher.dispatch(0xB0, 7, 64);
        assert!(dispatcher.dispatch(0xB0, 39, 0));
        assert!((controls[2].state().value - 8192.0 / 16383.0).abs() < 1e-9);

        // Signed bit, 3 steps up at half sensitivity
        assert!(dispatcher.dispatch(0xB0, 60, 3));
        assert!((controls[4].state().value - 1.5 / 127.0).abs() < 1e-9);

        assert!(dispatcher.dispatch(0xE1, 0x7F, 0x7F));
        assert_eq!(controls[5].state().value, 1.0);

        dispatcher.dispatch(0x95, 36, 90);
        assert!(controls[1].state().pressed);
    }

    #[test]
    fn test_build_note_inputs() {
        let profile = SurfaceProfile::from_yaml(PROFILE).unwrap();
        let inputs = profile
            .note_inputs(PortId(0), Arc::new(TracingNoteRouter))
            .unwrap();
        assert_eq!(inputs.len(), 2);
        let keys = inputs.default_input().unwrap();
        assert_eq!(keys.filter().len(), 32);
        assert!(keys.mpe_enabled());
        assert_eq!(inputs.get(1).unwrap().filter().len(), 16);

        let empty = SurfaceProfile::default()
            .note_inputs(PortId(0), Arc::new(TracingNoteRouter))
            .unwrap();
        assert_eq!(empty.len(), 1);
        assert_eq!(empty.default_input().unwrap().filter().len(), 8);
    }
}
