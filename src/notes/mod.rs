// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Note inputs.
//!
//! A note input selects which of a port's messages reach the note-routing
//! backend (by compiled filter), remaps keys and velocities, and carries the
//! port's MPE setting. One port can have several note inputs; the first is
//! the default.

pub mod filter;

pub use filter::{compile_filters, CompiledFilter, PatternError, DEFAULT_FILTERS};

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::midi::{self, messages};

/// Default MPE pitch bend range in semitones
pub const DEFAULT_MPE_PITCH_BEND_SENSITIVITY: u8 = 48;

/// Identity of a MIDI port as known to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub usize);

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "port{}", self.0)
    }
}

/// Backend that moves note traffic. Registration is fire-and-forget.
pub trait NoteRouter: Send + Sync {
    fn register_note_filters(&self, port: PortId, index: usize, filters: &[String]);

    fn register_key_translation(&self, port: PortId, index: usize, table: &[i32; 128]);

    fn register_velocity_translation(&self, port: PortId, index: usize, table: &[i32; 128]);

    /// MPE mode changed for a note input
    fn register_expressive_midi(
        &self,
        _port: PortId,
        _index: usize,
        _enabled: bool,
        _pitch_bend_sensitivity: u8,
    ) {
    }
}

/// Router that only logs registrations
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNoteRouter;

impl NoteRouter for TracingNoteRouter {
    fn register_note_filters(&self, port: PortId, index: usize, filters: &[String]) {
        debug!("{} input {}: filters {}", port, index, filters.join(" "));
    }

    fn register_key_translation(&self, port: PortId, index: usize, table: &[i32; 128]) {
        let remapped = table.iter().enumerate().filter(|(k, v)| **v != *k as i32).count();
        debug!("{} input {}: {} keys remapped", port, index, remapped);
    }

    fn register_velocity_translation(&self, port: PortId, index: usize, table: &[i32; 128]) {
        let remapped = table.iter().enumerate().filter(|(k, v)| **v != *k as i32).count();
        debug!("{} input {}: {} velocities remapped", port, index, remapped);
    }

    fn register_expressive_midi(&self, port: PortId, index: usize, enabled: bool, range: u8) {
        debug!("{} input {}: MPE {} (bend range {})", port, index, enabled, range);
    }
}

fn identity_table() -> [i32; 128] {
    let mut table = [0; 128];
    for (i, v) in table.iter_mut().enumerate() {
        *v = i as i32;
    }
    table
}

/// One filtered, translated view of a port's note traffic
pub struct NoteInput {
    port: PortId,
    index: usize,
    filter: CompiledFilter,
    key_translation: [i32; 128],
    velocity_translation: [i32; 128],
    mpe_enabled: bool,
    mpe_pitch_bend_sensitivity: u8,
    router: Arc<dyn NoteRouter>,
}

impl NoteInput {
    /// Compile `patterns` (empty means the default set) and register with the router
    pub fn new<S: AsRef<str>>(
        port: PortId,
        index: usize,
        patterns: &[S],
        router: Arc<dyn NoteRouter>,
    ) -> Result<Self> {
        let filter = compile_filters(patterns)?;
        router.register_note_filters(port, index, &filter.to_vec());

        Ok(Self {
            port,
            index,
            filter,
            key_translation: identity_table(),
            velocity_translation: identity_table(),
            mpe_enabled: false,
            mpe_pitch_bend_sensitivity: DEFAULT_MPE_PITCH_BEND_SENSITIVITY,
            router,
        })
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_default(&self) -> bool {
        self.index == 0
    }

    pub fn filter(&self) -> &CompiledFilter {
        &self.filter
    }

    pub fn key_translation(&self) -> &[i32; 128] {
        &self.key_translation
    }

    pub fn velocity_translation(&self) -> &[i32; 128] {
        &self.velocity_translation
    }

    pub fn mpe_enabled(&self) -> bool {
        self.mpe_enabled
    }

    pub fn mpe_pitch_bend_sensitivity(&self) -> u8 {
        self.mpe_pitch_bend_sensitivity
    }

    /// Replace the key table. Entries outside 0..=127 block the key.
    pub fn set_key_translation(&mut self, table: [i32; 128]) {
        self.key_translation = table;
        self.router
            .register_key_translation(self.port, self.index, &self.key_translation);
    }

    pub fn set_velocity_translation(&mut self, table: [i32; 128]) {
        self.velocity_translation = table;
        self.router
            .register_velocity_translation(self.port, self.index, &self.velocity_translation);
    }

    pub fn set_mpe(&mut self, enabled: bool, pitch_bend_sensitivity: u8) {
        self.mpe_enabled = enabled;
        self.mpe_pitch_bend_sensitivity = pitch_bend_sensitivity;
        self.router
            .register_expressive_midi(self.port, self.index, enabled, pitch_bend_sensitivity);
    }

    pub fn accepts(&self, status: u8, data1: u8, data2: u8) -> bool {
        self.filter.matches(status, data1, data2)
    }

    /// Filter and translate a message; `None` if this input drops it.
    pub fn translate(&self, status: u8, data1: u8, data2: u8) -> Option<[u8; 3]> {
        if !self.accepts(status, data1, data2) {
            return None;
        }

        match midi::command(status) {
            messages::NOTE_ON | messages::NOTE_OFF => {
                let key = self.translate_key(data1)?;
                let velocity = self.velocity_translation[(data2 & 0x7F) as usize].clamp(0, 127);
                Some([status, key, velocity as u8])
            }
            messages::POLY_AFTERTOUCH => Some([status, self.translate_key(data1)?, data2]),
            _ => Some([status, data1, data2]),
        }
    }

    fn translate_key(&self, key: u8) -> Option<u8> {
        let mapped = self.key_translation[(key & 0x7F) as usize];
        if (0..=127).contains(&mapped) {
            Some(mapped as u8)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for NoteInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteInput")
            .field("port", &self.port)
            .field("index", &self.index)
            .field("filter", &self.filter)
            .field("mpe_enabled", &self.mpe_enabled)
            .field("mpe_pitch_bend_sensitivity", &self.mpe_pitch_bend_sensitivity)
            .finish()
    }
}

/// All note inputs of one port
pub struct NoteInputs {
    port: PortId,
    router: Arc<dyn NoteRouter>,
    inputs: Vec<NoteInput>,
}

impl NoteInputs {
    /// Create the set with its default input (default filters)
    pub fn new(port: PortId, router: Arc<dyn NoteRouter>) -> Result<Self> {
        Self::with_default::<&str>(port, router, &[])
    }

    /// Create the set with a default input compiled from `patterns`
    pub fn with_default<S: AsRef<str>>(
        port: PortId,
        router: Arc<dyn NoteRouter>,
        patterns: &[S],
    ) -> Result<Self> {
        let mut inputs = Self {
            port,
            router,
            inputs: Vec::new(),
        };
        inputs.create(patterns)?;
        Ok(inputs)
    }

    /// Add a note input with the next index
    pub fn create<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<&mut NoteInput> {
        let index = self.inputs.len();
        let input = NoteInput::new(self.port, index, patterns, self.router.clone())?;
        self.inputs.push(input);
        Ok(&mut self.inputs[index])
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn default_input(&self) -> Option<&NoteInput> {
        self.inputs.first()
    }

    pub fn get(&self, index: usize) -> Option<&NoteInput> {
        self.inputs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut NoteInput> {
        self.inputs.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteInput> {
        self.inputs.iter()
    }

    /// Route a forwarded message through every input that accepts it
    pub fn route(&self, status: u8, data1: u8, data2: u8) -> Vec<(usize, [u8; 3])> {
        self.inputs
            .iter()
            .filter_map(|input| {
                input
                    .translate(status, data1, data2)
                    .map(|msg| (input.index, msg))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Registration {
        Filters(usize, Vec<String>),
        Keys(usize),
        Velocities(usize),
        Mpe(usize, bool, u8),
    }

    #[derive(Default)]
    struct MockRouter {
        calls: Mutex<Vec<Registration>>,
    }

    impl MockRouter {
        fn calls(&self) -> Vec<Registration> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl NoteRouter for MockRouter {
        fn register_note_filters(&self, _port: PortId, index: usize, filters: &[String]) {
            self.calls
                .lock()
                .unwrap()
                .push(Registration::Filters(index, filters.to_vec()));
        }

        fn register_key_translation(&self, _port: PortId, index: usize, _table: &[i32; 128]) {
            self.calls.lock().unwrap().push(Registration::Keys(index));
        }

        fn register_velocity_translation(&self, _port: PortId, index: usize, _table: &[i32; 128]) {
            self.calls.lock().unwrap().push(Registration::Velocities(index));
        }

        fn register_expressive_midi(&self, _port: PortId, index: usize, enabled: bool, range: u8) {
            self.calls
                .lock()
                .unwrap()
                .push(Registration::Mpe(index, enabled, range));
        }
    }

    #[test]
    fn test_default_input_registers_default_filters() {
        let router = Arc::new(MockRouter::default());
        let inputs = NoteInputs::new(PortId(1), router.clone()).unwrap();

        let default = inputs.default_input().unwrap();
        assert!(default.is_default());
        assert_eq!(default.filter().len(), 8);
        assert_eq!(default.mpe_pitch_bend_sensitivity(), 48);
        assert!(!default.mpe_enabled());

        match &router.calls()[0] {
            Registration::Filters(0, filters) => {
                assert_eq!(filters.len(), 8);
                assert!(filters.contains(&"9?".to_string()));
                assert!(filters.contains(&"B?40".to_string()));
            }
            other => panic!("unexpected registration {:?}", other),
        }

        // The router sees the same prefixes the input matches with
        assert!(default.accepts(0x9C, 60, 100));
        assert!(default.filter().matches(0xBC, 0x40, 127));
    }

    #[test]
    fn test_sequential_indices() {
        let router = Arc::new(MockRouter::default());
        let mut inputs = NoteInputs::new(PortId(0), router.clone()).unwrap();
        let second = inputs.create(&["9?????"]).unwrap();
        assert_eq!(second.index(), 1);
        assert!(!second.is_default());
        inputs.create(&["B?40??"]).unwrap();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs.get(2).unwrap().filter().len(), 16);
        assert_eq!(router.calls().len(), 3);
    }

    #[test]
    fn test_invalid_patterns_create_nothing() {
        let router = Arc::new(MockRouter::default());
        let mut inputs = NoteInputs::new(PortId(0), router.clone()).unwrap();
        assert!(inputs.create(&["8???00"]).is_err());
        assert_eq!(inputs.len(), 1);
        assert_eq!(router.calls().len(), 1);
    }

    #[test]
    fn test_setters_reregister() {
        let router = Arc::new(MockRouter::default());
        let mut input = NoteInput::new(PortId(0), 0, &["9?????"], router.clone()).unwrap();
        input.set_key_translation([60; 128]);
        input.set_velocity_translation([100; 128]);
        input.set_mpe(true, 24);

        assert_eq!(
            router.calls()[1..],
            [
                Registration::Keys(0),
                Registration::Velocities(0),
                Registration::Mpe(0, true, 24)
            ]
        );
        assert!(input.mpe_enabled());
    }

    #[test]
    fn test_translate() {
        let router = Arc::new(MockRouter::default());
        let mut input = NoteInput::new(PortId(0), 0, &["9?????", "8?????"], router).unwrap();
        assert_eq!(input.translate(0x92, 60, 100), Some([0x92, 60, 100]));
        assert_eq!(input.translate(0xB0, 7, 100), None);

        let mut keys = identity_table();
        keys[60] = 48;
        keys[61] = -1;
        input.set_key_translation(keys);
        let mut velocities = identity_table();
        velocities[100] = 200;
        input.set_velocity_translation(velocities);

        assert_eq!(input.translate(0x90, 60, 100), Some([0x90, 48, 127]));
        assert_eq!(input.translate(0x80, 60, 0), Some([0x80, 48, 0]));
        assert_eq!(input.translate(0x90, 61, 90), None);
    }

    #[test]
    fn test_route_through_inputs() {
        let router = Arc::new(MockRouter::default());
        let mut inputs = NoteInputs::new(PortId(0), router).unwrap();
        inputs.create(&["9?????"]).unwrap();

        let routed = inputs.route(0x93, 64, 80);
        assert_eq!(routed, vec![(0, [0x93, 64, 80]), (1, [0x93, 64, 80])]);
        assert_eq!(inputs.route(0xB1, 0x40, 127), vec![(0, [0xB1, 0x40, 127])]);
        assert!(inputs.route(0xA0, 60, 10).is_empty());
    }

    #[test]
    fn test_tracing_router_is_usable() {
        let inputs = NoteInputs::new(PortId(3), Arc::new(TracingNoteRouter)).unwrap();
        assert_eq!(inputs.port(), PortId(3));
        assert_eq!(PortId(3).to_string(), "port3");
    }
}
