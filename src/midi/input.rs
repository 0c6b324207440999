// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI input from hardware controllers.
//!
//! Each opened port owns a [`Dispatcher`] that runs inside the midir callback.
//! Messages the bindings do not swallow are passed to the caller over a
//! channel.

use std::sync::mpsc::{self, Receiver};

use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{debug, info};

use crate::control::{Dispatcher, SharedRegistry};
use crate::error::{Error, Result};

const CLIENT_NAME: &str = "surface-bridge";

/// An open hardware input feeding the binding registry
pub struct MidiInputPort {
    name: String,
    _connection: MidiInputConnection<()>,
    receiver: Receiver<[u8; 3]>,
}

impl MidiInputPort {
    /// Connect to the source at `source_index` (see [`list_sources`])
    pub fn open(source_index: usize, registry: SharedRegistry) -> Result<Self> {
        let mut midi_in = MidiInput::new(CLIENT_NAME)?;
        // System messages never reach the bindings
        midi_in.ignore(Ignore::All);

        let ports = midi_in.ports();
        let port = ports
            .get(source_index)
            .ok_or(Error::SourceNotFound(source_index))?;
        let name = midi_in
            .port_name(port)
            .map_err(|e| Error::MidiPort(e.to_string()))?;

        let (mut dispatcher, receiver) = forwarding_dispatcher(registry);

        let connection = midi_in.connect(
            port,
            "surface-bridge-in",
            move |_timestamp, data, _| {
                dispatcher.handle_bytes(data);
            },
            (),
        )?;

        info!("Opened MIDI input {}: {}", source_index, name);

        Ok(Self {
            name,
            _connection: connection,
            receiver,
        })
    }

    /// Connect to the first source whose name contains `pattern`
    pub fn open_named(pattern: &str, registry: SharedRegistry) -> Result<Self> {
        let index = find_source(pattern)
            .ok_or_else(|| Error::MidiDevice(format!("no input matching '{}'", pattern)))?;
        Self::open(index, registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Try to receive the next forwarded message (non-blocking)
    pub fn try_recv(&self) -> Option<[u8; 3]> {
        self.receiver.try_recv().ok()
    }

    /// Receive all pending forwarded messages
    pub fn recv_all(&self) -> Vec<[u8; 3]> {
        let mut messages = Vec::new();
        while let Some(msg) = self.try_recv() {
            messages.push(msg);
        }
        messages
    }
}

/// Dispatcher whose forwarded messages arrive on the returned receiver
pub fn forwarding_dispatcher(registry: SharedRegistry) -> (Dispatcher, Receiver<[u8; 3]>) {
    let (tx, rx) = mpsc::channel();
    let dispatcher = Dispatcher::new(registry).with_forward(move |status, data1, data2| {
        // Receiver gone means the port is closing
        let _ = tx.send([status, data1, data2]);
    });
    (dispatcher, rx)
}

/// List all available MIDI sources
pub fn list_sources() -> Vec<(usize, String)> {
    let midi_in = match MidiInput::new(CLIENT_NAME) {
        Ok(midi_in) => midi_in,
        Err(e) => {
            debug!("MIDI unavailable: {}", e);
            return Vec::new();
        }
    };

    midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(i, port)| {
            let name = midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown {}", i));
            (i, name)
        })
        .collect()
}

/// Index of the first source whose name contains `pattern` (case-insensitive)
pub fn find_source(pattern: &str) -> Option<usize> {
    let pattern = pattern.to_lowercase();
    list_sources()
        .into_iter()
        .find(|(_, name)| name.to_lowercase().contains(&pattern))
        .map(|(i, _)| i)
}

/// Print all available MIDI sources to stdout
pub fn print_sources() {
    let sources = list_sources();
    if sources.is_empty() {
        println!("No MIDI sources found.");
    } else {
        println!("Available MIDI sources (inputs):");
        for (i, name) in sources {
            println!("  {}: {}", i, name);
        }
    }
}
