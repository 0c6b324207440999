// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types for the surface bridge.

use thiserror::Error;

use crate::notes::filter::PatternError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid filter pattern '{pattern}': {reason}")]
    InvalidFilterPattern {
        pattern: String,
        #[source]
        reason: PatternError,
    },

    #[error("MIDI device error: {0}")]
    MidiDevice(String),

    #[error("MIDI port error: {0}")]
    MidiPort(String),

    #[error("MIDI source {0} not found")]
    SourceNotFound(usize),
}

impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::MidiDevice(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
