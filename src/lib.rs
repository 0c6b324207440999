// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Bridge between MIDI hardware controllers and logical surface controls.
//!
//! Raw messages from a controller are matched against a [`control::BindingRegistry`]
//! by a [`control::Dispatcher`], which reconstructs 14-bit values, decodes
//! relative encoders and fires the bound buttons, faders, knobs and touch
//! sensors. Messages a binding does not swallow are forwarded and filtered by
//! the port's [`notes::NoteInputs`].

pub mod config;
pub mod control;
pub mod error;
pub mod midi;
pub mod notes;

pub use error::{Error, Result};
