// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Note input filter compiler.
//!
//! A pattern is six characters, hex digits or `?`, read as three byte
//! groups: status, data1, data2. `?` wildcards one nibble. The compiler turns
//! patterns into the hex prefixes the note router matches messages against:
//!
//! - `"B?07??"` becomes `B007`, `B107`, ... `BF07` (16 entries)
//! - `"90????"` becomes `90`
//! - `"E?????"` becomes `E0` ... `EF`
//!
//! A `?` left inside a prefix matches any nibble. The default set uses it for
//! the channel nibble, so `8?` accepts note off on every channel.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::error::{Error, Result};

/// Why a pattern was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("expected 6 characters, found {0}")]
    WrongLength(usize),

    #[error("'{0}' is neither a hex digit nor '?'")]
    InvalidCharacter(char),

    #[error("status byte is fully wildcarded")]
    EmptyStatus,

    #[error("only the channel nibble of the status byte may be wildcarded")]
    WildcardCommand,

    #[error("data2 is specified while data1 is wildcarded")]
    Data2WithoutData1,

    #[error("data bytes must be fully specified or fully wildcarded")]
    PartialDataWildcard,
}

/// Patterns used when a note input declares none
pub const DEFAULT_FILTERS: [&str; 8] = [
    "8?",   // Note off
    "9?",   // Note on
    "B?01", // Modulation wheel
    "B?0B", // Expression
    "B?40", // Sustain pedal
    "E?",   // Pitch bend
    "C?",   // Program change
    "D?",   // Channel pressure
];

/// Compiled hex-prefix set of one note input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    prefixes: BTreeSet<String>,
}

impl CompiledFilter {
    /// The built-in set, accepting its messages on every channel
    pub fn default_set() -> Self {
        Self {
            prefixes: DEFAULT_FILTERS.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn prefixes(&self) -> &BTreeSet<String> {
        &self.prefixes
    }

    /// Prefixes in the form handed to the note router
    pub fn to_vec(&self) -> Vec<String> {
        self.prefixes.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Check whether a message starts with one of the prefixes
    pub fn matches(&self, status: u8, data1: u8, data2: u8) -> bool {
        let hex = format!("{:02X}{:02X}{:02X}", status, data1, data2);
        self.prefixes
            .iter()
            .any(|prefix| prefix_matches(prefix, &hex))
    }
}

fn prefix_matches(prefix: &str, hex: &str) -> bool {
    prefix.len() <= hex.len()
        && prefix
            .bytes()
            .zip(hex.bytes())
            .all(|(p, h)| p == b'?' || p == h)
}

/// Compile patterns; an empty list yields the default set.
///
/// Any invalid pattern fails the whole compilation.
pub fn compile_filters<S: AsRef<str>>(patterns: &[S]) -> Result<CompiledFilter> {
    if patterns.is_empty() {
        return Ok(CompiledFilter::default_set());
    }

    let mut prefixes = BTreeSet::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        compile_pattern(pattern, &mut prefixes).map_err(|reason| Error::InvalidFilterPattern {
            pattern: pattern.to_string(),
            reason,
        })?;
    }

    Ok(CompiledFilter { prefixes })
}

fn compile_pattern(
    pattern: &str,
    out: &mut BTreeSet<String>,
) -> std::result::Result<(), PatternError> {
    let chars: Vec<char> = pattern.chars().collect();
    if chars.len() != 6 {
        return Err(PatternError::WrongLength(chars.len()));
    }
    if let Some(bad) = chars.iter().find(|c| **c != '?' && !c.is_ascii_hexdigit()) {
        return Err(PatternError::InvalidCharacter(*bad));
    }

    let group = |i: usize| -> String {
        chars[i..i + 2]
            .iter()
            .filter(|c| **c != '?')
            .map(|c| c.to_ascii_uppercase())
            .collect()
    };
    let status = group(0);
    let data1 = group(2);
    let data2 = group(4);

    if status.is_empty() {
        return Err(PatternError::EmptyStatus);
    }
    if chars[0] == '?' {
        return Err(PatternError::WildcardCommand);
    }
    if data1.is_empty() && !data2.is_empty() {
        return Err(PatternError::Data2WithoutData1);
    }
    if data1.len() == 1 || data2.len() == 1 {
        return Err(PatternError::PartialDataWildcard);
    }

    let statuses: Vec<String> = if status.len() == 1 {
        (0..16).map(|ch| format!("{}{:X}", status, ch)).collect()
    } else {
        vec![status]
    };

    for status in statuses {
        out.insert(format!("{}{}{}", status, data1, data2));
    }
    Ok(())
}
