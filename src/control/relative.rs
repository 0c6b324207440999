// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Relative encoder value codecs.
//!
//! Endless encoders send a signed increment packed into a 7-bit CC value.
//! Hardware vendors disagree on the packing, so four schemes are supported.
//! Each bound knob owns its own [`RelativeCodec`], so adjusting the
//! sensitivity of one knob never changes how another knob decodes.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Largest raw 7-bit value.
pub const MAX_RAW: u8 = 127;

/// Relative increment packing scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeEncoding {
    /// 1..63 = increment, 64..127 = -64..-1
    TwosComplement,
    /// 64 = no change, above = increment, below = decrement
    OffsetBinary,
    /// Bit 6 set means negative: 1..63 = increment, 65..127 = -1..-63
    SignedBit,
    /// Bit 6 set means positive: 65..127 = increment, 1..63 = -1..-63
    SignedBit2,
}

impl Default for RelativeEncoding {
    fn default() -> Self {
        RelativeEncoding::TwosComplement
    }
}

impl RelativeEncoding {
    pub const ALL: [RelativeEncoding; 4] = [
        RelativeEncoding::TwosComplement,
        RelativeEncoding::OffsetBinary,
        RelativeEncoding::SignedBit,
        RelativeEncoding::SignedBit2,
    ];

    /// Deltas that survive an encode/decode round trip
    pub fn delta_range(self) -> RangeInclusive<i32> {
        match self {
            RelativeEncoding::TwosComplement | RelativeEncoding::OffsetBinary => -64..=63,
            RelativeEncoding::SignedBit | RelativeEncoding::SignedBit2 => -63..=63,
        }
    }

    /// Raw value meaning "no change"
    pub fn neutral(self) -> u8 {
        self.encode_raw(0)
    }

    /// Decode a raw CC value into an unscaled increment.
    ///
    /// Values above 127 are clamped to 127 rather than rejected.
    pub fn decode_raw(self, raw: u8) -> i32 {
        let raw = raw.min(MAX_RAW) as i32;
        match self {
            RelativeEncoding::TwosComplement => {
                if raw < 64 {
                    raw
                } else {
                    raw - 128
                }
            }
            RelativeEncoding::OffsetBinary => raw - 64,
            RelativeEncoding::SignedBit => {
                if raw < 64 {
                    raw
                } else {
                    -(raw - 64)
                }
            }
            RelativeEncoding::SignedBit2 => {
                if raw < 64 {
                    -raw
                } else {
                    raw - 64
                }
            }
        }
    }

    /// Encode an unscaled increment, clamping it into [`delta_range`](Self::delta_range)
    pub fn encode_raw(self, delta: i32) -> u8 {
        let range = self.delta_range();
        let delta = delta.clamp(*range.start(), *range.end());
        let raw = match self {
            RelativeEncoding::TwosComplement => {
                if delta >= 0 {
                    delta
                } else {
                    delta + 128
                }
            }
            RelativeEncoding::OffsetBinary => delta + 64,
            RelativeEncoding::SignedBit => {
                if delta >= 0 {
                    delta
                } else {
                    64 - delta
                }
            }
            RelativeEncoding::SignedBit2 => {
                if delta >= 0 {
                    64 + delta
                } else {
                    -delta
                }
            }
        };
        raw as u8
    }
}

/// An encoding scheme plus the sensitivity of one knob
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeCodec {
    encoding: RelativeEncoding,
    sensitivity: f64,
}

impl RelativeCodec {
    /// Create a codec with unit sensitivity
    pub fn new(encoding: RelativeEncoding) -> Self {
        Self {
            encoding,
            sensitivity: 1.0,
        }
    }

    /// Create a codec with the given sensitivity
    pub fn with_sensitivity(encoding: RelativeEncoding, sensitivity: f64) -> Self {
        let mut codec = Self::new(encoding);
        codec.set_sensitivity(sensitivity);
        codec
    }

    pub fn encoding(&self) -> RelativeEncoding {
        self.encoding
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    /// Set the multiplier applied to decoded increments.
    ///
    /// Non-finite or non-positive factors are ignored.
    pub fn set_sensitivity(&mut self, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            warn!("Ignoring invalid encoder sensitivity {}", factor);
            return;
        }
        self.sensitivity = factor;
    }

    /// Decode a raw CC value into a scaled increment
    pub fn decode(&self, raw: u8) -> f64 {
        self.encoding.decode_raw(raw) as f64 * self.sensitivity
    }

    /// Encode a scaled increment into the raw value a controller would send
    pub fn encode(&self, delta: f64) -> u8 {
        let steps = (delta / self.sensitivity).round();
        // Saturating float-to-int cast, then clamped by encode_raw
        self.encoding.encode_raw(steps as i32)
    }
}

impl Default for RelativeCodec {
    fn default() -> Self {
        Self::new(RelativeEncoding::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_schemes() {
        for encoding in RelativeEncoding::ALL {
            let codec = RelativeCodec::new(encoding);
            for delta in encoding.delta_range() {
                let raw = codec.encode(delta as f64);
                assert!(raw <= MAX_RAW, "{:?} encoded {} to {}", encoding, delta, raw);
                assert_eq!(codec.decode(raw), delta as f64, "{:?} delta {}", encoding, delta);
            }
        }
    }

    #[test]
    fn test_neutral_values() {
        assert_eq!(RelativeEncoding::TwosComplement.neutral(), 0);
        assert_eq!(RelativeEncoding::OffsetBinary.neutral(), 64);
        assert_eq!(RelativeEncoding::SignedBit.neutral(), 0);
        assert_eq!(RelativeEncoding::SignedBit2.neutral(), 64);
        for encoding in RelativeEncoding::ALL {
            assert_eq!(encoding.decode_raw(encoding.neutral()), 0);
        }
    }

    #[test]
    fn test_known_raw_values() {
        assert_eq!(RelativeEncoding::TwosComplement.decode_raw(1), 1);
        assert_eq!(RelativeEncoding::TwosComplement.decode_raw(127), -1);
        assert_eq!(RelativeEncoding::OffsetBinary.decode_raw(65), 1);
        assert_eq!(RelativeEncoding::OffsetBinary.decode_raw(63), -1);
        assert_eq!(RelativeEncoding::SignedBit.decode_raw(65), -1);
        assert_eq!(RelativeEncoding::SignedBit.decode_raw(3), 3);
        assert_eq!(RelativeEncoding::SignedBit2.decode_raw(65), 1);
        assert_eq!(RelativeEncoding::SignedBit2.decode_raw(3), -3);
    }

    #[test]
    fn test_pathological_raw_is_clamped() {
        for encoding in RelativeEncoding::ALL {
            assert_eq!(encoding.decode_raw(200), encoding.decode_raw(MAX_RAW));
        }
    }

    #[test]
    fn test_encode_clamps_out_of_range_delta() {
        let codec = RelativeCodec::new(RelativeEncoding::SignedBit);
        assert_eq!(codec.decode(codec.encode(500.0)), 63.0);
        assert_eq!(codec.decode(codec.encode(-500.0)), -63.0);
    }

    #[test]
    fn test_sensitivity_scales_deltas() {
        let codec = RelativeCodec::with_sensitivity(RelativeEncoding::OffsetBinary, 0.5);
        assert_eq!(codec.decode(66), 1.0);
        assert_eq!(codec.decode(62), -1.0);
        assert_eq!(codec.encode(1.0), 66);
        assert_eq!(codec.decode(codec.encode(-3.5)), -3.5);
    }

    #[test]
    fn test_sensitivity_is_per_instance() {
        let mut fast = RelativeCodec::new(RelativeEncoding::TwosComplement);
        let slow = RelativeCodec::new(RelativeEncoding::TwosComplement);
        fast.set_sensitivity(4.0);
        assert_eq!(fast.decode(1), 4.0);
        assert_eq!(slow.decode(1), 1.0);
    }

    #[test]
    fn test_invalid_sensitivity_ignored() {
        let mut codec = RelativeCodec::with_sensitivity(RelativeEncoding::SignedBit2, 2.0);
        codec.set_sensitivity(0.0);
        codec.set_sensitivity(-1.0);
        codec.set_sensitivity(f64::NAN);
        assert_eq!(codec.sensitivity(), 2.0);
    }
}
