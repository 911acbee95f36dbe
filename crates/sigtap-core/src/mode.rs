//! Runtime processing mode and how MUTE treats the algorithm.

use crate::error::Error;
use core::fmt;
use core::str::FromStr;

/// Runtime switch controlling whether the algorithm touches audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum AlgoMode {
    /// Algorithm is never invoked; audio passes through unchanged.
    Off = 0,
    /// Algorithm processes frames in place.
    #[default]
    On = 1,
    /// Host audio passes through unchanged; see [`MutePolicy`].
    Mute = 2,
}

impl AlgoMode {
    /// Short lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Mute => "mute",
        }
    }
}

impl TryFrom<u8> for AlgoMode {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Off),
            1 => Ok(Self::On),
            2 => Ok(Self::Mute),
            other => Err(Error::invalid_argument(format!("algorithm mode {other}"))),
        }
    }
}

impl FromStr for AlgoMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(Self::Off),
            "on" | "1" => Ok(Self::On),
            "mute" | "2" => Ok(Self::Mute),
            _ => Err(Error::invalid_argument(format!("algorithm mode '{s}'"))),
        }
    }
}

impl fmt::Display for AlgoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a processor does with the algorithm while muted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MutePolicy {
    /// The algorithm is not invoked.
    #[default]
    Bypass,
    /// The algorithm processes a scratch copy of each frame, keeping its
    /// internal state warm. The result is discarded.
    ProcessDiscard,
}
