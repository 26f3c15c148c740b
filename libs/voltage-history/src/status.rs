//! Protocol status codes
//!
//! A status code is a 32-bit value whose two top bits carry the severity
//! class (`00` Good, `01` Uncertain, `10` Bad). The remaining bits identify
//! the specific condition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity class of a status code, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatusSeverity {
    Good,
    Uncertain,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u32);

const SEVERITY_MASK: u32 = 0xC000_0000;
const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;

impl StatusCode {
    pub const GOOD: Self = Self(0x0000_0000);
    pub const GOOD_MORE_DATA: Self = Self(0x00A6_0000);
    pub const GOOD_NO_DATA: Self = Self(0x00A5_0000);
    pub const UNCERTAIN: Self = Self(0x4000_0000);
    pub const UNCERTAIN_LAST_USABLE_VALUE: Self = Self(0x4090_0000);
    pub const BAD: Self = Self(0x8000_0000);
    pub const BAD_INTERNAL_ERROR: Self = Self(0x8002_0000);
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    pub const BAD_CONTINUATION_POINT_INVALID: Self = Self(0x804A_0000);
    pub const BAD_NO_CONTINUATION_POINTS: Self = Self(0x804B_0000);
    pub const BAD_HISTORY_OPERATION_INVALID: Self = Self(0x8071_0000);
    pub const BAD_HISTORY_OPERATION_UNSUPPORTED: Self = Self(0x8072_0000);
    pub const BAD_SENSOR_FAILURE: Self = Self(0x808B_0000);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn severity(self) -> StatusSeverity {
        match self.0 & SEVERITY_MASK {
            0 => StatusSeverity::Good,
            SEVERITY_UNCERTAIN => StatusSeverity::Uncertain,
            // 0xC0000000 is reserved and treated as Bad
            _ => StatusSeverity::Bad,
        }
    }

    pub fn is_good(self) -> bool {
        self.severity() == StatusSeverity::Good
    }

    pub fn is_uncertain(self) -> bool {
        self.severity() == StatusSeverity::Uncertain
    }

    pub fn is_bad(self) -> bool {
        self.severity() == StatusSeverity::Bad
    }

    /// Symbolic name for the codes this crate issues
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::GOOD => "Good",
            Self::GOOD_MORE_DATA => "GoodMoreData",
            Self::GOOD_NO_DATA => "GoodNoData",
            Self::UNCERTAIN => "Uncertain",
            Self::UNCERTAIN_LAST_USABLE_VALUE => "UncertainLastUsableValue",
            Self::BAD => "Bad",
            Self::BAD_INTERNAL_ERROR => "BadInternalError",
            Self::BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
            Self::BAD_CONTINUATION_POINT_INVALID => "BadContinuationPointInvalid",
            Self::BAD_NO_CONTINUATION_POINTS => "BadNoContinuationPoints",
            Self::BAD_HISTORY_OPERATION_INVALID => "BadHistoryOperationInvalid",
            Self::BAD_HISTORY_OPERATION_UNSUPPORTED => "BadHistoryOperationUnsupported",
            Self::BAD_SENSOR_FAILURE => "BadSensorFailure",
            _ => return None,
        };
        Some(name)
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::GOOD
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}
