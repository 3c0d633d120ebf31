use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

use serde::{Deserialize, Serialize};

pub type Tick = u64;
pub type Ticks = u64;

/// Logic level carried by a port.
///
/// `Undefined` is what a latch holds after being driven into its forbidden
/// state. It propagates through gates with three-valued (Kleene) logic, so a
/// gate whose result is decided by its other input still yields `Low`/`High`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "SignalRepr", into = "SignalRepr")]
pub enum Signal {
    #[default]
    Low,
    High,
    Undefined,
}

impl Signal {
    pub fn is_high(self) -> bool {
        self == Signal::High
    }

    pub fn is_defined(self) -> bool {
        self != Signal::Undefined
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Signal::Low => Some(false),
            Signal::High => Some(true),
            Signal::Undefined => None,
        }
    }

    /// Resolves several drivers tied to one input: high if any driver is high.
    pub fn wired_or<I>(signals: I) -> Signal
    where
        I: IntoIterator<Item = Signal>,
    {
        signals
            .into_iter()
            .fold(Signal::Low, |resolved, signal| resolved | signal)
    }
}

impl From<bool> for Signal {
    fn from(value: bool) -> Self {
        if value {
            Signal::High
        } else {
            Signal::Low
        }
    }
}

impl Not for Signal {
    type Output = Signal;

    fn not(self) -> Signal {
        match self {
            Signal::Low => Signal::High,
            Signal::High => Signal::Low,
            Signal::Undefined => Signal::Undefined,
        }
    }
}

impl BitAnd for Signal {
    type Output = Signal;

    fn bitand(self, rhs: Signal) -> Signal {
        match (self, rhs) {
            (Signal::Low, _) | (_, Signal::Low) => Signal::Low,
            (Signal::High, Signal::High) => Signal::High,
            _ => Signal::Undefined,
        }
    }
}

impl BitOr for Signal {
    type Output = Signal;

    fn bitor(self, rhs: Signal) -> Signal {
        match (self, rhs) {
            (Signal::High, _) | (_, Signal::High) => Signal::High,
            (Signal::Low, Signal::Low) => Signal::Low,
            _ => Signal::Undefined,
        }
    }
}

impl BitXor for Signal {
    type Output = Signal;

    fn bitxor(self, rhs: Signal) -> Signal {
        match (self.as_bool(), rhs.as_bool()) {
            (Some(a), Some(b)) => Signal::from(a != b),
            _ => Signal::Undefined,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Low => write!(f, "0"),
            Signal::High => write!(f, "1"),
            Signal::Undefined => write!(f, "X"),
        }
    }
}

// On the wire a signal is `0`, `1` or the string "invalid".
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SignalRepr {
    Bit(u8),
    Marker(String),
}

impl TryFrom<SignalRepr> for Signal {
    type Error = String;

    fn try_from(repr: SignalRepr) -> Result<Self, Self::Error> {
        match repr {
            SignalRepr::Bit(0) => Ok(Signal::Low),
            SignalRepr::Bit(1) => Ok(Signal::High),
            SignalRepr::Marker(marker) if marker == "invalid" => Ok(Signal::Undefined),
            SignalRepr::Bit(bit) => Err(format!("signal bit must be 0 or 1, got {bit}")),
            SignalRepr::Marker(marker) => Err(format!("unknown signal marker {marker:?}")),
        }
    }
}

impl From<Signal> for SignalRepr {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Low => SignalRepr::Bit(0),
            Signal::High => SignalRepr::Bit(1),
            Signal::Undefined => SignalRepr::Marker("invalid".to_string()),
        }
    }
}
