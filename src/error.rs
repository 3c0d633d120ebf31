use std::io;

use crate::element::{Element, ElementId, PortKind};
use crate::Position;

/// A structural change to a circuit that was refused. The circuit is left
/// untouched whenever one of these is returned.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CircuitError {
    #[error("no element {0:?} in this circuit")]
    UnknownElement(ElementId),
    #[error("element is already placed at {0:?}")]
    AlreadyPlaced(Position),
    #[error("footprint at {0:?} overlaps another element")]
    Overlap(Position),
    #[error("footprint at {0:?} runs off the grid")]
    OutOfBounds(Position),
    #[error("{kind:?} port {port} out of range, element has {count}")]
    PortOutOfRange {
        kind: PortKind,
        port: usize,
        count: usize,
    },
    #[error("connection already exists")]
    DuplicateConnection,
    #[error("name {0:?} is already in use")]
    NameTaken(String),
    #[error("element {0:?} is not an input")]
    NotAnInput(ElementId),
}

/// An element that could not be placed, handed back to the caller.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct Rejected {
    pub element: Element,
    #[source]
    pub error: CircuitError,
}

impl Rejected {
    pub fn into_element(self) -> Element {
        self.element
    }
}

/// A full evaluation that produced no result.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum EvalError {
    #[error("combinational logic did not settle within {iterations} iterations")]
    CombinationalCycle { iterations: usize },
    #[error("sequential elements did not stabilize within {steps} steps")]
    Unstable { steps: usize },
    #[error(transparent)]
    Circuit(#[from] CircuitError),
}

impl EvalError {
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            EvalError::CombinationalCycle { .. } | EvalError::Unstable { .. }
        )
    }
}

/// Why an auto-test could not assess a circuit at all.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum AutoTestError {
    #[error("no level attached to the circuit")]
    NoLevel,
    #[error("level input {0:?} has no matching input element")]
    MissingInput(String),
    #[error("level output {0:?} has no matching output element")]
    MissingOutput(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum LevelError {
    #[error("row {row} has {actual} {side} values, expected {expected}")]
    RowWidth {
        row: usize,
        side: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("input bit must be 0 or 1, got {0}")]
    InvalidBit(u8),
    #[error("duplicate row for inputs {0:?}")]
    DuplicateRow(Vec<bool>),
    #[error("levels support at most {max} inputs, got {actual}")]
    TooManyInputs { max: usize, actual: usize },
}

#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum DocumentError {
    #[error("unknown element type {0:?}")]
    UnknownType(String),
    #[error("unknown modifier {0:?}")]
    UnknownModifier(String),
    #[error("document version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("invalid field {field:?} for {kind}: {reason}")]
    InvalidField {
        kind: String,
        field: &'static str,
        reason: String,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum BuilderError {
    #[error("no element named {0:?} in the builder")]
    UnknownName(String),
    #[error(transparent)]
    Placement(#[from] Rejected),
    #[error(transparent)]
    Circuit(#[from] CircuitError),
}
