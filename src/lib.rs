pub mod autotest;
pub mod circuit;
pub mod circuit_builder;
pub mod components;
pub mod config;
pub mod document;
pub mod element;
pub mod error;
pub mod level;
pub mod levels;
pub mod modifier;
pub mod naming;
pub mod registry;
pub mod signal;

pub use autotest::{Actual, LevelReport, Mismatch};
pub use circuit::{Circuit, CircuitState, Outputs};
pub use circuit_builder::CircuitBuilder;
pub use components::composite::Composite;
pub use config::{EvalConfig, EvalConfigBuilder, EvalConfigBuilderError};
pub use document::CircuitDocument;
pub use element::{Category, Element, ElementId, PortKind, PortRef, Position};
pub use error::{
    AutoTestError, BuilderError, CircuitError, DocumentError, EvalError, LevelError, Rejected,
};
pub use level::{Expected, Level};
pub use modifier::{DelayModifier, Modifier, SwitchAfterTicksModifier};
pub use registry::Registry;
pub use signal::Signal;
