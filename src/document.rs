//! Serialized form of a circuit.
//!
//! ```json
//! {
//!   "version": 1,
//!   "elements": [
//!     {"type": "And", "name": "And", "position": [10, 0],
//!      "input_names": ["", ""], "output_names": [""],
//!      "modifiers": [{"name": "Delay", "data": {"delay_ticks": 2}}]}
//!   ],
//!   "connections": [{"source": [0, 0], "target": [1, 1]}]
//! }
//! ```
//!
//! Connections refer to elements by their index in `elements`. Composite
//! elements carry their whole sub-circuit under `subgrid`, so a document
//! never depends on which composite types happen to be registered.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::circuit::Circuit;
use crate::element::{Element, ElementId, ElementKind, Position};
use crate::error::DocumentError;
use crate::registry::Registry;

pub const FORMAT_VERSION: u32 = 1;

fn format_version() -> u32 {
    FORMAT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitDocument {
    #[serde(default = "format_version")]
    pub version: u32,
    #[serde(default)]
    pub elements: Vec<ElementRecord>,
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub input_names: Vec<String>,
    #[serde(default)]
    pub output_names: Vec<String>,
    /// Replaces the element's default modifiers when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<Vec<ModifierRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgrid: Option<Box<CircuitDocument>>,
    /// Type-specific fields, such as a latch's `state`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierRecord {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

/// `(element index, port)` pairs, output side first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub source: (usize, usize),
    pub target: (usize, usize),
}

impl Default for CircuitDocument {
    fn default() -> Self {
        CircuitDocument {
            version: FORMAT_VERSION,
            elements: Vec::new(),
            connections: Vec::new(),
        }
    }
}

impl CircuitDocument {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl ElementRecord {
    /// A record carrying nothing but a type tag.
    pub fn new(kind: impl Into<String>) -> Self {
        ElementRecord {
            kind: kind.into(),
            name: None,
            position: None,
            input_names: Vec::new(),
            output_names: Vec::new(),
            modifiers: None,
            subgrid: None,
            extra: Map::new(),
        }
    }
}

impl Element {
    pub fn to_record(&self) -> ElementRecord {
        let mut record = ElementRecord::new(self.kind().tag());
        record.name = Some(self.name().to_string());
        record.position = self.position();
        record.input_names = self.input_names().to_vec();
        record.output_names = self.output_names().to_vec();
        record.modifiers = Some(
            self.modifiers()
                .iter()
                .map(|modifier| ModifierRecord {
                    name: modifier.name().to_string(),
                    data: modifier.to_data(),
                })
                .collect(),
        );
        match self.kind() {
            ElementKind::Latch(latch) => {
                record
                    .extra
                    .insert("state".to_string(), serde_json::json!(latch.state()));
            }
            ElementKind::Composite(composite) => {
                record.subgrid = Some(Box::new(composite.circuit().to_document()));
            }
            _ => (),
        }
        record
    }
}

impl Circuit {
    pub fn to_document(&self) -> CircuitDocument {
        let index: HashMap<ElementId, usize> = self
            .elements()
            .enumerate()
            .map(|(index, (id, _))| (id, index))
            .collect();

        let elements = self.elements().map(|(_, element)| element.to_record()).collect();
        let connections = self
            .elements()
            .flat_map(|(id, element)| {
                (0..element.num_outputs()).flat_map(move |port| {
                    element
                        .output_connections(port)
                        .iter()
                        .map(move |target| (id, port, *target))
                })
            })
            .filter_map(|(id, port, target)| {
                Some(ConnectionRecord {
                    source: (*index.get(&id)?, port),
                    target: (*index.get(&target.element)?, target.port),
                })
            })
            .collect();

        CircuitDocument {
            version: FORMAT_VERSION,
            elements,
            connections,
        }
    }

    /// Rebuilds a circuit, elements in document order, then every connection.
    ///
    /// An element that cannot be built or placed is skipped with a warning,
    /// together with the connections touching it; compare the element count
    /// against the document to detect a partial load. Only whole-document
    /// problems are errors.
    pub fn from_document(
        document: &CircuitDocument,
        registry: &Registry,
    ) -> Result<Circuit, DocumentError> {
        if document.version > FORMAT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: document.version,
                supported: FORMAT_VERSION,
            });
        }

        let mut circuit = Circuit::with_config(*registry.config());
        let mut ids = Vec::with_capacity(document.elements.len());
        for (index, record) in document.elements.iter().enumerate() {
            let element = match registry.build_element(record) {
                Ok(element) => element,
                Err(err) => {
                    warn!(index, kind = %record.kind, %err, "skipping element");
                    ids.push(None);
                    continue;
                }
            };
            let (x, y) = record.position.unwrap_or_else(|| circuit.next_free_row());
            match circuit.add_element(element, x, y) {
                Ok(id) => ids.push(Some(id)),
                Err(rejected) => {
                    warn!(
                        index,
                        kind = %record.kind,
                        err = %rejected,
                        "skipping unplaceable element"
                    );
                    ids.push(None);
                }
            }
        }

        let lookup = |index: usize| ids.get(index).copied().flatten();
        for connection in &document.connections {
            let (source, output) = connection.source;
            let (target, input) = connection.target;
            let (source_id, target_id) = match (lookup(source), lookup(target)) {
                (Some(source_id), Some(target_id)) => (source_id, target_id),
                _ => {
                    warn!(?connection, "skipping connection to a missing element");
                    continue;
                }
            };
            if let Err(err) = circuit.connect(source_id, output, target_id, input) {
                warn!(?connection, %err, "skipping connection");
            }
        }

        debug!(
            elements = circuit.len(),
            listed = document.elements.len(),
            "loaded circuit"
        );
        Ok(circuit)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn from_json(json: &str, registry: &Registry) -> Result<Circuit, DocumentError> {
        let document: CircuitDocument = serde_json::from_str(json)?;
        Self::from_document(&document, registry)
    }

    /// Top-left cell of an empty row below everything placed so far.
    pub(crate) fn next_free_row(&self) -> Position {
        let bottom = self
            .elements()
            .filter_map(|(_, element)| element.position().map(|(_, y)| y + element.height()))
            .max()
            .unwrap_or(0);
        (0, bottom)
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{CircuitDocument, ConnectionRecord};
    use crate::circuit::Circuit;
    use crate::element::Element;
    use crate::error::DocumentError;
    use crate::modifier::DelayModifier;
    use crate::registry::Registry;
    use crate::signal::Signal::*;

    #[test]
    fn record_shape() {
        let mut circuit = Circuit::new();
        let a = circuit.add_element(Element::input().with_name("A"), 0, 0).unwrap();
        let or = circuit.add_element(Element::or(), 10, 0).unwrap();
        circuit.connect(a, 0, or, 1).unwrap();
        circuit.add_modifier(or, Box::new(DelayModifier::new(2))).unwrap();

        let value = serde_json::to_value(circuit.to_document()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["elements"][0]["type"], "Input");
        assert_eq!(value["elements"][1]["position"], json!([10, 0]));
        assert_eq!(
            value["elements"][1]["modifiers"],
            json!([{"name": "Delay", "data": {"delay_ticks": 2}}])
        );
        assert_eq!(value["connections"], json!([{"source": [0, 0], "target": [1, 1]}]));
    }

    #[test]
    fn latch_state_survives() {
        let registry = Registry::with_builtins();
        let mut circuit = Circuit::new();
        let d = circuit.add_element(Element::input(), 0, 0).unwrap();
        let clk = circuit.add_element(Element::input(), 0, 4).unwrap();
        let latch = circuit.add_element(Element::d_latch(), 10, 0).unwrap();
        circuit.connect(d, 0, latch, 0).unwrap();
        circuit.connect(clk, 0, latch, 1).unwrap();
        circuit.set_input(d, High).unwrap();
        circuit.set_input(clk, High).unwrap();
        circuit.tick_once();

        let json = circuit.to_json().unwrap();
        let loaded = Circuit::from_json(&json, &registry).unwrap();
        let (_, element) = loaded.elements().nth(2).unwrap();
        assert_eq!(element.name(), "DLatch");
        assert_eq!(element.values(), [High, Low]);
        assert_eq!(loaded.to_document(), circuit.to_document());
    }

    #[test]
    fn partial_load_skips_unknown() {
        let registry = Registry::with_builtins();
        let document: CircuitDocument = serde_json::from_value(json!({
            "elements": [
                {"type": "Input", "name": "A", "position": [0, 0]},
                {"type": "Flux", "name": "F", "position": [10, 0]},
                {"type": "Output", "name": "Z", "position": [20, 0]}
            ],
            "connections": [
                {"source": [0, 0], "target": [1, 0]},
                {"source": [1, 0], "target": [2, 0]},
                {"source": [0, 0], "target": [2, 0]},
                {"source": [0, 3], "target": [2, 0]}
            ]
        }))
        .unwrap();
        assert_eq!(document.version, 1);

        let circuit = Circuit::from_document(&document, &registry).unwrap();
        assert_eq!(circuit.len(), 2);
        assert_eq!(
            circuit.to_document().connections,
            [ConnectionRecord {
                source: (0, 0),
                target: (1, 0)
            }]
        );
    }

    #[test]
    fn unplaced_records_stack_up() {
        let registry = Registry::with_builtins();
        let circuit = Circuit::from_json(
            r#"{"elements": [{"type": "And"}, {"type": "And"}, {"type": "Input"}]}"#,
            &registry,
        )
        .unwrap();
        let positions: Vec<_> = circuit.elements().map(|(_, e)| e.position()).collect();
        assert_eq!(positions, [Some((0, 0)), Some((0, 4)), Some((0, 8))]);
        assert_eq!(circuit.names().len(), 3);
    }

    #[test]
    fn newer_versions_are_rejected() {
        let registry = Registry::with_builtins();
        let err = Circuit::from_json(r#"{"version": 2, "elements": []}"#, &registry).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::UnsupportedVersion {
                found: 2,
                supported: 1
            }
        ));
        assert!(matches!(
            Circuit::from_json("{", &registry),
            Err(DocumentError::Json(_))
        ));
    }
}
