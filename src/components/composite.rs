use tracing::trace;

use crate::circuit::Circuit;
use crate::document::CircuitDocument;
use crate::element::{input, ElementId};
use crate::error::DocumentError;
use crate::registry::Registry;
use crate::signal::Signal;

/// An element evaluated by an embedded sub-circuit.
///
/// External ports map onto the sub-circuit's input and output elements
/// sorted by their row, ties kept in insertion order, so the same document
/// always produces the same port order.
#[derive(Debug, Clone)]
pub struct Composite {
    type_name: String,
    circuit: Circuit,
    inputs: Vec<ElementId>,
    outputs: Vec<ElementId>,
    sync: bool,
}

fn sorted_by_row(circuit: &Circuit, mut ids: Vec<ElementId>) -> Vec<ElementId> {
    ids.sort_by_key(|id| {
        circuit
            .element(*id)
            .and_then(|element| element.position())
            .map(|(_, y)| y)
    });
    ids
}

impl Composite {
    pub fn new(type_name: impl Into<String>, circuit: Circuit) -> Self {
        let inputs = sorted_by_row(&circuit, circuit.inputs());
        let outputs = sorted_by_row(&circuit, circuit.outputs());
        let sync = circuit.elements().any(|(_, element)| element.is_sync());
        Composite {
            type_name: type_name.into(),
            circuit,
            inputs,
            outputs,
            sync,
        }
    }

    pub fn from_document(
        type_name: impl Into<String>,
        document: &CircuitDocument,
        registry: &Registry,
    ) -> Result<Self, DocumentError> {
        let circuit = Circuit::from_document(document, registry)?;
        Ok(Self::new(type_name, circuit))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub(crate) fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    pub fn is_sync(&self) -> bool {
        self.sync
    }

    pub fn input_names(&self) -> Vec<String> {
        self.port_names(&self.inputs)
    }

    pub fn output_names(&self) -> Vec<String> {
        self.port_names(&self.outputs)
    }

    fn port_names(&self, ids: &[ElementId]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.circuit.element(*id))
            .map(|element| element.name().to_string())
            .collect()
    }

    fn load_inputs(&mut self, inputs: &[Signal]) {
        for (port, id) in self.inputs.iter().enumerate() {
            let _ = self.circuit.set_input(*id, input(inputs, port));
        }
    }

    fn collect_outputs(&self) -> Vec<Signal> {
        self.outputs
            .iter()
            .map(|id| self.circuit.input_signal(*id, 0))
            .collect()
    }

    /// Combinational path: runs the sub-circuit towards a fixed point and
    /// reports whatever its outputs show afterwards, settled or not.
    pub(crate) fn settle(&mut self, inputs: &[Signal]) -> Vec<Signal> {
        self.load_inputs(inputs);
        let limit = self.circuit.config().composite_iterations();
        if let Err(err) = self.circuit.settle(limit) {
            trace!(composite = %self.type_name, %err, "sub-circuit did not settle");
        }
        self.collect_outputs()
    }

    /// Sync path, first half of a sub-circuit tick.
    pub(crate) fn stage(&mut self, inputs: &[Signal]) {
        self.load_inputs(inputs);
        self.circuit.combinational_pass();
        self.circuit.stage_sync();
    }

    /// Sync path, second half of a sub-circuit tick.
    pub(crate) fn commit(&mut self) -> Vec<Signal> {
        self.circuit.commit_sync();
        self.collect_outputs()
    }
}
