use std::collections::HashMap;

use crate::circuit::Circuit;
use crate::config::EvalConfig;
use crate::element::{Element, ElementId};
use crate::error::{BuilderError, CircuitError};

const COLUMN_WIDTH: i32 = 12;
const ROW_GAP: i32 = 1;

#[derive(Clone, Copy)]
enum Column {
    Inputs,
    Logic,
    Outputs,
}

/// Lays a circuit out in three columns (inputs, logic, outputs) and wires it
/// by element name, so tests and fixtures never have to pick coordinates.
#[derive(Debug, Default)]
pub struct CircuitBuilder {
    circuit: Circuit,
    names: HashMap<String, ElementId>,
    rows: [i32; 3],
}

impl CircuitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EvalConfig) -> Self {
        CircuitBuilder {
            circuit: Circuit::with_config(config),
            ..Self::default()
        }
    }

    fn place(
        &mut self,
        column: Column,
        name: &str,
        element: Element,
    ) -> Result<ElementId, BuilderError> {
        if self.names.contains_key(name) {
            return Err(CircuitError::NameTaken(name.to_string()).into());
        }
        let index = column as usize;
        let x = index as i32 * COLUMN_WIDTH;
        let y = self.rows[index];
        let height = element.height();
        let id = self.circuit.add_element(element.with_name(name), x, y)?;
        self.rows[index] += height + ROW_GAP;
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn id(&self, name: &str) -> Result<ElementId, BuilderError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| BuilderError::UnknownName(name.to_string()))
    }

    pub fn input(&mut self, name: &str) -> Result<ElementId, BuilderError> {
        self.place(Column::Inputs, name, Element::input())
    }

    /// Places `element` and feeds its inputs, in order, from output 0 of the
    /// named elements.
    pub fn gate(
        &mut self,
        name: &str,
        element: Element,
        inputs: &[&str],
    ) -> Result<ElementId, BuilderError> {
        let id = self.place(Column::Logic, name, element)?;
        for (port, source) in inputs.iter().enumerate() {
            self.connect((*source, 0), (name, port))?;
        }
        Ok(id)
    }

    /// Places an output element driven by output 0 of `source`.
    pub fn output(&mut self, name: &str, source: &str) -> Result<ElementId, BuilderError> {
        self.output_from(name, (source, 0))
    }

    pub fn output_from(
        &mut self,
        name: &str,
        source: (&str, usize),
    ) -> Result<ElementId, BuilderError> {
        let id = self.place(Column::Outputs, name, Element::output())?;
        self.connect(source, (name, 0))?;
        Ok(id)
    }

    pub fn connect(
        &mut self,
        (source, output): (&str, usize),
        (target, input): (&str, usize),
    ) -> Result<&mut Self, BuilderError> {
        let source = self.id(source)?;
        let target = self.id(target)?;
        self.circuit.connect(source, output, target, input)?;
        Ok(self)
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    pub fn build(self) -> Circuit {
        self.circuit
    }
}
