use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::EvalConfig;
use crate::element::{Element, ElementId, ElementState, PortKind, PortRef, Position};
use crate::error::{CircuitError, EvalError, Rejected};
use crate::level::Level;
use crate::modifier::Modifier;
use crate::naming::NameRegistry;
use crate::signal::Signal;

/// Values shown by every output element after a full evaluation.
pub type Outputs = BTreeMap<ElementId, Signal>;

/// A placement grid that owns its elements and the connections between them.
///
/// Elements live in an arena keyed by [`ElementId`]; ids are handed out in
/// increasing order and iteration follows that order, which keeps every pass
/// over the circuit deterministic.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    elements: BTreeMap<ElementId, Element>,
    next_id: usize,
    names: NameRegistry,
    level: Option<Arc<Level>>,
    config: EvalConfig,
}

/// Snapshot of everything evaluation can change, taken by
/// [`Circuit::save_state`].
#[derive(Debug, Clone)]
pub struct CircuitState(Vec<(ElementId, ElementState)>);

/// Spans are compared in `i64` so that footprints touching the edge of the
/// grid cannot overflow.
fn spans_overlap(a: i32, a_len: i32, b: i32, b_len: i32) -> bool {
    let (a, b) = (i64::from(a), i64::from(b));
    a < b + i64::from(b_len) && b < a + i64::from(a_len)
}

fn footprints_overlap(a: &Element, (ax, ay): Position, b: &Element, (bx, by): Position) -> bool {
    spans_overlap(ax, a.width(), bx, b.width()) && spans_overlap(ay, a.height(), by, b.height())
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EvalConfig) -> Self {
        Circuit {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EvalConfig) {
        self.config = config;
    }

    pub fn level(&self) -> Option<&Level> {
        self.level.as_deref()
    }

    pub(crate) fn shared_level(&self) -> Option<Arc<Level>> {
        self.level.clone()
    }

    pub fn set_level(&mut self, level: Arc<Level>) {
        self.level = Some(level);
    }

    pub fn clear_level(&mut self) -> Option<Arc<Level>> {
        self.level.take()
    }

    fn get(&self, id: ElementId) -> Result<&Element, CircuitError> {
        self.elements.get(&id).ok_or(CircuitError::UnknownElement(id))
    }

    fn get_mut(&mut self, id: ElementId) -> Result<&mut Element, CircuitError> {
        self.elements
            .get_mut(&id)
            .ok_or(CircuitError::UnknownElement(id))
    }

    fn overlaps(&self, element: &Element, position: Position, skip: Option<ElementId>) -> bool {
        self.elements
            .iter()
            .filter(|(id, _)| Some(**id) != skip)
            .filter_map(|(_, other)| other.position().map(|at| (other, at)))
            .any(|(other, at)| footprints_overlap(element, position, other, at))
    }

    /// Places `element` with its top-left cell at `(x, y)`.
    ///
    /// The element keeps its name when that name is free and otherwise gets
    /// the next `"name N"`. On failure the element is handed back untouched.
    pub fn add_element(
        &mut self,
        mut element: Element,
        x: i32,
        y: i32,
    ) -> Result<ElementId, Rejected> {
        let error = match element.position() {
            Some(position) => Some(CircuitError::AlreadyPlaced(position)),
            None if element.far_corner((x, y)).is_none() => Some(CircuitError::OutOfBounds((x, y))),
            None if self.overlaps(&element, (x, y), None) => Some(CircuitError::Overlap((x, y))),
            None => None,
        };
        if let Some(error) = error {
            return Err(Rejected { element, error });
        }

        // Handles only mean something inside the circuit that issued them.
        element.inputs.iter_mut().for_each(Vec::clear);
        element.outputs.iter_mut().for_each(Vec::clear);

        let name = self.names.generate_unique_name(element.name());
        element.set_name(name);
        element.set_position(Some((x, y)));

        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.insert(id, element);
        Ok(id)
    }

    /// Moves a placed element. Its own current footprint never counts as a
    /// conflict.
    pub fn move_element(&mut self, id: ElementId, x: i32, y: i32) -> Result<(), CircuitError> {
        let element = self.get(id)?;
        if element.far_corner((x, y)).is_none() {
            return Err(CircuitError::OutOfBounds((x, y)));
        }
        if self.overlaps(element, (x, y), Some(id)) {
            return Err(CircuitError::Overlap((x, y)));
        }
        self.get_mut(id)?.set_position(Some((x, y)));
        Ok(())
    }

    /// Takes an element out of the circuit and hands it back unplaced.
    ///
    /// Connections are left alone: call [`Circuit::disconnect_all`] first for
    /// a clean removal. Edges still pointing at the removed id are ignored.
    pub fn remove_element(&mut self, id: ElementId) -> Result<Element, CircuitError> {
        let mut element = self
            .elements
            .remove(&id)
            .ok_or(CircuitError::UnknownElement(id))?;
        self.names.release_name(element.name());
        element.set_position(None);
        Ok(element)
    }

    pub fn rename_element(&mut self, id: ElementId, name: &str) -> Result<(), CircuitError> {
        let current = self.get(id)?.name().to_string();
        if current == name {
            return Ok(());
        }
        if !self.names.reserve(name) {
            return Err(CircuitError::NameTaken(name.to_string()));
        }
        self.names.release_name(&current);
        self.get_mut(id)?.set_name(name.to_string());
        Ok(())
    }

    /// Reserves a name derived from `base` in this circuit.
    pub fn generate_unique_name(&mut self, base: &str) -> String {
        self.names.generate_unique_name(base)
    }

    pub fn names(&self) -> &NameRegistry {
        &self.names
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &Element)> + '_ {
        self.elements.iter().map(|(id, element)| (*id, element))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<ElementId> {
        self.elements()
            .find(|(_, element)| element.name() == name)
            .map(|(id, _)| id)
    }

    pub fn inputs(&self) -> Vec<ElementId> {
        self.ids_where(Element::is_input)
    }

    pub fn outputs(&self) -> Vec<ElementId> {
        self.ids_where(Element::is_output)
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.names_where(Element::is_input)
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.names_where(Element::is_output)
    }

    fn ids_where(&self, predicate: impl Fn(&Element) -> bool) -> Vec<ElementId> {
        self.elements()
            .filter(|(_, element)| predicate(element))
            .map(|(id, _)| id)
            .collect()
    }

    fn names_where(&self, predicate: impl Fn(&Element) -> bool) -> Vec<&str> {
        self.elements
            .values()
            .filter(|element| predicate(element))
            .map(Element::name)
            .collect()
    }

    pub fn occupied_cells(&self) -> HashSet<Position> {
        self.elements
            .values()
            .flat_map(Element::occupied_cells)
            .collect()
    }

    /// The element covering cell `(x, y)`, if any.
    pub fn element_at(&self, x: i32, y: i32) -> Option<ElementId> {
        self.elements()
            .find(|(_, element)| element.contains_cell((x, y)))
            .map(|(id, _)| id)
    }

    pub fn add_modifier(
        &mut self,
        id: ElementId,
        modifier: Box<dyn Modifier>,
    ) -> Result<(), CircuitError> {
        self.get_mut(id)?.add_modifier(modifier);
        Ok(())
    }

    pub fn remove_modifier(
        &mut self,
        id: ElementId,
        index: usize,
    ) -> Result<Option<Box<dyn Modifier>>, CircuitError> {
        Ok(self.get_mut(id)?.remove_modifier(index))
    }

    /// Wires output `output` of `source` to input `input` of `target`.
    ///
    /// Both directions are recorded, or neither when the call fails.
    pub fn connect(
        &mut self,
        source: ElementId,
        output: usize,
        target: ElementId,
        input: usize,
    ) -> Result<(), CircuitError> {
        let count = self.get(source)?.num_outputs();
        if output >= count {
            return Err(CircuitError::PortOutOfRange {
                kind: PortKind::Output,
                port: output,
                count,
            });
        }
        let count = self.get(target)?.num_inputs();
        if input >= count {
            return Err(CircuitError::PortOutOfRange {
                kind: PortKind::Input,
                port: input,
                count,
            });
        }

        let forward = PortRef {
            element: target,
            port: input,
        };
        if self.get(source)?.outputs[output].contains(&forward) {
            return Err(CircuitError::DuplicateConnection);
        }
        self.get_mut(source)?.outputs[output].push(forward);
        self.get_mut(target)?.inputs[input].push(PortRef {
            element: source,
            port: output,
        });
        Ok(())
    }

    /// Drops every edge touching one port, on both ends. Disconnecting an
    /// unconnected port is fine.
    pub fn disconnect_port(
        &mut self,
        id: ElementId,
        kind: PortKind,
        port: usize,
    ) -> Result<(), CircuitError> {
        let element = self.get_mut(id)?;
        let ports = match kind {
            PortKind::Input => &mut element.inputs,
            PortKind::Output => &mut element.outputs,
        };
        let count = ports.len();
        let peers = match ports.get_mut(port) {
            Some(peers) => std::mem::take(peers),
            None => return Err(CircuitError::PortOutOfRange { kind, port, count }),
        };

        let this = PortRef { element: id, port };
        for peer in peers {
            if let Some(other) = self.elements.get_mut(&peer.element) {
                let mirrored = match kind {
                    PortKind::Input => other.outputs.get_mut(peer.port),
                    PortKind::Output => other.inputs.get_mut(peer.port),
                };
                if let Some(edges) = mirrored {
                    edges.retain(|edge| *edge != this);
                }
            }
        }
        Ok(())
    }

    pub fn disconnect_all(&mut self, id: ElementId) -> Result<(), CircuitError> {
        let element = self.get(id)?;
        let (inputs, outputs) = (element.num_inputs(), element.num_outputs());
        for port in 0..inputs {
            self.disconnect_port(id, PortKind::Input, port)?;
        }
        for port in 0..outputs {
            self.disconnect_port(id, PortKind::Output, port)?;
        }
        Ok(())
    }

    /// Resolved value of one input: wired-OR over every live source, `Low`
    /// when nothing drives it.
    pub fn input_signal(&self, id: ElementId, port: usize) -> Signal {
        let element = match self.elements.get(&id) {
            Some(element) => element,
            None => return Signal::Low,
        };
        Signal::wired_or(element.input_connections(port).iter().filter_map(|source| {
            self.elements
                .get(&source.element)?
                .values()
                .get(source.port)
                .copied()
        }))
    }

    pub fn input_signals(&self, id: ElementId) -> Vec<Signal> {
        let count = self.elements.get(&id).map_or(0, Element::num_inputs);
        (0..count).map(|port| self.input_signal(id, port)).collect()
    }

    /// Drives an input element.
    pub fn set_input(&mut self, id: ElementId, value: Signal) -> Result<(), CircuitError> {
        if self.get_mut(id)?.set_value(value) {
            Ok(())
        } else {
            Err(CircuitError::NotAnInput(id))
        }
    }

    /// What an input drives or an output shows.
    pub fn value(&self, id: ElementId) -> Option<Signal> {
        self.elements.get(&id)?.value()
    }

    /// True when every output element is reachable from some input element.
    /// A circuit without inputs or outputs is never valid.
    pub fn is_valid_circuit(&self) -> bool {
        let inputs = self.inputs();
        let outputs = self.outputs();
        if inputs.is_empty() || outputs.is_empty() {
            return false;
        }

        let mut visited = HashSet::new();
        let mut queue: VecDeque<ElementId> = inputs.into_iter().collect();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(element) = self.elements.get(&current) {
                element
                    .outputs
                    .iter()
                    .flatten()
                    .filter(|target| !visited.contains(&target.element))
                    .for_each(|target| queue.push_back(target.element));
            }
        }
        outputs.iter().all(|output| visited.contains(output))
    }

    fn ids_by_sync(&self, sync: bool) -> Vec<ElementId> {
        self.ids_where(|element| element.is_sync() == sync)
    }

    fn compute(&mut self, id: ElementId) -> bool {
        let inputs = self.input_signals(id);
        match self.elements.get_mut(&id) {
            Some(element) => {
                let before = element.values().to_vec();
                element.compute_outputs(&inputs);
                element.values() != before.as_slice()
            }
            None => false,
        }
    }

    /// One pass of `compute_outputs` over every combinational element.
    pub(crate) fn combinational_pass(&mut self) {
        for id in self.ids_by_sync(false) {
            self.compute(id);
        }
    }

    /// Stages every sync element from the current input values.
    pub(crate) fn stage_sync(&mut self) {
        for id in self.ids_by_sync(true) {
            let inputs = self.input_signals(id);
            if let Some(element) = self.elements.get_mut(&id) {
                element.compute_next_state(&inputs);
            }
        }
    }

    /// Ticks every sync element. Always run after a full `stage_sync` so no
    /// element sees a neighbour's committed value while staging.
    pub(crate) fn commit_sync(&mut self) {
        self.elements
            .values_mut()
            .filter(|element| element.is_sync())
            .for_each(Element::tick);
    }

    /// Repeats combinational passes until one changes nothing. Returns the
    /// number of passes taken.
    ///
    /// Output elements carry no values of their own and always reflect the
    /// latest pass, so they take no part in the comparison.
    pub(crate) fn settle(&mut self, max_iterations: usize) -> Result<usize, EvalError> {
        let ids = self.ids_by_sync(false);
        for iteration in 1..=max_iterations {
            let mut changed = false;
            for id in &ids {
                changed |= self.compute(*id);
            }
            if !changed {
                return Ok(iteration);
            }
        }
        Err(EvalError::CombinationalCycle {
            iterations: max_iterations,
        })
    }

    /// A single clock step: one combinational pass, then every sync element
    /// stages and ticks.
    pub fn tick_once(&mut self) {
        self.combinational_pass();
        self.stage_sync();
        self.commit_sync();
    }

    /// Applies `assignment` and evaluates to a fixed point with the
    /// configured iteration bound.
    pub fn evaluate(&mut self, assignment: &[(ElementId, Signal)]) -> Result<Outputs, EvalError> {
        let max_iterations = self.config.max_iterations();
        self.evaluate_with(assignment, max_iterations)
    }

    /// Full evaluation. Each round settles the combinational part, then runs
    /// one sync step; the first round that leaves every sync output unchanged
    /// ends the evaluation. Fails with [`EvalError::CombinationalCycle`] if
    /// the combinational part never settles, and [`EvalError::Unstable`] if
    /// no round is stable within `settle_steps`.
    #[instrument(level = "debug", skip_all)]
    pub fn evaluate_with(
        &mut self,
        assignment: &[(ElementId, Signal)],
        max_iterations: usize,
    ) -> Result<Outputs, EvalError> {
        for (id, value) in assignment {
            self.set_input(*id, *value)?;
        }

        let sync = self.ids_by_sync(true);
        let steps = self.config.settle_steps();
        for step in 1..=steps {
            let iterations = self.settle(max_iterations).map_err(|err| {
                debug!(%err, "combinational part did not settle");
                err
            })?;

            let before = self.sync_values(&sync);
            self.stage_sync();
            self.commit_sync();
            if self.sync_values(&sync) == before {
                debug!(iterations, step, "circuit settled");
                return Ok(self.collect_outputs());
            }
        }
        debug!(steps, "sequential part did not stabilize");
        Err(EvalError::Unstable { steps })
    }

    fn sync_values(&self, ids: &[ElementId]) -> Vec<Vec<Signal>> {
        ids.iter()
            .filter_map(|id| self.elements.get(id))
            .map(|element| element.values().to_vec())
            .collect()
    }

    fn collect_outputs(&self) -> Outputs {
        self.elements()
            .filter(|(_, element)| element.is_output())
            .filter_map(|(id, element)| element.value().map(|value| (id, value)))
            .collect()
    }

    pub fn save_state(&self) -> CircuitState {
        CircuitState(
            self.elements()
                .map(|(id, element)| (id, element.save_state()))
                .collect(),
        )
    }

    /// Puts back a snapshot taken from this circuit. Elements added since the
    /// snapshot keep their state; removed ones are skipped.
    pub fn restore_state(&mut self, state: CircuitState) {
        for (id, saved) in state.0 {
            if let Some(element) = self.elements.get_mut(&id) {
                element.restore_state(saved);
            }
        }
    }
}
