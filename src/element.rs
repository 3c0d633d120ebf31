use serde::{Deserialize, Serialize};

use crate::circuit::CircuitState;
use crate::components::composite::Composite;
use crate::components::gates::GateKind;
use crate::components::latch::{Latch, LatchKind};
use crate::modifier::{Modifier, SwitchAfterTicksModifier};
use crate::signal::Signal;

pub type Position = (i32, i32);

const DEFAULT_WIDTH: i32 = 6;
const TERMINAL_WIDTH: i32 = 8;
const TERMINAL_HEIGHT: i32 = 2;
const SWITCHING_AND_TICKS: u32 = 60;

/// Handle of an element inside the circuit that owns it. Handles are never
/// reused by the same circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub(crate) usize);

/// One end of a connection: a port index on some element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub element: ElementId,
    pub port: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortKind {
    Input,
    Output,
}

/// Toolbox grouping. Plain data, no behaviour hangs off it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Io,
    Gate,
    Memory,
    Custom,
}

#[derive(Debug, Clone)]
pub enum ElementKind {
    Input,
    Output { value: Signal },
    Gate(GateKind),
    /// An And gate whose result only shows up on tick, behind a
    /// switch-after-ticks modifier.
    SwitchingAnd,
    Latch(Latch),
    Composite(Box<Composite>),
}

impl ElementKind {
    /// Serialized type tag.
    pub fn tag(&self) -> &str {
        match self {
            ElementKind::Input => "Input",
            ElementKind::Output { .. } => "Output",
            ElementKind::Gate(gate) => gate.tag(),
            ElementKind::SwitchingAnd => "SwitchingAnd",
            ElementKind::Latch(latch) => latch.kind().tag(),
            ElementKind::Composite(composite) => composite.type_name(),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            ElementKind::Input | ElementKind::Output { .. } => Category::Io,
            ElementKind::Gate(_) | ElementKind::SwitchingAnd => Category::Gate,
            ElementKind::Latch(_) => Category::Memory,
            ElementKind::Composite(_) => Category::Custom,
        }
    }
}

/// A logic unit with a fixed number of ports.
///
/// Connections are stored on both ends: `inputs[i]` lists the output ports
/// driving input `i`, `outputs[o]` lists the input ports fed by output `o`.
/// They are plain handles into the owning circuit and never keep a peer alive.
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    kind: ElementKind,
    width: i32,
    height: i32,
    position: Option<Position>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    pub(crate) inputs: Vec<Vec<PortRef>>,
    pub(crate) outputs: Vec<Vec<PortRef>>,
    values: Vec<Signal>,
    next_values: Vec<Signal>,
    modifiers: Vec<Box<dyn Modifier>>,
}

/// Everything about an element that evaluation can change.
#[derive(Debug, Clone)]
pub struct ElementState {
    values: Vec<Signal>,
    next_values: Vec<Signal>,
    kind: KindState,
    modifiers: Vec<Box<dyn Modifier>>,
}

#[derive(Debug, Clone)]
enum KindState {
    Stateless,
    Output(Signal),
    Latch(Latch),
    Composite(CircuitState),
}

fn footprint_height(num_inputs: usize, num_outputs: usize) -> i32 {
    let ports = num_inputs.max(num_outputs) as i32;
    // ceil(ports * 1.5) + 1
    (3 * ports + 1) / 2 + 1
}

impl Element {
    fn new(kind: ElementKind, num_inputs: usize, num_outputs: usize) -> Self {
        let name = kind.tag().to_string();
        Element {
            name,
            kind,
            width: DEFAULT_WIDTH,
            height: footprint_height(num_inputs, num_outputs),
            position: None,
            input_names: vec![String::new(); num_inputs],
            output_names: vec![String::new(); num_outputs],
            inputs: vec![Vec::new(); num_inputs],
            outputs: vec![Vec::new(); num_outputs],
            values: vec![Signal::Low; num_outputs],
            next_values: vec![Signal::Low; num_outputs],
            modifiers: Vec::new(),
        }
    }

    fn terminal(kind: ElementKind, num_inputs: usize, num_outputs: usize) -> Self {
        let mut element = Self::new(kind, num_inputs, num_outputs);
        element.width = TERMINAL_WIDTH;
        element.height = TERMINAL_HEIGHT;
        element
    }

    fn with_port_names(mut self, inputs: &[&str], outputs: &[&str]) -> Self {
        self.input_names = inputs.iter().map(|name| name.to_string()).collect();
        self.output_names = outputs.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn input() -> Self {
        Self::terminal(ElementKind::Input, 0, 1)
    }

    pub fn output() -> Self {
        Self::terminal(
            ElementKind::Output {
                value: Signal::Low,
            },
            1,
            0,
        )
    }

    pub fn gate(gate: GateKind) -> Self {
        Self::new(ElementKind::Gate(gate), gate.num_inputs(), 1)
    }

    pub fn switching_and() -> Self {
        let mut element = Self::new(ElementKind::SwitchingAnd, 2, 1)
            .with_port_names(&["A", "B"], &["F"]);
        element.add_modifier(Box::new(SwitchAfterTicksModifier::new(SWITCHING_AND_TICKS)));
        element
    }

    pub fn latch(kind: LatchKind) -> Self {
        Self::from_latch(Latch::new(kind))
    }

    /// A latch element already holding `latch`'s state.
    pub fn from_latch(latch: Latch) -> Self {
        let kind = latch.kind();
        let outputs = latch.outputs();
        let mut element = Self::new(ElementKind::Latch(latch), kind.num_inputs(), 2)
            .with_port_names(kind.input_names(), &["Q", "nQ"]);
        element.values = outputs.clone();
        element.next_values = outputs;
        element
    }

    pub fn rs_latch() -> Self {
        Self::latch(LatchKind::Rs)
    }

    pub fn d_latch() -> Self {
        Self::latch(LatchKind::D)
    }

    /// Wraps a composite; ports and their names mirror the sub-circuit's
    /// input and output elements.
    pub fn composite(composite: Composite) -> Self {
        let input_names = composite.input_names();
        let output_names = composite.output_names();
        let mut element = Self::new(
            ElementKind::Composite(Box::new(composite)),
            input_names.len(),
            output_names.len(),
        );
        element.input_names = input_names;
        element.output_names = output_names;
        element
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, ElementKind::Input)
    }

    pub fn is_output(&self) -> bool {
        matches!(self.kind, ElementKind::Output { .. })
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Option<Position>) {
        self.position = position;
    }

    /// One past the bottom-right cell when anchored at `position`, or `None`
    /// if the footprint leaves the `i32` grid.
    pub fn far_corner(&self, (x, y): Position) -> Option<Position> {
        Some((x.checked_add(self.width)?, y.checked_add(self.height)?))
    }

    /// Cells covered when anchored at `position`. Cells past the edge of the
    /// grid are left out.
    pub fn footprint_at(&self, (x, y): Position) -> impl Iterator<Item = Position> + '_ {
        (0..self.width)
            .filter_map(move |dx| x.checked_add(dx))
            .flat_map(move |cx| {
                (0..self.height)
                    .filter_map(move |dy| y.checked_add(dy))
                    .map(move |cy| (cx, cy))
            })
    }

    /// Cells covered at the current position; empty while unplaced.
    pub fn occupied_cells(&self) -> Vec<Position> {
        match self.position {
            Some(position) => self.footprint_at(position).collect(),
            None => Vec::new(),
        }
    }

    pub fn contains_cell(&self, (x, y): Position) -> bool {
        match self.position {
            Some((ex, ey)) => {
                let within = |start: i32, len: i32, at: i32| {
                    let (start, at) = (i64::from(start), i64::from(at));
                    start <= at && at < start + i64::from(len)
                };
                within(ex, self.width, x) && within(ey, self.height, y)
            }
            None => false,
        }
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn set_input_name(&mut self, port: usize, name: impl Into<String>) -> bool {
        match self.input_names.get_mut(port) {
            Some(slot) => {
                *slot = name.into();
                true
            }
            None => false,
        }
    }

    pub fn set_output_name(&mut self, port: usize, name: impl Into<String>) -> bool {
        match self.output_names.get_mut(port) {
            Some(slot) => {
                *slot = name.into();
                true
            }
            None => false,
        }
    }

    /// Sources driving input `port`.
    pub fn input_connections(&self, port: usize) -> &[PortRef] {
        self.inputs.get(port).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Targets fed by output `port`.
    pub fn output_connections(&self, port: usize) -> &[PortRef] {
        self.outputs.get(port).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn values(&self) -> &[Signal] {
        &self.values
    }

    pub fn next_values(&self) -> &[Signal] {
        &self.next_values
    }

    /// The value an input drives or an output shows.
    pub fn value(&self) -> Option<Signal> {
        match &self.kind {
            ElementKind::Input => self.values.first().copied(),
            ElementKind::Output { value } => Some(*value),
            _ => None,
        }
    }

    /// Drives an input element. Returns false for any other kind.
    pub(crate) fn set_value(&mut self, value: Signal) -> bool {
        match self.kind {
            ElementKind::Input => {
                self.values[0] = value;
                true
            }
            _ => false,
        }
    }

    pub fn modifiers(&self) -> &[Box<dyn Modifier>] {
        &self.modifiers
    }

    pub fn add_modifier(&mut self, modifier: Box<dyn Modifier>) {
        self.modifiers.push(modifier);
    }

    pub fn remove_modifier(&mut self, index: usize) -> Option<Box<dyn Modifier>> {
        if index < self.modifiers.len() {
            Some(self.modifiers.remove(index))
        } else {
            None
        }
    }

    pub fn clear_modifiers(&mut self) {
        self.modifiers.clear();
    }

    pub fn reset_modifiers(&mut self) {
        self.modifiers.iter_mut().for_each(|modifier| modifier.reset());
    }

    /// Whether the output only changes on an explicit tick. Gates and
    /// combinational composites become sync once they carry a modifier.
    pub fn is_sync(&self) -> bool {
        match &self.kind {
            ElementKind::Input | ElementKind::Output { .. } => false,
            ElementKind::Latch(_) | ElementKind::SwitchingAnd => true,
            ElementKind::Gate(_) => !self.modifiers.is_empty(),
            ElementKind::Composite(composite) => {
                composite.is_sync() || !self.modifiers.is_empty()
            }
        }
    }

    /// Recomputes a combinational element from its resolved input values.
    /// Sync elements ignore this call.
    pub fn compute_outputs(&mut self, inputs: &[Signal]) {
        if self.is_sync() {
            return;
        }
        match &mut self.kind {
            ElementKind::Output { value } => *value = input(inputs, 0),
            ElementKind::Gate(gate) => self.values[0] = gate.evaluate(inputs),
            ElementKind::Composite(composite) => self.values = composite.settle(inputs),
            _ => (),
        }
    }

    /// Stages the next state of a sync element without touching its visible
    /// outputs.
    pub fn compute_next_state(&mut self, inputs: &[Signal]) {
        let staged = match &mut self.kind {
            ElementKind::Input | ElementKind::Output { .. } => return,
            ElementKind::Gate(gate) => vec![gate.evaluate(inputs)],
            ElementKind::SwitchingAnd => vec![GateKind::And.evaluate(inputs)],
            ElementKind::Latch(latch) => {
                latch.stage(inputs);
                return;
            }
            ElementKind::Composite(composite) if composite.is_sync() => {
                composite.stage(inputs);
                return;
            }
            ElementKind::Composite(composite) => composite.settle(inputs),
        };
        self.next_values = staged;
    }

    /// Commits the staged values and runs them through the modifier pipeline.
    pub fn tick(&mut self) {
        match &mut self.kind {
            ElementKind::Input | ElementKind::Output { .. } => return,
            ElementKind::Latch(latch) => self.next_values = latch.commit(),
            ElementKind::Composite(composite) if composite.is_sync() => {
                self.next_values = composite.commit()
            }
            _ => (),
        }
        let mut values = self.next_values.clone();
        for modifier in self.modifiers.iter_mut() {
            values = modifier.apply(values);
        }
        self.values = values;
    }

    pub(crate) fn save_state(&self) -> ElementState {
        let kind = match &self.kind {
            ElementKind::Output { value } => KindState::Output(*value),
            ElementKind::Latch(latch) => KindState::Latch(latch.clone()),
            ElementKind::Composite(composite) => {
                KindState::Composite(composite.circuit().save_state())
            }
            _ => KindState::Stateless,
        };
        ElementState {
            values: self.values.clone(),
            next_values: self.next_values.clone(),
            kind,
            modifiers: self.modifiers.clone(),
        }
    }

    pub(crate) fn restore_state(&mut self, state: ElementState) {
        self.values = state.values;
        self.next_values = state.next_values;
        self.modifiers = state.modifiers;
        match (&mut self.kind, state.kind) {
            (ElementKind::Output { value }, KindState::Output(saved)) => *value = saved,
            (ElementKind::Latch(latch), KindState::Latch(saved)) => *latch = saved,
            (ElementKind::Composite(composite), KindState::Composite(saved)) => {
                composite.circuit_mut().restore_state(saved)
            }
            _ => (),
        }
    }
}

pub(crate) fn input(inputs: &[Signal], port: usize) -> Signal {
    inputs.get(port).copied().unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::{Category, Element};
    use crate::modifier::DelayModifier;
    use crate::signal::Signal::*;

    #[test]
    fn footprints() {
        let input = Element::input();
        assert_eq!((input.width(), input.height()), (8, 2));
        let and = Element::and();
        assert_eq!((and.width(), and.height()), (6, 4));
        let rs = Element::rs_latch();
        assert_eq!(rs.height(), 6);
        assert!(rs.occupied_cells().is_empty());
        assert_eq!(and.footprint_at((2, 3)).count(), 24);
    }

    #[test]
    fn default_names_and_categories() {
        assert_eq!(Element::input().name(), "Input");
        assert_eq!(Element::xor().name(), "Xor");
        assert_eq!(Element::d_latch().input_names(), ["D", "clk"]);
        assert_eq!(Element::d_latch().category(), Category::Memory);
        assert_eq!(Element::not().num_inputs(), 1);
    }

    #[test]
    fn combinational_gate_recomputes_immediately() {
        let mut and = Element::and();
        and.compute_outputs(&[High, High]);
        assert_eq!(and.values(), [High]);
        and.compute_outputs(&[High, Low]);
        assert_eq!(and.values(), [Low]);
    }

    #[test]
    fn modifier_makes_gate_sync() {
        let mut or = Element::or();
        assert!(!or.is_sync());
        or.add_modifier(Box::new(DelayModifier::new(1)));
        assert!(or.is_sync());

        or.compute_outputs(&[High, Low]);
        assert_eq!(or.values(), [Low]);
        or.compute_next_state(&[High, Low]);
        assert_eq!(or.values(), [Low]);
        or.tick();
        assert_eq!(or.values(), [Low]);
        or.compute_next_state(&[Low, Low]);
        or.tick();
        assert_eq!(or.values(), [High]);
    }

    #[test]
    fn switching_and_sticks_high() {
        let mut gate = Element::switching_and();
        assert!(gate.is_sync());
        for _ in 0..60 {
            gate.compute_next_state(&[High, Low]);
            gate.tick();
            assert_eq!(gate.values(), [Low]);
        }
        gate.compute_next_state(&[High, Low]);
        gate.tick();
        assert_eq!(gate.values(), [High]);
    }

    #[test]
    fn inputs_ignore_tick() {
        let mut input = Element::input();
        assert!(input.set_value(High));
        input.tick();
        input.compute_outputs(&[]);
        assert_eq!(input.value(), Some(High));
        assert!(!Element::output().set_value(High));
    }

    #[test]
    fn state_round_trip() {
        let mut latch = Element::d_latch();
        let saved = latch.save_state();
        latch.compute_next_state(&[High, High]);
        latch.tick();
        assert_eq!(latch.values(), [High, Low]);
        latch.restore_state(saved);
        assert_eq!(latch.values(), [Low, High]);
        latch.compute_next_state(&[Low, Low]);
        latch.tick();
        assert_eq!(latch.values(), [Low, High]);
    }
}
