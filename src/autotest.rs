use std::fmt;
use std::ops::{Deref, DerefMut};

use tracing::{debug, instrument, warn};

use crate::circuit::{Circuit, CircuitState};
use crate::element::ElementId;
use crate::error::AutoTestError;
use crate::level::Expected;
use crate::signal::Signal;

/// What a circuit produced for one row of the truth table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actual {
    Values(Vec<Signal>),
    /// The evaluation never settled.
    Cycle,
}

/// A truth table row the circuit got wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub inputs: Vec<bool>,
    pub expected: Vec<Expected>,
    pub actual: Actual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelReport {
    /// Every output is reachable from some input.
    pub valid: bool,
    pub mismatches: Vec<Mismatch>,
}

impl LevelReport {
    pub fn passed(&self) -> bool {
        self.valid && self.mismatches.is_empty()
    }
}

fn join<T: fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for Actual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actual::Values(values) => write!(f, "{}", join(values, " ")),
            Actual::Cycle => write!(f, "cycle"),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs: Vec<u8> = self.inputs.iter().map(|bit| u8::from(*bit)).collect();
        write!(
            f,
            "inputs {}: expected {}, got {}",
            join(&inputs, " "),
            join(&self.expected, " "),
            self.actual
        )
    }
}

/// Puts the saved state back when dropped, whichever way the sweep ends.
struct Restore<'a> {
    circuit: &'a mut Circuit,
    state: Option<CircuitState>,
}

impl<'a> Restore<'a> {
    fn new(circuit: &'a mut Circuit) -> Self {
        let state = Some(circuit.save_state());
        Restore { circuit, state }
    }
}

impl Deref for Restore<'_> {
    type Target = Circuit;

    fn deref(&self) -> &Circuit {
        self.circuit
    }
}

impl DerefMut for Restore<'_> {
    fn deref_mut(&mut self) -> &mut Circuit {
        self.circuit
    }
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            self.circuit.restore_state(state);
        }
    }
}

/// Input combination `n` of `width` bits, first input most significant.
fn combination(n: u64, width: usize) -> Vec<bool> {
    (0..width).rev().map(|bit| n >> bit & 1 == 1).collect()
}

impl Circuit {
    fn port_by_name(&self, ids: &[ElementId], name: &str) -> Option<ElementId> {
        ids.iter()
            .copied()
            .find(|id| self.element(*id).map(|element| element.name()) == Some(name))
    }

    /// Checks the circuit against its level's truth table.
    ///
    /// Returns an empty list both on a full pass and when the circuit cannot
    /// be assessed at all (no level, or a level port with no matching
    /// element). Use [`Circuit::try_auto_test`] to tell the two apart.
    pub fn auto_test(&mut self) -> Vec<Mismatch> {
        match self.try_auto_test() {
            Ok(mismatches) => mismatches,
            Err(err) => {
                warn!(%err, "auto-test could not assess the circuit");
                Vec::new()
            }
        }
    }

    /// Runs a full evaluation for every input combination of the attached
    /// level, in lexicographic order, and collects the rows that do not
    /// match. Rows missing from the table are evaluated but not compared.
    ///
    /// All element state is restored afterwards, so the sweep has no
    /// visible effect on the circuit.
    #[instrument(level = "debug", skip_all)]
    pub fn try_auto_test(&mut self) -> Result<Vec<Mismatch>, AutoTestError> {
        let level = self.shared_level().ok_or(AutoTestError::NoLevel)?;

        let input_ids = self.inputs();
        let inputs = level
            .inputs()
            .iter()
            .map(|name| {
                self.port_by_name(&input_ids, name)
                    .ok_or_else(|| AutoTestError::MissingInput(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let output_ids = self.outputs();
        let outputs = level
            .outputs()
            .iter()
            .map(|name| {
                self.port_by_name(&output_ids, name)
                    .ok_or_else(|| AutoTestError::MissingOutput(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut circuit = Restore::new(self);
        let mut mismatches = Vec::new();
        for n in 0..1u64 << inputs.len() {
            let bits = combination(n, inputs.len());
            let previous: Vec<Signal> = outputs
                .iter()
                .map(|id| circuit.value(*id).unwrap_or_default())
                .collect();
            let assignment: Vec<(ElementId, Signal)> = inputs
                .iter()
                .copied()
                .zip(bits.iter().map(|bit| Signal::from(*bit)))
                .collect();

            let actual = match circuit.evaluate(&assignment) {
                Ok(values) => Actual::Values(
                    outputs
                        .iter()
                        .map(|id| values.get(id).copied().unwrap_or_default())
                        .collect(),
                ),
                Err(err) => {
                    debug!(?bits, %err, "no result for combination");
                    Actual::Cycle
                }
            };

            let expected = match level.expected(&bits) {
                Some(expected) => expected,
                None => continue,
            };
            let matched = match &actual {
                Actual::Values(values) => expected
                    .iter()
                    .zip(values.iter().zip(&previous))
                    .all(|(expected, (actual, previous))| expected.matches(*actual, *previous)),
                Actual::Cycle => false,
            };
            if !matched {
                mismatches.push(Mismatch {
                    inputs: bits,
                    expected: expected.to_vec(),
                    actual,
                });
            }
        }
        debug!(mismatches = mismatches.len(), "auto-test finished");
        Ok(mismatches)
    }

    /// A level is solved when the circuit is connected through and the
    /// auto-test finds nothing wrong.
    pub fn check_level(&mut self) -> Result<LevelReport, AutoTestError> {
        let mismatches = self.try_auto_test()?;
        Ok(LevelReport {
            valid: self.is_valid_circuit(),
            mismatches,
        })
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{combination, Actual, Mismatch};
    use crate::circuit::Circuit;
    use crate::element::Element;
    use crate::error::AutoTestError;
    use crate::level::{Expected, Level};
    use crate::modifier::SwitchAfterTicksModifier;
    use crate::signal::Signal::*;
    use crate::truth_table;

    fn inverter() -> Circuit {
        let mut circuit = Circuit::new();
        let a = circuit.add_element(Element::input().with_name("A"), 0, 0).unwrap();
        let not = circuit.add_element(Element::not(), 10, 0).unwrap();
        let f = circuit.add_element(Element::output().with_name("F"), 20, 0).unwrap();
        circuit.connect(a, 0, not, 0).unwrap();
        circuit.connect(not, 0, f, 0).unwrap();
        circuit
    }

    #[test]
    fn combinations_are_msb_first() {
        assert_eq!(combination(1, 3), [false, false, true]);
        assert_eq!(combination(6, 3), [true, true, false]);
        assert!(combination(0, 0).is_empty());
    }

    #[test]
    fn fails_closed() {
        let mut circuit = inverter();
        assert_eq!(circuit.try_auto_test(), Err(AutoTestError::NoLevel));

        let level = Level::new("x", &["A", "B"], &["F"], Vec::new()).unwrap();
        circuit.set_level(Arc::new(level));
        assert_eq!(circuit.try_auto_test(), Err(AutoTestError::MissingInput("B".to_string())));
        assert!(circuit.auto_test().is_empty());

        let level = Level::new("y", &["A"], &["G"], truth_table![[0] => [0], [1] => [0]]).unwrap();
        circuit.set_level(Arc::new(level));
        assert_eq!(circuit.try_auto_test(), Err(AutoTestError::MissingOutput("G".to_string())));
        assert!(circuit.auto_test().is_empty());
    }

    #[test]
    fn reports_wrong_rows() {
        let mut circuit = inverter();
        let table = truth_table![[0] => [0], [1] => [1]];
        let level = Level::new("buffer", &["A"], &["F"], table).unwrap();
        circuit.set_level(Arc::new(level));
        let mismatches = circuit.auto_test();
        assert_eq!(
            mismatches[0],
            Mismatch {
                inputs: vec![false],
                expected: vec![Expected::Low],
                actual: Actual::Values(vec![High]),
            }
        );
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[1].to_string(), "inputs 1: expected 1, got 0");

        let report = circuit.check_level().unwrap();
        assert!(report.valid);
        assert!(!report.passed());
    }

    #[test]
    fn sweep_leaves_no_trace() {
        let mut circuit = inverter();
        let table = truth_table![[0] => [1], [1] => [0]];
        let level = Level::new("not", &["A"], &["F"], table).unwrap();
        circuit.set_level(Arc::new(level));
        let a = circuit.find("A").unwrap();
        let f = circuit.find("F").unwrap();
        circuit.evaluate(&[(a, High)]).unwrap();

        assert!(circuit.auto_test().is_empty());
        assert_eq!(circuit.value(a), Some(High));
        assert_eq!(circuit.value(f), Some(Low));
        assert!(circuit.check_level().unwrap().passed());
    }

    #[test]
    fn sweep_restores_modifier_history() {
        let mut circuit = Circuit::new();
        let a = circuit.add_element(Element::input().with_name("A"), 0, 0).unwrap();
        let not = circuit.add_element(Element::not(), 10, 0).unwrap();
        let f = circuit.add_element(Element::output().with_name("F"), 20, 0).unwrap();
        circuit.connect(a, 0, not, 0).unwrap();
        circuit.connect(not, 0, f, 0).unwrap();
        circuit
            .add_modifier(not, Box::new(SwitchAfterTicksModifier::new(1)))
            .unwrap();
        let table = truth_table![[0] => [1], [1] => [0]];
        let level = Level::new("not", &["A"], &["F"], table).unwrap();
        circuit.set_level(Arc::new(level));
        circuit.set_input(a, High).unwrap();
        let mut untouched = circuit.clone();

        let first = circuit.auto_test();
        assert!(!first.is_empty());
        assert_eq!(circuit.auto_test(), first);

        // The modifier only switches on its second tick, so leftover history
        // from the sweep would show up as an early High.
        for _ in 0..3 {
            circuit.tick_once();
            untouched.tick_once();
            assert_eq!(
                circuit.element(not).unwrap().values(),
                untouched.element(not).unwrap().values()
            );
        }
        assert_eq!(circuit.element(not).unwrap().values(), [High]);
    }
}
