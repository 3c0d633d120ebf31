use crate::element::{input, Element};
use crate::signal::Signal;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GateKind {
    And,
    Or,
    Xor,
    Not,
}

impl GateKind {
    pub fn num_inputs(self) -> usize {
        match self {
            GateKind::Not => 1,
            GateKind::And | GateKind::Or | GateKind::Xor => 2,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            GateKind::And => "And",
            GateKind::Or => "Or",
            GateKind::Xor => "Xor",
            GateKind::Not => "Not",
        }
    }

    pub fn evaluate(self, inputs: &[Signal]) -> Signal {
        let a = input(inputs, 0);
        match self {
            GateKind::And => a & input(inputs, 1),
            GateKind::Or => a | input(inputs, 1),
            GateKind::Xor => a ^ input(inputs, 1),
            GateKind::Not => !a,
        }
    }
}

macro_rules! gate_fn_gen {
    ( $gate_lowercase:ident, $gate_uppercase:ident ) => {
        pub fn $gate_lowercase() -> Element {
            Element::gate(GateKind::$gate_uppercase)
        }
    };
}

impl Element {
    gate_fn_gen!(and, And);
    gate_fn_gen!(or, Or);
    gate_fn_gen!(xor, Xor);
    gate_fn_gen!(not, Not);
}
