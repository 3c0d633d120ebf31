use crate::element::input;
use crate::signal::Signal;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LatchKind {
    /// Inputs `R`, `S`, `clk`.
    Rs,
    /// Inputs `D`, `clk`.
    D,
}

impl LatchKind {
    pub fn num_inputs(self) -> usize {
        match self {
            LatchKind::Rs => 3,
            LatchKind::D => 2,
        }
    }

    pub fn input_names(self) -> &'static [&'static str] {
        match self {
            LatchKind::Rs => &["R", "S", "clk"],
            LatchKind::D => &["D", "clk"],
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            LatchKind::Rs => "RSLatch",
            LatchKind::D => "DLatch",
        }
    }
}

/// Clocked latch state. `stage` computes the next state from the inputs,
/// `commit` makes it current and yields `[Q, nQ]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Latch {
    kind: LatchKind,
    state: Signal,
    next_state: Signal,
}

impl Latch {
    pub fn new(kind: LatchKind) -> Self {
        Self::with_state(kind, Signal::Low)
    }

    pub fn with_state(kind: LatchKind, state: Signal) -> Self {
        Latch {
            kind,
            state,
            next_state: state,
        }
    }

    pub fn kind(&self) -> LatchKind {
        self.kind
    }

    pub fn state(&self) -> Signal {
        self.state
    }

    pub fn outputs(&self) -> Vec<Signal> {
        vec![self.state, !self.state]
    }

    pub fn stage(&mut self, inputs: &[Signal]) {
        let clock = input(inputs, self.kind.num_inputs() - 1);
        let loaded = match self.kind {
            LatchKind::Rs => {
                let (reset, set) = (input(inputs, 0), input(inputs, 1));
                match (set, reset) {
                    (Signal::High, Signal::Low) => Signal::High,
                    (Signal::Low, Signal::High) => Signal::Low,
                    (Signal::Low, Signal::Low) => self.state,
                    // Set and reset together is the forbidden state.
                    _ => Signal::Undefined,
                }
            }
            LatchKind::D => input(inputs, 0),
        };
        self.next_state = match clock {
            Signal::High => loaded,
            Signal::Low => self.state,
            Signal::Undefined if loaded == self.state => self.state,
            Signal::Undefined => Signal::Undefined,
        };
    }

    pub fn commit(&mut self) -> Vec<Signal> {
        self.state = self.next_state;
        self.outputs()
    }
}
