use derive_builder::Builder;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_COMPOSITE_ITERATIONS: usize = 10;
pub const DEFAULT_SETTLE_STEPS: usize = 1;

/// Bounds for the fixed-point loops run during evaluation.
///
/// These bounds are the only thing standing between a combinational feedback
/// loop and a hang, so none of them may be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct EvalConfig {
    /// Passes allowed for the combinational part of a circuit to settle.
    #[builder(default = "DEFAULT_MAX_ITERATIONS")]
    pub(crate) max_iterations: usize,
    /// Passes a composite element runs over its sub-circuit per evaluation.
    #[builder(default = "DEFAULT_COMPOSITE_ITERATIONS")]
    pub(crate) composite_iterations: usize,
    /// Rounds of (combinational settle, sync step) a full evaluation may take
    /// before the sequential part is declared unstable.
    #[builder(default = "DEFAULT_SETTLE_STEPS")]
    pub(crate) settle_steps: usize,
}

impl EvalConfig {
    /// Creates a new builder for the evaluation configuration.
    pub fn builder() -> EvalConfigBuilder {
        EvalConfigBuilder::default()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn composite_iterations(&self) -> usize {
        self.composite_iterations
    }

    pub fn settle_steps(&self) -> usize {
        self.settle_steps
    }
}

impl EvalConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        let fields = [
            ("max_iterations", self.max_iterations),
            ("composite_iterations", self.composite_iterations),
            ("settle_steps", self.settle_steps),
        ];
        match fields.iter().find(|(_, value)| *value == Some(0)) {
            Some((field, _)) => Err(format!("{field} must be at least 1")),
            None => Ok(()),
        }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            composite_iterations: DEFAULT_COMPOSITE_ITERATIONS,
            settle_steps: DEFAULT_SETTLE_STEPS,
        }
    }
}
