use std::collections::VecDeque;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::signal::Signal;

pub const DELAY: &str = "Delay";
pub const SWITCH_AFTER_TICKS: &str = "SwitchAfterTicks";

/// A stateful stage in an element's output pipeline.
///
/// Modifiers run in order on every `tick`, each one receiving the previous
/// one's output. They own whatever history they need and must be able to go
/// back to their initial state through [`Modifier::reset`].
pub trait Modifier: Debug {
    /// Tag under which the modifier is registered and serialized.
    fn name(&self) -> &'static str;
    fn apply(&mut self, values: Vec<Signal>) -> Vec<Signal>;
    fn reset(&mut self);
    /// Constructor parameters, as stored in the `data` field of a document.
    fn to_data(&self) -> serde_json::Value;
    fn clone_box(&self) -> Box<dyn Modifier>;
}

impl Clone for Box<dyn Modifier> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Shifts the output forward in time by `delay_ticks` ticks, emitting lows
/// until the first queued value comes due.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayModifier {
    delay_ticks: u32,
    #[serde(skip)]
    tick_count: u32,
    #[serde(skip)]
    queue: VecDeque<Vec<Signal>>,
}

impl DelayModifier {
    pub fn new(delay_ticks: u32) -> Self {
        Self {
            delay_ticks,
            tick_count: 0,
            queue: VecDeque::new(),
        }
    }

    pub fn delay_ticks(&self) -> u32 {
        self.delay_ticks
    }
}

impl Modifier for DelayModifier {
    fn name(&self) -> &'static str {
        DELAY
    }

    fn apply(&mut self, values: Vec<Signal>) -> Vec<Signal> {
        let width = values.len();
        self.queue.push_back(values);
        self.tick_count = self.tick_count.saturating_add(1);

        if self.tick_count <= self.delay_ticks {
            return vec![Signal::Low; width];
        }
        match self.queue.pop_front() {
            Some(oldest) => oldest,
            None => vec![Signal::Low; width],
        }
    }

    fn reset(&mut self) {
        self.tick_count = 0;
        self.queue.clear();
    }

    fn to_data(&self) -> serde_json::Value {
        serde_json::json!({ "delay_ticks": self.delay_ticks })
    }

    fn clone_box(&self) -> Box<dyn Modifier> {
        Box::new(self.clone())
    }
}

/// Passes values through for `ticks` ticks, then latches every output high.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchAfterTicksModifier {
    ticks: u32,
    #[serde(skip)]
    elapsed: u32,
}

impl SwitchAfterTicksModifier {
    pub fn new(ticks: u32) -> Self {
        Self { ticks, elapsed: 0 }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn has_switched(&self) -> bool {
        self.elapsed > self.ticks
    }
}

impl Modifier for SwitchAfterTicksModifier {
    fn name(&self) -> &'static str {
        SWITCH_AFTER_TICKS
    }

    fn apply(&mut self, values: Vec<Signal>) -> Vec<Signal> {
        self.elapsed = self.elapsed.saturating_add(1);
        if self.has_switched() {
            vec![Signal::High; values.len()]
        } else {
            values
        }
    }

    fn reset(&mut self) {
        self.elapsed = 0;
    }

    fn to_data(&self) -> serde_json::Value {
        serde_json::json!({ "ticks": self.ticks })
    }

    fn clone_box(&self) -> Box<dyn Modifier> {
        Box::new(self.clone())
    }
}
