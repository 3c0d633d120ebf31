use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LevelError;
use crate::signal::Signal;

/// Auto-test enumerates every input combination, so the width stays small.
pub const MAX_INPUTS: usize = 16;

/// One cell on the output side of a truth table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ExpectedRepr", into = "ExpectedRepr")]
pub enum Expected {
    Low,
    High,
    /// The output keeps the value it showed before the row was applied.
    Hold,
    /// The output must be undefined, as after a forbidden latch input.
    Invalid,
    DontCare,
}

impl Expected {
    /// Whether `actual` satisfies this cell, given the value the same output
    /// showed before the row was applied.
    pub fn matches(self, actual: Signal, previous: Signal) -> bool {
        match self {
            Expected::Low => actual == Signal::Low,
            Expected::High => actual == Signal::High,
            Expected::Hold => actual == previous,
            Expected::Invalid => actual == Signal::Undefined,
            Expected::DontCare => true,
        }
    }
}

impl From<bool> for Expected {
    fn from(value: bool) -> Self {
        if value {
            Expected::High
        } else {
            Expected::Low
        }
    }
}

/// `0` is low, anything else is high.
impl From<i32> for Expected {
    fn from(value: i32) -> Self {
        Expected::from(value != 0)
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Low => write!(f, "0"),
            Expected::High => write!(f, "1"),
            Expected::Hold => write!(f, "Q"),
            Expected::Invalid => write!(f, "invalid"),
            Expected::DontCare => write!(f, "x"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ExpectedRepr {
    Bit(u8),
    Marker(String),
}

impl TryFrom<ExpectedRepr> for Expected {
    type Error = String;

    fn try_from(repr: ExpectedRepr) -> Result<Self, Self::Error> {
        match repr {
            ExpectedRepr::Bit(0) => Ok(Expected::Low),
            ExpectedRepr::Bit(1) => Ok(Expected::High),
            ExpectedRepr::Bit(bit) => Err(format!("expected bit must be 0 or 1, got {bit}")),
            ExpectedRepr::Marker(marker) => match marker.as_str() {
                "Q" => Ok(Expected::Hold),
                "invalid" => Ok(Expected::Invalid),
                "x" => Ok(Expected::DontCare),
                _ => Err(format!("unknown truth table marker {marker:?}")),
            },
        }
    }
}

impl From<Expected> for ExpectedRepr {
    fn from(expected: Expected) -> Self {
        match expected {
            Expected::Low => ExpectedRepr::Bit(0),
            Expected::High => ExpectedRepr::Bit(1),
            marker => ExpectedRepr::Marker(marker.to_string()),
        }
    }
}

/// Rows of a truth table. Each row is `[inputs] => [outputs]`, inputs as
/// `0`/`1`, outputs as `0`/`1` or an [`Expected`] marker.
///
/// ```
/// use logicgrid::level::Expected;
/// use logicgrid::truth_table;
///
/// let rows = truth_table![
///     [0, 0] => [Expected::Hold],
///     [1, 0] => [1],
/// ];
/// assert_eq!(rows[1], (vec![true, false], vec![Expected::High]));
/// ```
#[macro_export]
macro_rules! truth_table {
    ( $( [ $( $input:expr ),* ] => [ $( $output:expr ),* ] ),* $(,)? ) => {
        vec![ $( (
            vec![ $( $input != 0 ),* ],
            vec![ $( $crate::level::Expected::from($output) ),* ],
        ) ),* ]
    };
}

/// A puzzle: named ports and the truth table a circuit must satisfy.
///
/// Rows absent from the table are not checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LevelRecord", into = "LevelRecord")]
pub struct Level {
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    table: BTreeMap<Vec<bool>, Vec<Expected>>,
    unlocked: bool,
}

impl Level {
    pub fn new<S, R>(
        name: impl Into<String>,
        inputs: &[S],
        outputs: &[S],
        rows: R,
    ) -> Result<Self, LevelError>
    where
        S: AsRef<str>,
        R: IntoIterator<Item = (Vec<bool>, Vec<Expected>)>,
    {
        let inputs: Vec<String> = inputs.iter().map(|name| name.as_ref().to_string()).collect();
        let outputs: Vec<String> = outputs.iter().map(|name| name.as_ref().to_string()).collect();
        if inputs.len() > MAX_INPUTS {
            return Err(LevelError::TooManyInputs {
                max: MAX_INPUTS,
                actual: inputs.len(),
            });
        }

        let mut table = BTreeMap::new();
        for (row, (bits, expected)) in rows.into_iter().enumerate() {
            if bits.len() != inputs.len() {
                return Err(LevelError::RowWidth {
                    row,
                    side: "input",
                    expected: inputs.len(),
                    actual: bits.len(),
                });
            }
            if expected.len() != outputs.len() {
                return Err(LevelError::RowWidth {
                    row,
                    side: "output",
                    expected: outputs.len(),
                    actual: expected.len(),
                });
            }
            if table.contains_key(&bits) {
                return Err(LevelError::DuplicateRow(bits));
            }
            table.insert(bits, expected);
        }

        Ok(Level {
            name: name.into(),
            inputs,
            outputs,
            table,
            unlocked: false,
        })
    }

    pub fn with_unlocked(mut self, unlocked: bool) -> Self {
        self.unlocked = unlocked;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn expected(&self, inputs: &[bool]) -> Option<&[Expected]> {
        self.table.get(inputs).map(Vec::as_slice)
    }

    /// Rows in lexicographic input order.
    pub fn rows(&self) -> impl Iterator<Item = (&[bool], &[Expected])> + '_ {
        self.table
            .iter()
            .map(|(inputs, outputs)| (inputs.as_slice(), outputs.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct LevelRecord {
    name: String,
    #[serde(default)]
    inputs: Vec<String>,
    #[serde(default)]
    outputs: Vec<String>,
    #[serde(default)]
    rows: Vec<RowRecord>,
    #[serde(default)]
    unlocked: bool,
}

#[derive(Serialize, Deserialize)]
struct RowRecord {
    inputs: Vec<u8>,
    outputs: Vec<Expected>,
}

impl TryFrom<LevelRecord> for Level {
    type Error = LevelError;

    fn try_from(record: LevelRecord) -> Result<Self, Self::Error> {
        let rows = record
            .rows
            .into_iter()
            .map(|row| {
                let bits = row
                    .inputs
                    .into_iter()
                    .map(|bit| match bit {
                        0 => Ok(false),
                        1 => Ok(true),
                        other => Err(LevelError::InvalidBit(other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((bits, row.outputs))
            })
            .collect::<Result<Vec<_>, LevelError>>()?;
        let level = Level::new(record.name, &record.inputs, &record.outputs, rows)?;
        Ok(level.with_unlocked(record.unlocked))
    }
}

impl From<Level> for LevelRecord {
    fn from(level: Level) -> Self {
        LevelRecord {
            name: level.name,
            inputs: level.inputs,
            outputs: level.outputs,
            rows: level
                .table
                .into_iter()
                .map(|(inputs, outputs)| RowRecord {
                    inputs: inputs.into_iter().map(u8::from).collect(),
                    outputs,
                })
                .collect(),
            unlocked: level.unlocked,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Expected, Level};
    use crate::error::LevelError;
    use crate::signal::Signal::*;

    #[test]
    fn markers_match() {
        assert!(Expected::Hold.matches(High, High));
        assert!(!Expected::Hold.matches(Low, High));
        assert!(Expected::Invalid.matches(Undefined, Low));
        assert!(!Expected::Low.matches(Undefined, Low));
        assert!(Expected::DontCare.matches(Undefined, Low));
    }

    #[test]
    fn rows_are_validated() {
        let err = Level::new("bad", &["A", "B"], &["F"], truth_table![[0] => [1]]).unwrap_err();
        assert_eq!(
            err,
            LevelError::RowWidth {
                row: 0,
                side: "input",
                expected: 2,
                actual: 1
            }
        );
        let table = truth_table![[0] => [1], [0] => [0]];
        let err = Level::new("dup", &["A"], &["F"], table).unwrap_err();
        assert_eq!(err, LevelError::DuplicateRow(vec![false]));
        let names: Vec<String> = (0..17).map(|i| format!("I{i}")).collect();
        assert!(matches!(
            Level::new("wide", &names, &names[..1], Vec::new()),
            Err(LevelError::TooManyInputs { max: 16, actual: 17 })
        ));
    }

    #[test]
    fn json_shape() {
        let level = Level::new(
            "latch",
            &["S", "R"],
            &["Q"],
            truth_table![[0, 0] => [Expected::Hold], [1, 1] => [Expected::Invalid], [1, 0] => [1]],
        )
        .unwrap();
        let json = serde_json::to_value(&level).unwrap();
        assert_eq!(json["rows"][0]["outputs"], serde_json::json!(["Q"]));
        assert_eq!(json["rows"][2]["outputs"], serde_json::json!(["invalid"]));
        assert_eq!(json["unlocked"], false);

        let parsed: Level = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, level);
        assert_eq!(parsed.expected(&[true, false]), Some(&[Expected::High][..]));

        let bad = serde_json::json!({
            "name": "x",
            "inputs": ["A"],
            "outputs": [],
            "rows": [{"inputs": [2], "outputs": []}]
        });
        assert!(serde_json::from_value::<Level>(bad).is_err());
    }
}
