//! The built-in level catalog, easiest first.

use crate::error::LevelError;
use crate::level::{Expected, Level};
use crate::truth_table;

pub fn catalog() -> Result<Vec<Level>, LevelError> {
    Ok(vec![
        and()?.with_unlocked(true),
        or()?,
        not()?,
        xor()?.with_unlocked(true),
        half_adder()?,
        full_adder()?,
        mux2()?,
        mux4()?,
        priority_encoder()?,
        sr_latch()?,
        freeplay()?.with_unlocked(true),
    ])
}

/// Looks a level up by catalog position (starting at 1) or by name,
/// ignoring case.
pub fn find(query: &str) -> Result<Option<Level>, LevelError> {
    let levels = catalog()?;
    if let Ok(index) = query.parse::<usize>() {
        return Ok(index.checked_sub(1).and_then(|index| levels.into_iter().nth(index)));
    }
    Ok(levels
        .into_iter()
        .find(|level| level.name().eq_ignore_ascii_case(query)))
}

fn and() -> Result<Level, LevelError> {
    Level::new(
        "Level 1: AND",
        &["A", "B"],
        &["F"],
        truth_table![[0, 0] => [0], [0, 1] => [0], [1, 0] => [0], [1, 1] => [1]],
    )
}

fn or() -> Result<Level, LevelError> {
    Level::new(
        "Level 2: OR",
        &["A", "B"],
        &["F"],
        truth_table![[0, 0] => [0], [0, 1] => [1], [1, 0] => [1], [1, 1] => [1]],
    )
}

fn not() -> Result<Level, LevelError> {
    Level::new("Level 3: NOT", &["A"], &["F"], truth_table![[0] => [1], [1] => [0]])
}

fn xor() -> Result<Level, LevelError> {
    Level::new(
        "Level 4: XOR from basic gates",
        &["A", "B"],
        &["F"],
        truth_table![[0, 0] => [0], [0, 1] => [1], [1, 0] => [1], [1, 1] => [0]],
    )
}

fn half_adder() -> Result<Level, LevelError> {
    Level::new(
        "Level 5: Half adder",
        &["A", "B"],
        &["S", "C"],
        truth_table![
            [0, 0] => [0, 0],
            [0, 1] => [1, 0],
            [1, 0] => [1, 0],
            [1, 1] => [0, 1],
        ],
    )
}

fn full_adder() -> Result<Level, LevelError> {
    let rows = (0..8u8).map(|n| {
        let (a, b, cin) = (n >> 2 & 1, n >> 1 & 1, n & 1);
        let sum = a + b + cin;
        (
            vec![a == 1, b == 1, cin == 1],
            vec![Expected::from(sum & 1 == 1), Expected::from(sum >= 2)],
        )
    });
    Level::new("Level 6: Full adder", &["A", "B", "Cin"], &["S", "Cout"], rows)
}

fn mux2() -> Result<Level, LevelError> {
    Level::new(
        "Level 7: 2-input multiplexer",
        &["A", "B", "SEL"],
        &["F"],
        truth_table![
            [0, 0, 0] => [0],
            [0, 1, 0] => [0],
            [1, 0, 0] => [1],
            [1, 1, 0] => [1],
            [0, 0, 1] => [0],
            [0, 1, 1] => [1],
            [1, 0, 1] => [0],
            [1, 1, 1] => [1],
        ],
    )
}

// Spot checks only; the full table has 64 rows.
fn mux4() -> Result<Level, LevelError> {
    Level::new(
        "Level 8: 4-input multiplexer from sub-circuits",
        &["A", "B", "C", "D", "SEL1", "SEL0"],
        &["F"],
        truth_table![
            [0, 0, 0, 0, 0, 0] => [0],
            [0, 1, 0, 0, 0, 1] => [1],
            [1, 0, 0, 0, 0, 0] => [1],
            [0, 0, 1, 0, 1, 0] => [1],
            [0, 0, 0, 1, 1, 1] => [1],
            [1, 1, 1, 1, 0, 0] => [1],
            [0, 1, 1, 0, 1, 1] => [0],
        ],
    )
}

fn priority_encoder() -> Result<Level, LevelError> {
    let rows = (0..16u8).map(|n| {
        let bits: Vec<bool> = (0..4).rev().map(|i| n >> i & 1 == 1).collect();
        // Index of the highest set line, D0 when none is set.
        let index = bits.iter().position(|bit| *bit).map_or(0, |first| 3 - first);
        (
            bits,
            vec![Expected::from(index & 2 != 0), Expected::from(index & 1 != 0)],
        )
    });
    Level::new(
        "Level 9: 4-bit priority encoder",
        &["D3", "D2", "D1", "D0"],
        &["F1", "F0"],
        rows,
    )
}

fn sr_latch() -> Result<Level, LevelError> {
    Level::new(
        "Level 10: SR latch",
        &["S", "R"],
        &["Q"],
        truth_table![
            [0, 0] => [Expected::Hold],
            [0, 1] => [0],
            [1, 0] => [1],
            [1, 1] => [Expected::Invalid],
        ],
    )
}

fn freeplay() -> Result<Level, LevelError> {
    let none: &[&str] = &[];
    Level::new("Freeplay", none, none, Vec::new())
}

#[cfg(test)]
mod test {
    use super::{catalog, find};
    use crate::level::Expected;

    #[test]
    fn catalog_builds() {
        let levels = catalog().unwrap();
        assert_eq!(levels.len(), 11);
        let unlocked: Vec<&str> = levels
            .iter()
            .filter(|level| level.is_unlocked())
            .map(|level| level.name())
            .collect();
        assert_eq!(unlocked, ["Level 1: AND", "Level 4: XOR from basic gates", "Freeplay"]);
        assert!(levels[10].is_empty());
    }

    #[test]
    fn generated_tables() {
        let full_adder = find("6").unwrap().unwrap();
        assert_eq!(full_adder.len(), 8);
        assert_eq!(
            full_adder.expected(&[true, false, true]),
            Some(&[Expected::Low, Expected::High][..])
        );

        let encoder = find("level 9: 4-bit priority encoder").unwrap().unwrap();
        assert_eq!(encoder.expected(&[false, false, false, false]), Some(&[Expected::Low; 2][..]));
        assert_eq!(
            encoder.expected(&[false, false, true, true]),
            Some(&[Expected::Low, Expected::High][..])
        );
        assert_eq!(
            encoder.expected(&[false, true, false, true]),
            Some(&[Expected::High, Expected::Low][..])
        );
        assert_eq!(encoder.expected(&[true, false, false, false]), Some(&[Expected::High; 2][..]));

        assert!(find("0").unwrap().is_none());
        assert!(find("12").unwrap().is_none());
    }
}
