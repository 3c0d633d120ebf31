use std::collections::{HashMap, HashSet};

/// Names in use within one circuit.
///
/// Generated names are `base`, then `base 1`, `base 2`, ... picking the
/// smallest free index. `counters` tracks the highest index handed out per
/// base and shrinks again when that exact name is released.
#[derive(Debug, Default, Clone)]
pub struct NameRegistry {
    existing: HashSet<String>,
    counters: HashMap<String, u32>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.existing.contains(name)
    }

    pub fn len(&self) -> usize {
        self.existing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.existing.is_empty()
    }

    /// Reserves and returns a name derived from `base` that is not in use.
    pub fn generate_unique_name(&mut self, base: &str) -> String {
        if !self.existing.contains(base) {
            self.existing.insert(base.to_string());
            self.counters.entry(base.to_string()).or_insert(0);
            return base.to_string();
        }

        let mut index = 1;
        loop {
            let candidate = format!("{base} {index}");
            if !self.existing.contains(&candidate) {
                self.existing.insert(candidate.clone());
                let counter = self.counters.entry(base.to_string()).or_insert(0);
                *counter = (*counter).max(index);
                return candidate;
            }
            index += 1;
        }
    }

    /// Reserves `name` exactly. Returns false if it is already taken.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.existing.insert(name.to_string())
    }

    pub fn release_name(&mut self, name: &str) {
        if !self.existing.remove(name) {
            return;
        }
        if let Some((base, index)) = split_indexed(name) {
            match self.counters.get_mut(base) {
                Some(counter) if *counter == index => *counter -= 1,
                _ => (),
            }
        }
    }

    /// Highest index currently recorded for `base`.
    pub fn highest_index(&self, base: &str) -> u32 {
        self.counters.get(base).copied().unwrap_or(0)
    }
}

fn split_indexed(name: &str) -> Option<(&str, u32)> {
    let (base, suffix) = name.rsplit_once(' ')?;
    let index = suffix.parse().ok()?;
    Some((base, index))
}

#[cfg(test)]
mod test {
    use super::NameRegistry;

    #[test]
    fn picks_smallest_free_index() {
        let mut names = NameRegistry::new();
        assert_eq!(names.generate_unique_name("And"), "And");
        assert_eq!(names.generate_unique_name("And"), "And 1");
        assert_eq!(names.generate_unique_name("And"), "And 2");
        names.release_name("And 1");
        assert_eq!(names.generate_unique_name("And"), "And 1");
        names.release_name("And");
        assert_eq!(names.generate_unique_name("And"), "And");
    }

    #[test]
    fn counter_only_shrinks_from_the_top() {
        let mut names = NameRegistry::new();
        for _ in 0..4 {
            names.generate_unique_name("Input");
        }
        assert_eq!(names.highest_index("Input"), 3);
        names.release_name("Input 1");
        assert_eq!(names.highest_index("Input"), 3);
        names.release_name("Input 3");
        assert_eq!(names.highest_index("Input"), 2);
        // releasing twice is harmless
        names.release_name("Input 3");
        assert_eq!(names.highest_index("Input"), 2);
    }

    #[test]
    fn bases_with_spaces() {
        let mut names = NameRegistry::new();
        assert!(names.reserve("Half adder"));
        assert!(!names.reserve("Half adder"));
        assert_eq!(names.generate_unique_name("Half adder"), "Half adder 1");
        names.release_name("Half adder 1");
        assert_eq!(names.highest_index("Half adder"), 0);
        assert_eq!(names.len(), 1);
    }
}
