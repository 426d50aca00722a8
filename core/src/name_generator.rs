//! Display names for fixture records.
//!
//! A random first/last pair reads naturally in failure output, and the
//! sequence suffix keeps every generated name unique within a registry,
//! so no two records ever collide on a display attribute by accident.

use crate::rng::FixtureRng;

pub struct NameGenerator;

impl NameGenerator {
    /// "First Last <seq>", unique per sequence number.
    pub fn sequenced_full_name(rng: &mut FixtureRng, sequence: u64) -> String {
        format!("{} {} {sequence}", Self::first_name(rng), Self::last_name(rng))
    }

    pub fn first_name(rng: &mut FixtureRng) -> &'static str {
        rng.pick(FIRST_NAMES).copied().unwrap_or("Alex")
    }

    pub fn last_name(rng: &mut FixtureRng) -> &'static str {
        rng.pick(LAST_NAMES).copied().unwrap_or("Doe")
    }
}

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bea", "Cyrus", "Dana", "Eli", "Farah", "Gus", "Hana", "Ines", "Jonah",
    "Kai", "Lena", "Milo", "Nadia", "Omar", "Pia", "Quinn", "Rosa", "Sami", "Theo",
    "Uma", "Vera", "Wes", "Xena", "Yusuf", "Zoe",
];

const LAST_NAMES: &[&str] = &[
    "Abbott", "Brandt", "Castillo", "Dubois", "Eriksen", "Fischer", "Gallo", "Haddad",
    "Ibsen", "Jansen", "Kowalski", "Lindqvist", "Moreau", "Nakamura", "Okafor",
    "Petrov", "Quintero", "Rossi", "Suzuki", "Tanaka", "Ueda", "Varga", "Walsh",
    "Yilmaz", "Zielinski",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, StreamSlot};
    use std::collections::HashSet;

    #[test]
    fn name_generation_is_deterministic() {
        let mut rng1 = RngBank::new(12345).for_stream(StreamSlot::Values);
        let mut rng2 = RngBank::new(12345).for_stream(StreamSlot::Values);
        assert_eq!(
            NameGenerator::sequenced_full_name(&mut rng1, 1),
            NameGenerator::sequenced_full_name(&mut rng2, 1),
        );
    }

    #[test]
    fn sequenced_names_never_collide() {
        let mut rng = RngBank::new(99).for_stream(StreamSlot::Values);
        let names: HashSet<String> = (1..=500)
            .map(|seq| NameGenerator::sequenced_full_name(&mut rng, seq))
            .collect();
        assert_eq!(names.len(), 500);
    }
}
