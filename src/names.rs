//! Random identifier generation.

use std::collections::HashSet;

use rand::Rng;

const WORDS: &[&str] = &[
    "big",
    "small",
    "llama",
    "bat",
    "horse",
    "Abaris",
    "abarthrosis",
    "abarticular",
    "abarticulation",
    "abas",
    "abase",
    "abased",
    "abasedly",
    "abasedness",
    "abasement",
    "abaser",
    "Abasgi",
    "abash",
    "abashed",
    "abashedly",
    "abashedness",
    "abashless",
    "abashlessly",
    "abashment",
    "abasia",
    "abasic",
    "abask",
    "Abassin",
    "abastardize",
    "abatable",
    "abate",
    "abatement",
    "abater",
    "abatis",
    "abatised",
    "abaton",
    "abator",
    "abattoir",
    "Abatua",
    "abature",
    "abave",
    "abaxial",
    "abaxile",
    "abaze",
    "abb",
    "Abba",
    "abbacomes",
    "abbacy",
    "Abbadide",
];

/// Draws made by [`fresh_name`] before giving up.
pub const MAX_NAME_DRAWS: usize = 16;

/// A `word_word` identifier.
pub fn random_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first = WORDS[rng.gen_range(0..WORDS.len())];
    let second = WORDS[rng.gen_range(0..WORDS.len())];
    format!("{first}_{second}")
}

/// A random name not among `taken`, or `None` after [`MAX_NAME_DRAWS`]
/// collisions.
pub fn fresh_name<'a, R: Rng + ?Sized>(
    rng: &mut R,
    taken: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let taken: HashSet<&str> = taken.into_iter().collect();
    (0..MAX_NAME_DRAWS)
        .map(|_| random_name(rng))
        .find(|name| !taken.contains(name.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_name_shape() {
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..100 {
            let name = random_name(&mut rng);
            let (a, b) = name.split_once('_').unwrap();
            assert!(WORDS.contains(&a));
            assert!(WORDS.contains(&b));
        }
    }

    #[test]
    fn test_fresh_name_avoids_taken() {
        let mut rng = SmallRng::seed_from_u64(5);
        let taken = vec!["big_big".to_string(), "bat_horse".to_string()];
        for _ in 0..100 {
            let name = fresh_name(&mut rng, taken.iter().map(String::as_str)).unwrap();
            assert!(!taken.contains(&name));
        }
    }

    #[test]
    fn test_fresh_name_exhausted() {
        let mut rng = SmallRng::seed_from_u64(5);
        let every: Vec<String> = WORDS
            .iter()
            .flat_map(|a| WORDS.iter().map(move |b| format!("{a}_{b}")))
            .collect();
        assert_eq!(fresh_name(&mut rng, every.iter().map(String::as_str)), None);
    }
}
