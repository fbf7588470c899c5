//! Option generation for multiple-choice rounds

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::answer::normalize_name;
use crate::catalog::{CandidatePool, Entity};
use crate::session::AnswerMode;

/// Option generation failures
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OptionError {
    /// Too few distinct names for the option count
    #[error("pool offers {available} distinct names but {needed} options are needed")]
    InsufficientPool {
        /// Options requested
        needed: usize,
        /// Distinct names available, the correct one included
        available: usize,
    },
}

/// Build the option set for a round
///
/// Free-text mode yields no options. Multiple choice yields exactly `n`
/// distinct names: the correct name once, plus `n - 1` decoys drawn without
/// replacement from the pool, in shuffled order.
///
/// # Errors
///
/// Returns [`OptionError::InsufficientPool`] when the pool can't supply
/// enough distinct decoys.
pub fn generate_options<R: Rng + ?Sized>(
    correct: &Entity,
    pool: &CandidatePool,
    mode: AnswerMode,
    rng: &mut R,
) -> Result<Vec<String>, OptionError> {
    let needed = match mode {
        AnswerMode::FreeText => return Ok(Vec::new()),
        AnswerMode::MultipleChoice(n) => n as usize,
    };

    let mut seen = HashSet::from([normalize_name(&correct.name)]);
    let decoys: Vec<&str> = pool
        .entries()
        .iter()
        .filter(|entry| seen.insert(normalize_name(&entry.name)))
        .map(|entry| entry.name.as_str())
        .collect();

    let available = decoys.len() + 1;
    if available < needed {
        return Err(OptionError::InsufficientPool { needed, available });
    }

    let mut options: Vec<String> = decoys
        .choose_multiple(rng, needed.saturating_sub(1))
        .map(|name| (*name).to_string())
        .collect();
    options.push(correct.name.clone());
    options.shuffle(rng);

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EntityRef;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entity(id: u32, name: &str) -> Entity {
        Entity {
            id,
            name: name.to_string(),
            image_url: Some(format!("https://img.test/{id}.png")),
            types: Vec::new(),
            height_decimeters: 1,
            weight_decigrams: 1,
        }
    }

    fn pool(names: &[&str]) -> CandidatePool {
        CandidatePool::new(names.iter().enumerate().map(|(i, name)| {
            let id = u32::try_from(i).unwrap() + 1;
            EntityRef::new(id, *name, format!("https://catalog.test/{id}"))
        }))
    }

    #[test]
    fn test_free_text_has_no_options() {
        let mut rng = StdRng::seed_from_u64(1);
        let options = generate_options(
            &entity(1, "bulbasaur"),
            &pool(&["bulbasaur", "ivysaur"]),
            AnswerMode::FreeText,
            &mut rng,
        )
        .unwrap();
        assert!(options.is_empty());
    }

    #[test]
    fn test_correct_name_exactly_once() {
        let names = [
            "bulbasaur", "ivysaur", "venusaur", "charmander", "charmeleon", "charizard",
        ];
        let pool = pool(&names);
        let correct = entity(4, "charmander");

        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let options =
                generate_options(&correct, &pool, AnswerMode::MultipleChoice(4), &mut rng)
                    .unwrap();

            assert_eq!(options.len(), 4);
            assert_eq!(options.iter().filter(|o| *o == "charmander").count(), 1);
            let distinct: HashSet<_> = options.iter().collect();
            assert_eq!(distinct.len(), 4);
            assert!(options.iter().all(|o| names.contains(&o.as_str())));
        }
    }

    #[test]
    fn test_exact_pool_gives_same_multiset() {
        let pool = pool(&["pikachu", "raichu", "pichu"]);
        let correct = entity(1, "pikachu");

        let mut expected = vec!["pichu", "pikachu", "raichu"];
        expected.sort_unstable();
        for seed in [3, 17, 99] {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut options =
                generate_options(&correct, &pool, AnswerMode::MultipleChoice(3), &mut rng)
                    .unwrap();
            options.sort_unstable();
            assert_eq!(options, expected);
        }
    }

    #[test]
    fn test_decoys_deduplicated_after_normalization() {
        let pool = pool(&["mr-mime", "Mr. Mime", "jynx"]);
        let correct = entity(1, "jynx");
        let mut rng = StdRng::seed_from_u64(5);

        let err = generate_options(&correct, &pool, AnswerMode::MultipleChoice(3), &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            OptionError::InsufficientPool {
                needed: 3,
                available: 2
            }
        );
    }

    #[test]
    fn test_same_seed_same_options() {
        let pool = pool(&["a", "b", "c", "d", "e", "f", "g"]);
        let correct = entity(1, "a");

        let first = generate_options(
            &correct,
            &pool,
            AnswerMode::MultipleChoice(5),
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        let second = generate_options(
            &correct,
            &pool,
            AnswerMode::MultipleChoice(5),
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        assert_eq!(first, second);
    }
}
