//! Simplification: breaking every `spi` cycle longer than three.
//!
//! Each round inserts one fresh symbol into the arrangement so that a long
//! cycle splits into a 3-cycle and a cycle two shorter, without changing the
//! lower bound. A sorting of the simplified permutation projects back onto the
//! original by dropping the inserted symbols.

use tracing::debug;

use crate::{
    configuration::ConfigurationError,
    permutation::{compute_product, Cycle, MulticyclePermutation, PermutationError, Symbol},
};

/// A simplified arrangement and where its symbols come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simplification {
    /// Arrangement over `0..m`, starting at `0`, whose `spi` has no cycle
    /// longer than three.
    pub permutation: Cycle,
    /// `origin[s]` is the symbol of the input that `s` stands for, `None` for
    /// inserted symbols.
    pub origin: Vec<Option<Symbol>>,
}

impl Simplification {
    pub fn inserted(&self) -> usize {
        self.origin.iter().filter(|o| o.is_none()).count()
    }
}

/// Simplifies the arrangement `pi` of `0..n`.
///
/// # Examples
///
/// ```
/// use sbtkit::{permutation::Cycle, simplification::simplify};
///
/// let pi: Cycle = "0 4 3 2 1 8 7 6 5".parse().unwrap();
/// let simple = simplify(&pi).unwrap();
/// assert_eq!(simple.permutation, "0 5 4 3 2 1 6 11 10 9 8 7".parse().unwrap());
/// assert_eq!(simple.inserted(), 3);
/// ```
pub fn simplify(pi: &Cycle) -> Result<Simplification, ConfigurationError> {
    if pi.max_symbol() + 1 != pi.len() {
        return Err(ConfigurationError::NotDense(pi.to_string()));
    }
    let mut arrangement = pi.symbols().to_vec();
    let mut origin: Vec<Option<Symbol>> = (0..pi.len()).map(Some).collect();

    loop {
        let spi = MulticyclePermutation::sigma_pi_inverse(&Cycle::from_trusted(arrangement.clone()))?;
        let Some(long) = spi.cycles().iter().find(|c| c.len() > 3) else {
            break;
        };
        let Some(left) = arrangement.iter().skip(1).position(|&s| long.contains(s)).map(|i| i + 1) else {
            break;
        };
        let before = arrangement[left - 1];
        let target = long.pow(arrangement[left], -2);
        let Some(at) = arrangement.iter().position(|&s| s == target) else {
            break;
        };

        for s in arrangement.iter_mut() {
            if *s > before {
                *s += 1;
            }
        }
        arrangement.insert(at, before + 1);
        origin.insert(before + 1, None);
    }

    if let Some(zero) = arrangement.iter().position(|&s| s == 0) {
        arrangement.rotate_left(zero);
    }
    let simplification = Simplification {
        permutation: Cycle::from_trusted(arrangement),
        origin,
    };
    debug!(
        inserted = simplification.inserted(),
        "simplified {pi} to {}", simplification.permutation
    );
    Ok(simplification)
}

/// Maps `moves`, a sorting of `simplification.permutation`, to a sorting of
/// `original`.
///
/// Each move is replayed on the simplified arrangement and the result is
/// projected onto the original symbols. Consecutive projections differ by a
/// transposition or not at all; the latter steps are dropped.
pub fn desimplify_sorting(
    original: &Cycle,
    simplification: &Simplification,
    moves: &[Cycle],
) -> Result<Vec<Cycle>, PermutationError> {
    let origin = &simplification.origin;
    let project = |arrangement: &Cycle| -> Result<Cycle, PermutationError> {
        Cycle::new(
            arrangement
                .symbols()
                .iter()
                .filter_map(|&s| origin.get(s).copied().flatten())
                .collect(),
        )
    };

    let mut current = simplification.permutation.clone();
    let mut previous = original.clone();
    let mut mimicked = Vec::with_capacity(moves.len());
    for rho in moves {
        current = current.apply_transposition(rho)?;
        let next = project(&current)?;
        let step = compute_product(false, &[&next, previous.inverse()]);
        match step.cycles() {
            [] => {}
            [transposition] if transposition.len() == 3 => mimicked.push(transposition.clone()),
            _ => return Err(PermutationError::NotASingleCycle(step.to_string())),
        }
        previous = next;
    }
    Ok(mimicked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classifier::validate_sorting,
        configuration::Configuration,
        search::{search, SearchParams, RATIO_3_2},
    };

    fn cycle(s: &str) -> Cycle {
        s.parse().unwrap()
    }

    #[test]
    fn test_simplify_scenarios() {
        let simple = simplify(&cycle("0 3 6 2 5 1 4 10 9 8 7")).unwrap();
        similar_asserts::assert_eq!(
            simple.permutation.symbols(),
            cycle("0 4 8 3 7 2 6 1 5 9 14 13 12 11 10").symbols()
        );
        assert_eq!(simple.inserted(), 4);

        let simple = simplify(&cycle("0 4 3 2 1 8 7 6 5")).unwrap();
        similar_asserts::assert_eq!(
            simple.permutation.symbols(),
            cycle("0 5 4 3 2 1 6 11 10 9 8 7").symbols()
        );
    }

    #[test]
    fn test_simplification_keeps_the_lower_bound() {
        for pi in ["0 3 6 2 5 1 4 10 9 8 7", "0 4 3 2 1 8 7 6 5", "0 3 2 1"] {
            let original = Configuration::of_permutation(&cycle(pi)).unwrap();
            let simple = simplify(&cycle(pi)).unwrap();
            let simplified = Configuration::of_permutation(&simple.permutation).unwrap();
            assert_eq!(simplified.lower_bound(), original.lower_bound(), "{pi}");
            assert!(simplified.spi().cycles().iter().all(|c| c.len() <= 3));

            let kept: Vec<_> = simple.origin.iter().flatten().copied().collect();
            assert_eq!(kept, (0..original.size()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_simple_input_is_unchanged() {
        let simple = simplify(&cycle("0 3 2 1")).unwrap();
        assert_eq!(simple.permutation, cycle("0 3 2 1"));
        assert_eq!(simple.inserted(), 0);
        assert!(matches!(
            simplify(&cycle("0 2 5")),
            Err(ConfigurationError::NotDense(_))
        ));
    }

    #[test]
    fn test_desimplified_sorting_sorts_the_original() {
        let original = cycle("0 3 6 2 5 1 4 10 9 8 7");
        let simple = simplify(&original).unwrap();
        let simplified = Configuration::of_permutation(&simple.permutation).unwrap();
        let sorting = search(&simplified, &SearchParams::default()).unwrap();
        assert_eq!(sorting.len(), 7);

        let mimicked = desimplify_sorting(&original, &simple, &sorting.moves).unwrap();
        assert!(mimicked.len() <= 7);
        let config = Configuration::of_permutation(&original).unwrap();
        assert_eq!(validate_sorting(&config, &mimicked, RATIO_3_2), Ok(()));
    }
}
