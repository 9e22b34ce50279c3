//! Approximation algorithms for sorting by transpositions.
//!
//! Both drivers share one [`Engine`]: a loop that keeps applying the cheapest
//! sequence it can certify, each within 3/2 moves per unit of lower-bound
//! reduction, until the permutation is sorted. What differs between them is
//! whether the input is simplified first, which ways a component may grow,
//! and whether long oriented cycles get a (4,3)-sequence of their own.

pub mod elias_hartman;
pub mod extension;
pub mod silva;

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    cases::{CaseError, CaseLibrary},
    classifier::{
        bad_oriented_five_cycle_sequence, is_11_8, is_oriented, is_ratio_sequence, two_move_from_oriented_cycle,
        two_move_joining_even_length_cycles, two_two_sequence, validate_sorting, ClassifierError,
    },
    configuration::{Configuration, ConfigurationError},
    permutation::{Cycle, PermutationError},
    search::{search_with, Ratio, SearchContext, SearchError, SearchParams, RATIO_11_8, RATIO_3_2, RATIO_4_3},
    union_find::components,
};

use extension::{extend, seed, three_norm, Extension};

pub use elias_hartman::EliasHartman;
pub use silva::Silva;

/// Extensions tried on one component before it is given up on.
pub const MAX_EXTENSIONS: usize = 8;
/// Default lower bound at or below which the rest is searched exhaustively.
pub const EXACT_RESIDUAL_NORM: usize = 5;
/// Default largest 3-norm of a component searched live on a library miss.
pub const LIVE_SEARCH_NORM: usize = 4;
/// Ratio every sorting a driver returns is checked against. Steps taken from
/// (11,8)-cases do better, but the (3,2) steps bound the whole sorting.
pub const GUARANTEED_RATIO: Ratio = RATIO_3_2;
/// Combined 3-norm at which the components given up on are looked up together.
pub const BAD_COMPONENTS_NORM: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SortError {
    #[error(transparent)]
    Input(#[from] PermutationError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("no certified sequence applies to {key}")]
    Stuck { key: String },
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Case(#[from] CaseError),
}

/// The permutation a driver actually sorted and the moves it used.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortOutcome {
    pub permutation: Cycle,
    pub moves: Vec<Cycle>,
}

impl SortOutcome {
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

pub trait SortingAlgorithm {
    fn name(&self) -> &'static str;

    /// Sorts the arrangement `pi` of `0..n`.
    fn sort(&self, pi: &Cycle) -> Result<SortOutcome, SortError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriverParams {
    /// Lower bound at or below which the rest is solved by exhaustive search.
    pub exact_residual_norm: usize,
    /// Largest 3-norm of a component searched live when the library misses.
    pub live_search_norm: usize,
    pub max_extensions: usize,
}

impl Default for DriverParams {
    fn default() -> Self {
        DriverParams {
            exact_residual_norm: EXACT_RESIDUAL_NORM,
            live_search_norm: LIVE_SEARCH_NORM,
            max_extensions: MAX_EXTENSIONS,
        }
    }
}

/// A component that stopped growing without yielding a sequence, and the
/// `spi` cycles it touched when it was given up on.
#[derive(Debug, Clone)]
struct BadComponent {
    segments: Vec<Cycle>,
    cycles: Vec<Cycle>,
}

enum Growth {
    Applied,
    GaveUp,
    NoSeed,
}

/// What distinguishes the drivers inside the shared loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Strategy {
    pub extensions: &'static [Extension],
    pub long_oriented_cycles: bool,
}

pub(crate) struct Engine<'a> {
    library: &'a CaseLibrary,
    params: &'a DriverParams,
    strategy: Strategy,
    config: Configuration,
    moves: Vec<Cycle>,
    bad: Vec<BadComponent>,
    failed_exact: Option<usize>,
    ctx: SearchContext,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(
        library: &'a CaseLibrary,
        params: &'a DriverParams,
        strategy: Strategy,
        config: Configuration,
    ) -> Self {
        Engine {
            library,
            params,
            strategy,
            config,
            moves: Vec::new(),
            bad: Vec::new(),
            failed_exact: None,
            ctx: SearchContext::new(),
        }
    }

    /// Sorts the configuration, returning a sorting checked to be within
    /// [`GUARANTEED_RATIO`] of its lower bound.
    pub(crate) fn run(mut self) -> Result<Vec<Cycle>, SortError> {
        let start = self.config.clone();

        if !self.config.is_sorted() && !self.exact()? {
            if let Some(opening) = two_two_sequence(self.config.spi(), self.config.pi()) {
                debug!("opening 2-2 sequence");
                self.apply(&opening)?;
            }
        }

        while !self.config.is_sorted() {
            trace!(lower_bound = self.config.lower_bound(), "{}", self.config);
            if self.exact()? || self.two_move()? {
                continue;
            }
            if self.strategy.long_oriented_cycles && self.long_oriented_cycle()? {
                continue;
            }
            self.bad.retain(|b| {
                b.cycles.iter().all(|c| self.config.spi().cycles().contains(c))
            });
            if self.bad_components()? {
                continue;
            }
            match self.grow_component()? {
                Growth::Applied | Growth::GaveUp => continue,
                Growth::NoSeed => {}
            }
            if self.three_two()? {
                continue;
            }
            return Err(SortError::Stuck {
                key: self.config.key().to_string(),
            });
        }

        validate_sorting(&start, &self.moves, GUARANTEED_RATIO)?;
        Ok(self.moves)
    }

    fn apply(&mut self, sequence: &[Cycle]) -> Result<(), SortError> {
        for rho in sequence {
            self.config = self.config.apply_transposition(rho)?;
            self.moves.push(rho.clone());
        }
        Ok(())
    }

    fn certifies(&self, sequence: &[Cycle], ratio: Ratio) -> bool {
        is_ratio_sequence(self.config.spi(), self.config.pi(), sequence, ratio)
    }

    /// Solves the rest exhaustively once the lower bound is small enough.
    ///
    /// A failed attempt is retried only after the lower bound drops below it.
    fn exact(&mut self) -> Result<bool, SortError> {
        let lower_bound = self.config.lower_bound();
        if lower_bound > self.params.exact_residual_norm || self.failed_exact.is_some_and(|f| lower_bound >= f) {
            return Ok(false);
        }
        match search_with(&self.config, &SearchParams::sort(RATIO_3_2), &mut self.ctx) {
            Ok(sequence) => {
                debug!(moves = sequence.len(), lower_bound, "exact residual sorting");
                self.apply(&sequence.moves)?;
                Ok(true)
            }
            Err(err) => {
                debug!(%err, "exact residual search failed");
                self.failed_exact = Some(lower_bound);
                Ok(false)
            }
        }
    }

    fn two_move(&mut self) -> Result<bool, SortError> {
        let (spi, pi) = (self.config.spi(), self.config.pi());
        let rho = two_move_joining_even_length_cycles(spi, pi)
            .filter(|rho| self.certifies(std::slice::from_ref(rho), RATIO_3_2))
            .or_else(|| two_move_from_oriented_cycle(spi, pi));
        match rho {
            Some(rho) => {
                debug!(%rho, "2-move");
                self.apply(&[rho])?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// A (4,3)-sequence inside an oriented cycle longer than five.
    fn long_oriented_cycle(&mut self) -> Result<bool, SortError> {
        let long: Vec<Cycle> = self
            .config
            .spi()
            .cycles()
            .iter()
            .filter(|c| c.len() > 5 && is_oriented(self.config.pi(), c))
            .cloned()
            .collect();
        for cycle in long {
            let sub = Configuration::sub_configuration([&cycle], self.config.pi())?;
            let mut found = self
                .library
                .lookup(&sub, RATIO_11_8)
                .filter(|moves| self.certifies(moves, RATIO_4_3));
            if found.is_none() && sub.three_norm() <= self.params.live_search_norm {
                found = search_with(&sub, &SearchParams::progress(RATIO_4_3), &mut self.ctx)
                    .ok()
                    .map(|s| s.moves)
                    .filter(|moves| self.certifies(moves, RATIO_4_3));
            }
            if let Some(moves) = found {
                debug!(%cycle, moves = moves.len(), "(4,3)-sequence on a long oriented cycle");
                self.apply(&moves)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// An (11,8)-sequence for `segments`, from the library or a live search.
    fn component_sequence(&mut self, segments: &[Cycle]) -> Result<Option<Vec<Cycle>>, SortError> {
        let sub = Configuration::sub_configuration(segments, self.config.pi())?;
        if let Some(moves) = self.library.lookup(&sub, RATIO_11_8) {
            if is_11_8(self.config.spi(), self.config.pi(), &moves) {
                debug!(key = %sub.key(), "library hit");
                return Ok(Some(moves));
            }
        }
        if sub.three_norm() > self.params.live_search_norm {
            return Ok(None);
        }
        let Ok(sequence) = search_with(&sub, &SearchParams::progress(RATIO_11_8), &mut self.ctx) else {
            debug!(key = %sub.key(), "library miss, no live sequence");
            return Ok(None);
        };
        if !is_11_8(self.config.spi(), self.config.pi(), &sequence.moves) {
            return Ok(None);
        }
        let stored = self.library.insert(&sub, &sequence.moves, RATIO_11_8)?;
        debug!(key = %sub.key(), stored, "library miss, live sequence");
        Ok(Some(sequence.moves))
    }

    fn grow_component(&mut self) -> Result<Growth, SortError> {
        let spi = self.config.spi().clone();
        let pi = self.config.pi().clone();
        let covered = |c: &Cycle| self.bad.iter().any(|b| b.cycles.contains(c));
        let Some(start) = components(&spi, &pi)
            .iter()
            .flat_map(|component| component.cycles().to_vec())
            .find(|c| c.len() >= 3 && !covered(c))
            .as_ref()
            .and_then(seed)
        else {
            return Ok(Growth::NoSeed);
        };

        let mut segments = vec![start];
        for _ in 0..self.params.max_extensions {
            let Some(grown) = extend(&segments, &spi, &pi, self.strategy.extensions) else {
                break;
            };
            if three_norm(&grown.component) <= three_norm(&segments) {
                break;
            }
            trace!(kind = ?grown.kind, norm = three_norm(&grown.component), "extended");
            segments = grown.component;
            if let Some(moves) = self.component_sequence(&segments)? {
                self.apply(&moves)?;
                return Ok(Growth::Applied);
            }
        }

        let cycles = spi
            .cycles()
            .iter()
            .filter(|c| segments.iter().any(|s| s.symbols().iter().any(|&x| c.contains(x))))
            .cloned()
            .collect();
        debug!(norm = three_norm(&segments), "component given up on");
        self.bad.push(BadComponent { segments, cycles });
        Ok(Growth::GaveUp)
    }

    /// Looks up the components given up on together, dropping the oldest on
    /// every retry while their combined 3-norm stays large enough.
    fn bad_components(&mut self) -> Result<bool, SortError> {
        for skip in 0..self.bad.len() {
            let mut combined: Vec<Cycle> = Vec::new();
            for segment in self.bad[skip..].iter().flat_map(|b| &b.segments) {
                let overlaps = combined
                    .iter()
                    .any(|c| segment.symbols().iter().any(|&x| c.contains(x)));
                if !overlaps {
                    combined.push(segment.clone());
                }
            }
            if three_norm(&combined) < BAD_COMPONENTS_NORM {
                break;
            }
            let sub = Configuration::sub_configuration(&combined, self.config.pi())?;
            if let Some(moves) = self.library.lookup(&sub, RATIO_11_8) {
                if is_11_8(self.config.spi(), self.config.pi(), &moves) {
                    debug!(components = self.bad.len() - skip, "combined bad components");
                    self.apply(&moves)?;
                    self.bad.clear();
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// A (3,2)-sequence: a stored case for a whole component, the bad oriented
    /// 5-cycle pattern, or a search on the whole configuration.
    fn three_two(&mut self) -> Result<bool, SortError> {
        for component in components(self.config.spi(), self.config.pi()) {
            let sub = Configuration::sub_configuration(component.cycles(), self.config.pi())?;
            if let Some(moves) = self.library.lookup(&sub, RATIO_3_2) {
                if self.certifies(&moves, RATIO_3_2) {
                    debug!(key = %sub.key(), "(3,2)-sequence from the library");
                    self.apply(&moves)?;
                    return Ok(true);
                }
            }
        }
        if let Some(moves) = bad_oriented_five_cycle_sequence(self.config.spi(), self.config.pi()) {
            debug!("(3,2)-sequence on a bad oriented 5-cycle");
            self.apply(&moves)?;
            return Ok(true);
        }
        match search_with(&self.config, &SearchParams::progress(RATIO_3_2), &mut self.ctx) {
            Ok(sequence) => {
                debug!(moves = sequence.len(), "(3,2)-sequence by search");
                self.apply(&sequence.moves)?;
                Ok(true)
            }
            Err(err) => {
                debug!(%err, "no (3,2)-sequence");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, OnceLock};

    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::*;

    pub(crate) fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    pub(crate) fn standard_library() -> Arc<CaseLibrary> {
        static LIBRARY: OnceLock<Arc<CaseLibrary>> = OnceLock::new();
        LIBRARY
            .get_or_init(|| Arc::new(CaseLibrary::standard().unwrap()))
            .clone()
    }

    fn drivers(params: DriverParams) -> Vec<Box<dyn SortingAlgorithm>> {
        let library = standard_library();
        let eh: Box<dyn SortingAlgorithm> = Box::new(EliasHartman::new(library.clone()).with_params(params.clone()));
        vec![eh, Box::new(Silva::new(library).with_params(params))]
    }

    #[test]
    fn test_known_distances() {
        init_tracing();
        for driver in drivers(DriverParams::default()) {
            let outcome = driver.sort(&"0 4 8 3 7 2 6 1 5 9 14 13 12 11 10".parse().unwrap()).unwrap();
            assert_eq!(outcome.len(), 7, "{}", driver.name());

            let outcome = driver.sort(&"0 3 2 1".parse().unwrap()).unwrap();
            assert_eq!(outcome.len(), 2, "{}", driver.name());

            let outcome = driver.sort(&"0 1 2 3".parse().unwrap()).unwrap();
            assert!(outcome.is_empty());
        }
    }

    #[test]
    fn test_known_distances_without_exact_search() {
        init_tracing();
        let params = DriverParams {
            exact_residual_norm: 0,
            ..Default::default()
        };
        let cases = [
            ("0 4 8 3 7 2 6 1 5 9 14 13 12 11 10", 7),
            ("0 3 2 1", 2),
            ("0 5 4 3 2 1", 3),
            ("0 5 4 3 2 1 6 11 10 9 8 7", 6),
            ("0 4 3 2 1", 3),
            ("0 3 6 2 5 1 4", 4),
        ];
        for driver in drivers(params.clone()) {
            for (pi, distance) in cases {
                let outcome = driver.sort(&pi.parse().unwrap()).unwrap();
                assert_eq!(outcome.len(), distance, "{} on {pi}", driver.name());
            }
            assert!(driver.sort(&"0 1 2 3".parse().unwrap()).unwrap().is_empty());
        }

        let silva = Silva::new(standard_library()).with_params(params);
        assert_eq!(silva.sort(&"0 4 3 2 1 8 7 6 5".parse().unwrap()).unwrap().len(), 4);
    }

    #[test]
    fn test_random_arrangements_stay_within_three_halves() {
        init_tracing();
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for exact_residual_norm in [0, 2] {
            let params = DriverParams {
                exact_residual_norm,
                ..Default::default()
            };
            for driver in drivers(params) {
                for _ in 0..6 {
                    let n = rng.gen_range(8..=12);
                    let pi = Cycle::random_arrangement(n, &mut rng).unwrap();
                    let outcome = driver.sort(&pi).unwrap();
                    let config = Configuration::of_permutation(&outcome.permutation).unwrap();
                    assert_eq!(
                        validate_sorting(&config, &outcome.moves, GUARANTEED_RATIO),
                        Ok(()),
                        "{} on {pi}",
                        driver.name()
                    );
                    assert!(GUARANTEED_RATIO.allows(outcome.len(), config.lower_bound()));
                }
            }
        }
    }

    #[test]
    fn test_default_params() {
        let params = DriverParams::default();
        assert_eq!(params.exact_residual_norm, EXACT_RESIDUAL_NORM);
        assert_eq!(params.live_search_norm, LIVE_SEARCH_NORM);
        assert_eq!(params.max_extensions, MAX_EXTENSIONS);
    }

    #[test]
    fn test_standard_library_covers_every_admitted_class() {
        let library = standard_library();
        assert!(library.table_len(RATIO_3_2) > 0);
        assert!(library.table_len(RATIO_11_8) >= 69);
        let witness = Configuration::from_spi("(0 4 2)(1 5 3)".parse().unwrap()).unwrap();
        let moves = library.lookup(&witness, RATIO_3_2).unwrap();
        assert_eq!(moves.len(), 3);
        assert_eq!(validate_sorting(&witness, &moves, RATIO_3_2), Ok(()));
    }

    #[test]
    fn test_rejects_sparse_input() {
        for driver in drivers(DriverParams::default()) {
            assert!(matches!(
                driver.sort(&"0 2 5".parse().unwrap()),
                Err(SortError::Configuration(ConfigurationError::NotDense(_)))
            ));
        }
    }
}
