//! The 11/8 algorithm of Elias and Hartman.
//!
//! The input is simplified first, so every `spi` cycle has length at most
//! three and components grow by whole 3-cycles only.

use std::sync::Arc;

use tracing::info_span;

use super::{DriverParams, Engine, SortError, SortOutcome, SortingAlgorithm, Strategy, GUARANTEED_RATIO};
use crate::{
    algorithm::extension::Extension,
    cases::CaseLibrary,
    classifier::validate_sorting,
    configuration::Configuration,
    permutation::Cycle,
    simplification::{desimplify_sorting, simplify, Simplification},
};

const STRATEGY: Strategy = Strategy {
    extensions: &[Extension::Intersecting, Extension::Interleaving],
    long_oriented_cycles: false,
};

#[derive(Debug, Clone)]
pub struct EliasHartman {
    library: Arc<CaseLibrary>,
    params: DriverParams,
}

impl EliasHartman {
    pub fn new(library: Arc<CaseLibrary>) -> Self {
        EliasHartman {
            library,
            params: DriverParams::default(),
        }
    }

    pub fn with_params(mut self, params: DriverParams) -> Self {
        self.params = params;
        self
    }

    fn sort_simplified(&self, pi: &Cycle) -> Result<(Simplification, Vec<Cycle>), SortError> {
        let simplification = simplify(pi)?;
        let config = Configuration::of_permutation(&simplification.permutation)?;
        let moves = Engine::new(&self.library, &self.params, STRATEGY, config).run()?;
        Ok((simplification, moves))
    }

    /// Sorts `pi` itself, mapping the sorting of its simplification back.
    pub fn sort_original(&self, pi: &Cycle) -> Result<SortOutcome, SortError> {
        let _span = info_span!("elias_hartman", %pi).entered();
        let (simplification, moves) = self.sort_simplified(pi)?;
        let moves = desimplify_sorting(pi, &simplification, &moves)?;
        validate_sorting(&Configuration::of_permutation(pi)?, &moves, GUARANTEED_RATIO)?;
        Ok(SortOutcome {
            permutation: pi.clone(),
            moves,
        })
    }
}

impl SortingAlgorithm for EliasHartman {
    fn name(&self) -> &'static str {
        "Elias-Hartman"
    }

    /// Sorts the simplification of `pi`, which is what the outcome holds.
    fn sort(&self, pi: &Cycle) -> Result<SortOutcome, SortError> {
        let _span = info_span!("elias_hartman", %pi).entered();
        let (simplification, moves) = self.sort_simplified(pi)?;
        Ok(SortOutcome {
            permutation: simplification.permutation,
            moves,
        })
    }
}
