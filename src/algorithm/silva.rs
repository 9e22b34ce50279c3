//! The 11/8 algorithm of Silva et al., working on the permutation as given.
//!
//! Without simplification, long cycles stay whole. Components may therefore
//! also grow along a cycle they hold only part of, and an oriented cycle longer
//! than five is first given a chance at a (4,3)-sequence.

use std::sync::Arc;

use tracing::info_span;

use super::{DriverParams, Engine, SortError, SortOutcome, SortingAlgorithm, Strategy};
use crate::{
    algorithm::extension::Extension, cases::CaseLibrary, configuration::Configuration, permutation::Cycle,
};

const STRATEGY: Strategy = Strategy {
    extensions: &[Extension::Intersecting, Extension::Interleaving, Extension::Segment],
    long_oriented_cycles: true,
};

#[derive(Debug, Clone)]
pub struct Silva {
    library: Arc<CaseLibrary>,
    params: DriverParams,
}

impl Silva {
    pub fn new(library: Arc<CaseLibrary>) -> Self {
        Silva {
            library,
            params: DriverParams::default(),
        }
    }

    pub fn with_params(mut self, params: DriverParams) -> Self {
        self.params = params;
        self
    }
}

impl SortingAlgorithm for Silva {
    fn name(&self) -> &'static str {
        "Silva"
    }

    fn sort(&self, pi: &Cycle) -> Result<SortOutcome, SortError> {
        let _span = info_span!("silva", %pi).entered();
        let config = Configuration::of_permutation(pi)?;
        let moves = Engine::new(&self.library, &self.params, STRATEGY, config).run()?;
        Ok(SortOutcome {
            permutation: pi.clone(),
            moves,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{algorithm::tests::standard_library, classifier::validate_sorting, search::RATIO_3_2};

    #[test]
    fn test_long_oriented_cycle() {
        // A single oriented 7-cycle.
        let pi: Cycle = "0 3 6 2 5 1 4".parse().unwrap();
        let params = DriverParams {
            exact_residual_norm: 0,
            ..Default::default()
        };
        let outcome = Silva::new(standard_library()).with_params(params).sort(&pi).unwrap();
        assert_eq!(outcome.permutation, pi);
        let config = Configuration::of_permutation(&pi).unwrap();
        assert_eq!(validate_sorting(&config, &outcome.moves, RATIO_3_2), Ok(()));
        assert!(outcome.len() <= 4);
    }
}
