//! Filling a case table by enumerating arrangements of a cycle family.

use std::sync::{Mutex, PoisonError};

use ahash::AHashSet;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info_span, warn};

use super::{Case, CaseError, CaseStore};
use crate::{
    classifier::{check_ratio_sequence, is_oriented, MAX_OPEN_GATES},
    configuration::{CanonicalKey, Configuration, ConfigurationError},
    permutation::{Cycle, MulticyclePermutation, Permutation},
    search::{search_with, Ratio, SearchContext, SearchParams, RATIO_3_2},
};

/// Which arrangements of a family are kept, judged on its cycles of length
/// three or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    #[default]
    Any,
    /// Every such cycle is oriented.
    Oriented,
    /// No such cycle is oriented.
    Unoriented,
}

impl Orientation {
    fn admits(self, config: &Configuration) -> bool {
        let mut long = config.spi().non_trivial_cycles().filter(|c| c.len() >= 3);
        match self {
            Orientation::Any => true,
            Orientation::Oriented => long.all(|c| is_oriented(config.pi(), c)),
            Orientation::Unoriented => !long.any(|c| is_oriented(config.pi(), c)),
        }
    }
}

/// An `spi` over `0..n` whose arrangements are enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    pub spi: MulticyclePermutation,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationParams {
    pub ratio: Ratio,
    /// Fail with [`CaseError::Unsolved`] if some class has no sequence.
    pub strict: bool,
    pub max_open_gates: usize,
    /// Node limit of each search.
    pub max_nodes: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            ratio: RATIO_3_2,
            strict: true,
            max_open_gates: MAX_OPEN_GATES,
            max_nodes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Arrangements enumerated, before any filtering.
    pub arrangements: usize,
    /// Distinct canonical classes that passed the filters.
    pub classes: usize,
    /// Classes newly stored.
    pub stored: usize,
    /// Classes the store already held.
    pub known: usize,
    /// Classes without a sequence within the ratio, by key.
    pub unsolved: Vec<CanonicalKey>,
}

fn admissible(family: &Family, pi: Cycle, max_open_gates: usize) -> Option<Configuration> {
    let config = Configuration::new(family.spi.clone(), pi).ok()?;
    (family.orientation.admits(&config) && config.open_gates().len() <= max_open_gates).then_some(config)
}

/// Enumerates every arrangement of the symbols of `family.spi`, keeps one
/// configuration per canonical class, and stores a `params.ratio`-sequence
/// for each class the store lacks.
///
/// Classes are searched in parallel; insertion into `store` happens afterwards
/// in key order, so the outcome does not depend on scheduling. In strict mode
/// nothing is stored unless every class has a sequence.
pub fn generate<S: CaseStore + Sync>(
    store: &S,
    family: &Family,
    params: &GenerationParams,
) -> Result<GenerationReport, CaseError> {
    let _span = info_span!("generate", spi = %family.spi, ratio = %params.ratio).entered();
    let n = family.spi.max_symbol().map_or(0, |m| m + 1);
    let arrangements = Permutation::generate_all(&Permutation::symmetric_group_generators(n))
        .map_err(ConfigurationError::from)?;

    let seen: Mutex<AHashSet<CanonicalKey>> = Mutex::new(AHashSet::new());
    let classes: Vec<Configuration> = arrangements
        .par_iter()
        .filter_map(|p| {
            let pi = Cycle::new(p.map().to_vec()).ok()?;
            let config = admissible(family, pi, params.max_open_gates)?;
            let fresh = seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(config.key().clone());
            fresh.then_some(config)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .sorted_by(|a, b| a.key().cmp(b.key()))
        .collect();

    let mut report = GenerationReport {
        arrangements: arrangements.len(),
        classes: classes.len(),
        ..Default::default()
    };

    let mut search_params = SearchParams::progress(params.ratio);
    search_params.max_nodes = params.max_nodes;
    let outcomes: Vec<_> = classes
        .par_iter()
        .filter(|config| !store.contains(params.ratio, config.key()))
        .map_init(SearchContext::new, |ctx, config| {
            (config, search_with(config, &search_params, ctx))
        })
        .collect();
    report.known = report.classes - outcomes.len();

    let mut solved = Vec::with_capacity(outcomes.len());
    for (config, outcome) in outcomes {
        match outcome {
            Ok(sequence) => solved.push((config, sequence.moves)),
            Err(err) => {
                debug!(%err, "no case for {}", config.key());
                report.unsolved.push(config.key().clone());
            }
        }
    }
    if !report.unsolved.is_empty() {
        if params.strict {
            return Err(CaseError::Unsolved {
                family: family.spi.to_string(),
                count: report.unsolved.len(),
                example: report.unsolved[0].to_string(),
                ratio: params.ratio,
            });
        }
        warn!(unsolved = report.unsolved.len(), "{} has classes without a case", family.spi);
    }

    for (config, moves) in solved {
        check_ratio_sequence(config, &moves, params.ratio)?;
        if store.put(params.ratio, Case::new(config, &moves)?) {
            report.stored += 1;
        }
    }
    debug!(
        arrangements = report.arrangements,
        classes = report.classes,
        stored = report.stored,
        "generated {}",
        family.spi
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cases::CaseLibrary, search::RATIO_11_8};

    fn family(spi: &str, orientation: Orientation) -> Family {
        Family {
            spi: spi.parse().unwrap(),
            orientation,
        }
    }

    #[test]
    fn test_two_three_cycles_have_an_unsolved_class() {
        let library = CaseLibrary::new();
        let err = generate(&library, &family("(0 1 2)(3 4 5)", Orientation::Any), &GenerationParams::default())
            .unwrap_err();
        assert!(matches!(err, CaseError::Unsolved { count: 1, ratio, .. } if ratio == RATIO_3_2));
        assert!(library.is_empty());

        let params = GenerationParams {
            strict: false,
            ..Default::default()
        };
        let report = generate(&library, &family("(0 1 2)(3 4 5)", Orientation::Any), &params).unwrap();
        assert_eq!(report.arrangements, 720);
        assert_eq!(report.classes, 7);
        assert_eq!(report.stored, 6);
        let unsolved =
            Configuration::new("(0 1 2)(3 4 5)".parse().unwrap(), "0 2 3 1 5 4".parse().unwrap()).unwrap();
        assert_eq!(report.unsolved, vec![unsolved.key().clone()]);
    }

    #[test]
    fn test_three_unoriented_three_cycles() {
        let library = CaseLibrary::new();
        let family = family("(0 1 2)(3 4 5)(6 7 8)", Orientation::Unoriented);
        let report = generate(&library, &family, &GenerationParams::default()).unwrap();
        assert_eq!(report.arrangements, 362_880);
        assert!(report.unsolved.is_empty());
        assert!(report.classes > 0);
        assert_eq!(report.stored, report.classes);
        assert_eq!(library.table_len(RATIO_3_2), report.classes);

        let config =
            Configuration::new(family.spi.clone(), "0 4 8 2 3 7 1 5 6".parse().unwrap()).unwrap();
        let moves = library.lookup(&config, RATIO_3_2).unwrap();
        assert_eq!(check_ratio_sequence(&config, &moves, RATIO_3_2), Ok(()));
    }

    #[test]
    fn test_orientation_filter() {
        let spi: MulticyclePermutation = "(0 1 2)(3 4 5)".parse().unwrap();
        // (0 1 2) is oriented here, (3 4 5) is not.
        let mixed = Configuration::new(spi.clone(), "0 1 2 5 4 3".parse().unwrap()).unwrap();
        assert!(is_oriented(mixed.pi(), &spi.cycles()[0]));
        assert!(!is_oriented(mixed.pi(), &spi.cycles()[1]));
        assert!(Orientation::Any.admits(&mixed));
        assert!(!Orientation::Oriented.admits(&mixed));
        assert!(!Orientation::Unoriented.admits(&mixed));
    }

    #[test]
    fn test_rerun_stores_nothing_new() {
        let library = CaseLibrary::new();
        let family = family("(0 1 2 3 4)", Orientation::Any);
        let first = generate(&library, &family, &GenerationParams::default()).unwrap();
        assert_eq!((first.arrangements, first.classes, first.stored), (120, 7, 7));

        let second = generate(&library, &family, &GenerationParams::default()).unwrap();
        assert_eq!(second.classes, 7);
        assert_eq!(second.stored, 0);
        assert_eq!(second.known, 7);
        assert_eq!(library.len(), 7);
    }

    #[test]
    fn test_oriented_seven_cycles() {
        let library = CaseLibrary::new();
        let params = GenerationParams {
            ratio: RATIO_11_8,
            ..Default::default()
        };
        let report = generate(&library, &family("(0 1 2 3 4 5 6)", Orientation::Oriented), &params).unwrap();
        assert_eq!(report.arrangements, 5040);
        assert_eq!(report.classes, 69);
        assert_eq!(report.stored, 69);
    }
}
