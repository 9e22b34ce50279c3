//! The case library: canonical configurations with a validated sequence.
//!
//! Cases are grouped into tables by the ratio their sequences were validated
//! against. Each table maps a [`CanonicalKey`] to one case, stored in the labels
//! of the canonical representative, and [`CaseLibrary::lookup`] translates it
//! back into the labels of whatever equivalent configuration asks for it.

pub mod generation;
pub mod proof;

use std::sync::{PoisonError, RwLock};

use ahash::AHashMap;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info_span};

use crate::{
    algorithm::extension::{candidates, Candidate, Extension},
    classifier::{check_ratio_sequence, ClassifierError},
    configuration::{CanonicalKey, Configuration, ConfigurationError},
    permutation::{Cycle, MulticyclePermutation},
    search::{Ratio, SearchError, RATIO_11_8, RATIO_3_2},
};

use generation::{generate, Family, GenerationParams, Orientation};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaseError {
    #[error("{count} classes of {family} have no sequence within {ratio}, e.g. {example}")]
    Unsolved {
        family: String,
        count: usize,
        example: String,
        ratio: Ratio,
    },
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[cfg(feature = "bincode")]
    #[error("case table codec: {0}")]
    Codec(String),
}

/// A canonical configuration and its sequence, in canonical labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub configuration: Configuration,
    pub moves: Vec<Cycle>,
}

impl Case {
    /// Moves `moves`, a sequence of `config`, onto the canonical representative.
    pub fn new(config: &Configuration, moves: &[Cycle]) -> Result<Self, ConfigurationError> {
        let (canonical, _) = config.canonical();
        let moves = canonical.translated_sorting(config, moves)?;
        Ok(Case {
            configuration: canonical,
            moves,
        })
    }

    pub fn key(&self) -> &CanonicalKey {
        self.configuration.key()
    }
}

/// Storage for cases, one table per ratio.
///
/// `put` is an insert-if-absent: the first case stored for a class wins.
pub trait CaseStore {
    fn get(&self, ratio: Ratio, key: &CanonicalKey) -> Option<Case>;
    /// Returns whether `case` was stored.
    fn put(&self, ratio: Ratio, case: Case) -> bool;
    fn contains(&self, ratio: Ratio, key: &CanonicalKey) -> bool;
    /// Number of cases over every table.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Tables = IndexMap<Ratio, AHashMap<CanonicalKey, Case>>;

/// In-memory [`CaseStore`], safe to share between threads.
#[derive(Debug, Default)]
pub struct CaseLibrary {
    tables: RwLock<Tables>,
}

/// One candidate growth of a component and whether the library covers it.
#[derive(Debug, Clone)]
pub struct ExtensionReport {
    pub candidate: Candidate,
    pub configuration: Configuration,
    pub stored: bool,
}

/// Case families seeded by [`CaseLibrary::standard`]: the ratio, the `spi`
/// whose arrangements are enumerated, and which orientations are kept.
pub const STANDARD_FAMILIES: [(Ratio, &str, Orientation); 3] = [
    (RATIO_3_2, "(0 1 2)(3 4 5)(6 7 8)", Orientation::Unoriented),
    (RATIO_3_2, "(0 1 2 3 4)", Orientation::Any),
    (RATIO_11_8, "(0 1 2 3 4 5 6)", Orientation::Oriented),
];

/// Hand-supplied cases seeded by [`CaseLibrary::standard`], over `pi = (0 1 ... n-1)`.
pub const STANDARD_SEEDS: [(Ratio, &str, &[&str]); 1] =
    [(RATIO_3_2, "(0 4 2)(1 5 3)", &["0 2 4", "3 1 5", "2 4 0"])];

impl CaseStore for CaseLibrary {
    fn get(&self, ratio: Ratio, key: &CanonicalKey) -> Option<Case> {
        self.read().get(&ratio)?.get(key).cloned()
    }

    fn put(&self, ratio: Ratio, case: Case) -> bool {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(ratio).or_default();
        if table.contains_key(case.key()) {
            return false;
        }
        table.insert(case.key().clone(), case);
        true
    }

    fn contains(&self, ratio: Ratio, key: &CanonicalKey) -> bool {
        self.read().get(&ratio).is_some_and(|t| t.contains_key(key))
    }

    fn len(&self) -> usize {
        self.read().values().map(|t| t.len()).sum()
    }
}

impl CaseLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// A library seeded with [`STANDARD_SEEDS`] and every family of
    /// [`STANDARD_FAMILIES`].
    ///
    /// Fails if some admitted class has no sequence.
    pub fn standard() -> Result<Self, CaseError> {
        let _span = info_span!("standard_library").entered();
        let library = Self::new();
        for (ratio, spi, moves) in STANDARD_SEEDS {
            let spi = spi.parse::<MulticyclePermutation>().map_err(ConfigurationError::from)?;
            let config = Configuration::from_spi(spi)?;
            let moves = moves
                .iter()
                .map(|m| m.parse::<Cycle>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(ConfigurationError::from)?;
            library.insert(&config, &moves, ratio)?;
        }
        for (ratio, spi, orientation) in STANDARD_FAMILIES {
            let family = Family {
                spi: spi.parse::<MulticyclePermutation>().map_err(ConfigurationError::from)?,
                orientation,
            };
            let params = GenerationParams {
                ratio,
                ..Default::default()
            };
            let report = generate(&library, &family, &params)?;
            debug!(
                classes = report.classes,
                stored = report.stored,
                "seeded {spi} at {ratio}"
            );
        }
        Ok(library)
    }

    /// Number of cases validated against `ratio`.
    pub fn table_len(&self, ratio: Ratio) -> usize {
        self.read().get(&ratio).map_or(0, |t| t.len())
    }

    /// Ratios with a table, in the order they were first filled.
    pub fn ratios(&self) -> Vec<Ratio> {
        self.read().keys().copied().collect()
    }

    /// The stored sequence for the class of `config`, in `config`'s labels.
    pub fn lookup(&self, config: &Configuration, ratio: Ratio) -> Option<Vec<Cycle>> {
        let case = self.get(ratio, config.key())?;
        match config.translated_sorting(&case.configuration, &case.moves) {
            Ok(moves) => Some(moves),
            Err(err) => {
                debug!(%err, "stored case for {} does not translate", config.key());
                None
            }
        }
    }

    /// Stores `moves` for the class of `config` after checking it is a
    /// `ratio`-sequence. Returns whether the class was new.
    pub fn insert(&self, config: &Configuration, moves: &[Cycle], ratio: Ratio) -> Result<bool, CaseError> {
        check_ratio_sequence(config, moves, ratio)?;
        Ok(self.put(ratio, Case::new(config, moves)?))
    }

    /// Every candidate growth of `component` inside `host`, each with whether
    /// its configuration is stored under `ratio`.
    pub fn extension_report(
        &self,
        component: &[Cycle],
        host: &Configuration,
        kinds: &[Extension],
        ratio: Ratio,
    ) -> Result<Vec<ExtensionReport>, CaseError> {
        candidates(component, host.spi(), host.pi(), kinds)
            .into_iter()
            .map(|candidate| {
                let configuration = Configuration::sub_configuration(&candidate.component, host.pi())?;
                let stored = self.contains(ratio, configuration.key());
                Ok(ExtensionReport {
                    candidate,
                    configuration,
                    stored,
                })
            })
            .collect()
    }
}

#[cfg(feature = "bincode")]
mod codec {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize)]
    struct StoredCase {
        ratio: Ratio,
        key: CanonicalKey,
        moves: Vec<Cycle>,
    }

    impl CaseLibrary {
        /// Serializes every table with bincode.
        pub fn encode(&self) -> Result<Vec<u8>, CaseError> {
            let records: Vec<StoredCase> = self
                .read()
                .iter()
                .flat_map(|(&ratio, table)| {
                    table.values().map(move |case| StoredCase {
                        ratio,
                        key: case.key().clone(),
                        moves: case.moves.clone(),
                    })
                })
                .collect();
            bincode::serde::encode_to_vec(&records, bincode::config::standard())
                .map_err(|e| CaseError::Codec(e.to_string()))
        }

        /// Rebuilds a library from [`encode`](Self::encode) output, checking
        /// every case again.
        pub fn decode(bytes: &[u8]) -> Result<Self, CaseError> {
            let (records, _): (Vec<StoredCase>, usize) =
                bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                    .map_err(|e| CaseError::Codec(e.to_string()))?;
            let library = Self::new();
            for record in records {
                let pi = Cycle::canonical_pi(record.key.len()).map_err(ConfigurationError::from)?;
                let configuration = Configuration::new(record.key.spi(), pi)?;
                if configuration.key() != &record.key {
                    return Err(CaseError::Codec(format!("{} is not canonical", record.key)));
                }
                library.insert(&configuration, &record.moves, record.ratio)?;
            }
            Ok(library)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algorithm::extension::seed,
        search::{search, SearchParams},
    };

    fn arrangement(pi: &str) -> Configuration {
        Configuration::of_permutation(&pi.parse().unwrap()).unwrap()
    }

    fn moves(list: &[[usize; 3]]) -> Vec<Cycle> {
        list.iter().map(|m| Cycle::new(m.to_vec()).unwrap()).collect()
    }

    #[test]
    fn test_insert_validates_and_deduplicates() {
        let library = CaseLibrary::new();
        let config = arrangement("0 3 6 2 5 1 4");
        let sorting = moves(&[[0, 3, 6], [3, 6, 5], [6, 5, 1], [2, 0, 4]]);

        assert!(matches!(
            library.insert(&config, &sorting[..2], RATIO_3_2),
            Err(CaseError::Classifier(ClassifierError::RatioExceeded { .. }))
        ));
        assert!(library.is_empty());

        assert_eq!(library.insert(&config, &sorting, RATIO_11_8), Ok(true));
        assert_eq!(library.insert(&config, &sorting, RATIO_11_8), Ok(false));
        assert_eq!(library.len(), 1);
        assert_eq!(library.table_len(RATIO_11_8), 1);
        assert_eq!(library.table_len(RATIO_3_2), 0);
        assert!(library.contains(RATIO_11_8, config.key()));
    }

    #[test]
    fn test_lookup_translates_to_equivalent_configurations() {
        let library = CaseLibrary::new();
        let config = arrangement("0 4 8 3 7 2 6 1 5 9 14 13 12 11 10");
        let sorting = search(&config, &SearchParams::default()).unwrap();
        library.insert(&config, &sorting.moves, RATIO_3_2).unwrap();

        for (equivalent, _) in config.equivalent_configurations().into_iter().step_by(7) {
            let found = library.lookup(&equivalent, RATIO_3_2).unwrap();
            assert_eq!(found.len(), 7);
            assert_eq!(crate::classifier::validate_sorting(&equivalent, &found, RATIO_3_2), Ok(()));
        }
        assert_eq!(library.lookup(&config, RATIO_11_8), None);
    }

    #[test]
    fn test_stored_case_is_canonical() {
        let config = arrangement("0 3 2 1");
        let case = Case::new(&config, &moves(&[[0, 3, 2], [0, 2, 1]])).unwrap();
        assert_eq!(case.key(), config.key());
        assert_eq!(case.configuration.pi(), &Cycle::canonical_pi(4).unwrap());
    }

    #[test]
    fn test_extension_report_marks_stored_candidates() {
        let library = CaseLibrary::new();
        let host = arrangement("0 5 4 3 2 1");
        let start = seed(host.spi().non_trivial_cycles().next().unwrap()).unwrap();

        let kinds = [Extension::Intersecting, Extension::Interleaving];
        let report = library.extension_report(&[start.clone()], &host, &kinds, RATIO_3_2).unwrap();
        assert_eq!(report.len(), 1);
        assert!(!report[0].stored);

        let grown = &report[0].configuration;
        let sequence = search(grown, &SearchParams::progress(RATIO_3_2)).unwrap();
        library.insert(grown, &sequence.moves, RATIO_3_2).unwrap();

        let report = library.extension_report(&[start], &host, &kinds, RATIO_3_2).unwrap();
        assert!(report[0].stored);
        assert_eq!(report[0].candidate.kind, Extension::Intersecting);
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn test_encode_decode() {
        let library = CaseLibrary::new();
        let config = arrangement("0 3 6 2 5 1 4");
        let sorting = moves(&[[0, 3, 6], [3, 6, 5], [6, 5, 1], [2, 0, 4]]);
        library.insert(&config, &sorting, RATIO_11_8).unwrap();

        let decoded = CaseLibrary::decode(&library.encode().unwrap()).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.lookup(&config, RATIO_11_8).map(|m| m.len()), Some(4));
    }
}
