//! Sort or extend: deriving cases for every configuration reachable from a
//! few seeds.
//!
//! A configuration with a sequence within the ratio gets a case. One without
//! is a *bad case*, and each way of growing it by one more cycle, or by two
//! more symbols of a cycle it has, is tried in turn, until the configurations
//! reach a 3-norm where they are left alone.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, PoisonError,
};

use ahash::AHashSet;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info_span, trace};

use super::{Case, CaseError, CaseStore};
use crate::{
    algorithm::extension::Extension,
    classifier::{check_ratio_sequence, MAX_OPEN_GATES},
    configuration::{CanonicalKey, Configuration},
    permutation::{Cycle, MulticyclePermutation, Symbol},
    search::{search_with, Ratio, SearchContext, SearchParams, RATIO_11_8},
    union_find::components,
};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProofParams {
    pub ratio: Ratio,
    /// Bad cases of this 3-norm or more are not extended.
    pub max_norm: usize,
    pub kinds: Vec<Extension>,
    pub max_open_gates: usize,
    /// Node limit of each search. A search that hits it counts as a bad case.
    pub max_nodes: Option<u64>,
}

impl Default for ProofParams {
    fn default() -> Self {
        ProofParams {
            ratio: RATIO_11_8,
            max_norm: 4,
            kinds: vec![Extension::Intersecting, Extension::Interleaving, Extension::Segment],
            max_open_gates: MAX_OPEN_GATES,
            max_nodes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofReport {
    /// Classes reached, seeds included.
    pub visited: usize,
    /// Classes given a new case.
    pub stored: usize,
    /// Classes the store already held.
    pub known: usize,
    /// Classes without a sequence, by key.
    pub bad: Vec<CanonicalKey>,
}

/// `symbols` with each `(index, symbol)` inserted in turn.
fn inserted(symbols: &[Symbol], insertions: &[(usize, Symbol)]) -> Vec<Symbol> {
    let mut arrangement = symbols.to_vec();
    for &(index, s) in insertions {
        arrangement.insert(index, s);
    }
    arrangement
}

/// New unoriented 3-cycles placed anywhere in the arrangement, with their kind.
fn new_cycles(canonical: &Configuration, gates: &[Symbol], kinds: &[Extension]) -> Vec<(Extension, Configuration)> {
    let base = canonical.pi().symbols();
    let n = base.len();
    let cycle = Cycle::from_trusted(vec![n + 2, n + 1, n]);
    let mut found = Vec::new();
    for positions in (0..=n).combinations_with_replacement(3) {
        let [i, j, k] = [positions[0], positions[1], positions[2]];
        if i == k {
            continue;
        }
        let pi = Cycle::from_trusted(inserted(base, &[(i, n), (j + 1, n + 1), (k + 2, n + 2)]));
        let mut cycles = canonical.spi().cycles().to_vec();
        cycles.push(cycle.clone());
        let child = Configuration::from_trusted(MulticyclePermutation::from_trusted(cycles), pi);

        let child_gates = child.open_gates();
        let kind = if gates.iter().any(|a| !child_gates.contains(a)) {
            Extension::Intersecting
        } else if gates.is_empty() {
            Extension::Interleaving
        } else {
            continue;
        };
        if kinds.contains(&kind) {
            found.push((kind, child));
        }
    }
    found
}

/// Every cycle lengthened by two new symbols, placed anywhere in the arrangement.
fn lengthened_cycles(canonical: &Configuration) -> Vec<Configuration> {
    let base = canonical.pi().symbols();
    let n = base.len();
    let mut found = Vec::new();
    for (index, cycle) in canonical.spi().cycles().iter().enumerate() {
        if cycle.len() < 3 {
            continue;
        }
        for &s in cycle.symbols() {
            let mut symbols = vec![s, n, n + 1];
            symbols.extend((1..cycle.len()).map(|k| cycle.pow(s, k as isize)));
            let mut cycles = canonical.spi().cycles().to_vec();
            cycles[index] = Cycle::from_trusted(symbols);
            let spi = MulticyclePermutation::from_trusted(cycles);

            for (i, j) in (0..=n).cartesian_product(0..=n + 1) {
                let pi = Cycle::from_trusted(inserted(base, &[(i, n), (j, n + 1)]));
                found.push(Configuration::from_trusted(spi.clone(), pi));
            }
        }
    }
    found
}

/// The one-step extensions of `config` by `kinds`, one per class, with at most
/// `max_open_gates` open gates and a single component.
pub fn extensions(
    config: &Configuration,
    kinds: &[Extension],
    max_open_gates: usize,
) -> Vec<(Extension, Configuration)> {
    let (canonical, _) = config.canonical();
    let gates = canonical.open_gates();

    let mut all = new_cycles(&canonical, &gates, kinds);
    if kinds.contains(&Extension::Segment) {
        all.extend(lengthened_cycles(&canonical).into_iter().map(|c| (Extension::Segment, c)));
    }

    let mut seen = AHashSet::new();
    all.into_iter()
        .filter(|(_, child)| {
            child.open_gates().len() <= max_open_gates
                && components(child.spi(), child.pi()).len() == 1
                && seen.insert(child.key().clone())
        })
        .collect()
}

struct Prover<'a, S> {
    store: &'a S,
    params: &'a ProofParams,
    search_params: SearchParams,
    claimed: Mutex<AHashSet<CanonicalKey>>,
    stored: AtomicUsize,
    known: AtomicUsize,
    bad: Mutex<Vec<CanonicalKey>>,
}

impl<S: CaseStore + Sync> Prover<'_, S> {
    /// Whether this call is the first to reach the class of `config`.
    fn claim(&self, config: &Configuration) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config.key().clone())
    }

    fn visit(&self, config: &Configuration, ctx: &mut SearchContext) -> Result<(), CaseError> {
        if !self.claim(config) {
            return Ok(());
        }
        let ratio = self.params.ratio;
        if self.store.contains(ratio, config.key()) {
            self.known.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        match search_with(config, &self.search_params, ctx) {
            Ok(sequence) => {
                check_ratio_sequence(config, &sequence.moves, ratio)?;
                if self.store.put(ratio, Case::new(config, &sequence.moves)?) {
                    self.stored.fetch_add(1, Ordering::Relaxed);
                }
                return Ok(());
            }
            Err(err) => {
                trace!(%err, "bad case {}", config.key());
                self.bad
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(config.key().clone());
            }
        }

        if config.three_norm() >= self.params.max_norm {
            return Ok(());
        }
        let children = extensions(config, &self.params.kinds, self.params.max_open_gates);
        debug!(children = children.len(), "extending {}", config.key());
        children
            .par_iter()
            .try_for_each_init(SearchContext::new, |ctx, (_, child)| self.visit(child, ctx))
    }
}

/// Gives every configuration reachable from `seeds` by bad-case extension a
/// case in `store`, or reports it as bad.
///
/// Each class is searched at most once. Which of several equally good
/// sequences ends up stored may depend on scheduling.
pub fn sort_or_extend<S: CaseStore + Sync>(
    store: &S,
    seeds: &[Configuration],
    params: &ProofParams,
) -> Result<ProofReport, CaseError> {
    let _span = info_span!("sort_or_extend", seeds = seeds.len(), ratio = %params.ratio).entered();
    let mut search_params = SearchParams::progress(params.ratio);
    search_params.max_nodes = params.max_nodes;
    let prover = Prover {
        store,
        params,
        search_params,
        claimed: Mutex::new(AHashSet::new()),
        stored: AtomicUsize::new(0),
        known: AtomicUsize::new(0),
        bad: Mutex::new(Vec::new()),
    };

    seeds
        .par_iter()
        .try_for_each_init(SearchContext::new, |ctx, seed| prover.visit(seed, ctx))?;

    let mut bad = prover.bad.into_inner().unwrap_or_else(PoisonError::into_inner);
    bad.sort();
    let report = ProofReport {
        visited: prover.claimed.into_inner().unwrap_or_else(PoisonError::into_inner).len(),
        stored: prover.stored.into_inner(),
        known: prover.known.into_inner(),
        bad,
    };
    debug!(
        visited = report.visited,
        stored = report.stored,
        bad = report.bad.len(),
        "sort or extend done"
    );
    Ok(report)
}
