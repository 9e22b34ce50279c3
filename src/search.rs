//! Branch-and-bound search for sorting sequences.
//!
//! The search deepens the move budget one step at a time, from the least
//! budget that could succeed up to the cap given by the target ratio, so the
//! first sequence found is a shortest one. Each depth is a depth-first walk
//! driven by an explicit stack of frames. A child is pruned when it cannot meet
//! the goal within the budget, or when an equivalent configuration (same
//! canonical key) was already reached at the same or a smaller depth.

use std::fmt;

use ahash::AHashMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    classifier::{classify_dense, ExtensionType, EXTENSION_TYPES},
    configuration::{CanonicalKey, Configuration, DenseConfiguration},
    permutation::{Cycle, Symbol},
};

/// `num / den`, the number of moves allowed per unit of lower-bound reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ratio {
    pub num: usize,
    pub den: usize,
}

pub const RATIO_11_8: Ratio = Ratio::new(11, 8);
pub const RATIO_3_2: Ratio = Ratio::new(3, 2);
pub const RATIO_4_3: Ratio = Ratio::new(4, 3);

impl Ratio {
    pub const fn new(num: usize, den: usize) -> Self {
        Ratio { num, den }
    }

    /// `moves ≤ ratio · reduction`.
    pub fn allows(self, moves: usize, reduction: usize) -> bool {
        moves * self.den <= self.num * reduction
    }

    /// `⌊ratio · lower_bound⌋`.
    pub fn cap(self, lower_bound: usize) -> usize {
        lower_bound * self.num / self.den
    }
}

impl Default for Ratio {
    fn default() -> Self {
        RATIO_3_2
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// What counts as a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Goal {
    /// Reach the identity with at most `⌊ratio · lower bound⌋` moves.
    #[default]
    Sort,
    /// Any non-empty prefix whose length is at most `ratio` times the
    /// reduction of the lower bound it achieves.
    Progress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchParams {
    pub ratio: Ratio,
    pub goal: Goal,
    /// Move types tried at each node, in this order. Types left out are never
    /// tried.
    pub extension_order: Vec<ExtensionType>,
    /// Gives up with [`SearchError::NodeLimit`] once one search expands more
    /// than this many nodes.
    pub max_nodes: Option<u64>,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            ratio: RATIO_3_2,
            goal: Goal::Sort,
            extension_order: EXTENSION_TYPES.to_vec(),
            max_nodes: None,
        }
    }
}

impl SearchParams {
    pub fn sort(ratio: Ratio) -> Self {
        SearchParams {
            ratio,
            goal: Goal::Sort,
            ..Default::default()
        }
    }

    pub fn progress(ratio: Ratio) -> Self {
        SearchParams {
            ratio,
            goal: Goal::Progress,
            ..Default::default()
        }
    }

    pub fn with_max_nodes(mut self, max_nodes: u64) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("no sequence within ratio {ratio} for {key}")]
    NotFound { key: String, ratio: Ratio },
    #[error("gave up on {key} after {limit} nodes")]
    NodeLimit { key: String, limit: u64 },
}

/// Moves found by the search together with the ratio they achieve.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SortingSequence {
    pub moves: Vec<Cycle>,
    /// Moves over lower-bound reduction, unreduced.
    pub ratio: Ratio,
}

impl SortingSequence {
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn reduction(&self) -> usize {
        self.ratio.den
    }
}

/// Per-search scratch state: the visited map of the current depth and the
/// running node count.
#[derive(Debug, Default)]
pub struct SearchContext {
    visited: AHashMap<CanonicalKey, usize>,
    nodes: u64,
    /// `nodes` when the current search started.
    start: u64,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes expanded so far, over every search run with this context.
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    /// Records `key` at `depth`; `false` if it was already seen no deeper.
    fn visit(&mut self, key: CanonicalKey, depth: usize) -> bool {
        match self.visited.get_mut(&key) {
            Some(seen) if *seen <= depth => false,
            Some(seen) => {
                *seen = depth;
                true
            }
            None => {
                self.visited.insert(key, depth);
                true
            }
        }
    }
}

struct Frame {
    state: DenseConfiguration,
    positions: Vec<usize>,
    candidates: Vec<[Symbol; 3]>,
    next: usize,
}

/// The bounds one depth iteration works with.
struct Budget {
    root_lower_bound: usize,
    moves: usize,
    ratio: Ratio,
    goal: Goal,
}

impl Budget {
    fn is_hit(&self, depth: usize, lower_bound: usize) -> bool {
        match self.goal {
            Goal::Sort => lower_bound == 0,
            Goal::Progress => {
                depth > 0
                    && lower_bound < self.root_lower_bound
                    && self.ratio.allows(depth, self.root_lower_bound - lower_bound)
            }
        }
    }

    /// Whether a node at `depth` can still reach a hit within the budget.
    fn is_feasible(&self, depth: usize, lower_bound: usize) -> bool {
        if depth >= self.moves {
            return false;
        }
        match self.goal {
            Goal::Sort => depth + lower_bound <= self.moves,
            Goal::Progress => {
                // Each move lowers the bound by at most one.
                let last = self.moves.min(depth + lower_bound);
                let reduction = self.root_lower_bound - lower_bound + (last - depth);
                last > depth && self.ratio.allows(last, reduction)
            }
        }
    }
}

fn candidates(state: &DenseConfiguration, positions: &[usize], order: &[ExtensionType]) -> Vec<[Symbol; 3]> {
    let mut rank = [None; 9];
    for (i, t) in order.iter().enumerate() {
        rank[t.index()].get_or_insert(i);
    }
    let mut ranked: Vec<(usize, [Symbol; 3])> = state
        .moves()
        .filter_map(|rho| {
            let class = classify_dense(state, positions, rho)?;
            rank[class.extension_type().index()].map(|r| (r, rho))
        })
        .collect();
    ranked.sort_by_key(|&(r, _)| r);
    ranked.into_iter().map(|(_, rho)| rho).collect()
}

fn frame(state: DenseConfiguration, order: &[ExtensionType]) -> Frame {
    let positions = state.positions();
    let candidates = candidates(&state, &positions, order);
    Frame {
        state,
        positions,
        candidates,
        next: 0,
    }
}

fn search_budget(
    root: &DenseConfiguration,
    budget: &Budget,
    params: &SearchParams,
    ctx: &mut SearchContext,
) -> Result<Option<Vec<[Symbol; 3]>>, SearchError> {
    ctx.visited.clear();
    let (root_key, _) = root.canonicalize();
    ctx.visit(root_key, 0);

    let mut path: Vec<[Symbol; 3]> = Vec::with_capacity(budget.moves);
    let mut stack = vec![frame(root.clone(), &params.extension_order)];

    while let Some(top) = stack.last_mut() {
        let Some(&rho) = top.candidates.get(top.next) else {
            stack.pop();
            path.pop();
            continue;
        };
        top.next += 1;

        ctx.nodes += 1;
        if let Some(limit) = params.max_nodes {
            if ctx.nodes - ctx.start > limit {
                return Err(SearchError::NodeLimit {
                    key: root.canonicalize().0.to_string(),
                    limit,
                });
            }
        }

        let mut child = top.state.clone();
        child.apply(&top.positions, rho);
        let depth = path.len() + 1;
        let lower_bound = child.lower_bound();

        if budget.is_hit(depth, lower_bound) {
            path.push(rho);
            return Ok(Some(path));
        }
        if !budget.is_feasible(depth, lower_bound) {
            continue;
        }
        let (key, _) = child.canonicalize();
        if !ctx.visit(key, depth) {
            continue;
        }
        path.push(rho);
        stack.push(frame(child, &params.extension_order));
    }
    Ok(None)
}

/// Searches `config` for a sequence meeting `params`.
///
/// # Examples
///
/// ```
/// use sbtkit::{configuration::Configuration, search::{search, SearchParams}};
///
/// let config = Configuration::of_permutation(&"0 3 2 1".parse().unwrap()).unwrap();
/// let sequence = search(&config, &SearchParams::default()).unwrap();
/// assert_eq!(sequence.len(), 2);
/// ```
pub fn search(config: &Configuration, params: &SearchParams) -> Result<SortingSequence, SearchError> {
    search_with(config, params, &mut SearchContext::new())
}

/// Like [`search`], reusing `ctx` for its scratch state.
pub fn search_with(
    config: &Configuration,
    params: &SearchParams,
    ctx: &mut SearchContext,
) -> Result<SortingSequence, SearchError> {
    ctx.start = ctx.nodes;
    let root = config.dense();
    let root_lower_bound = root.lower_bound();
    let not_found = || SearchError::NotFound {
        key: config.key().to_string(),
        ratio: params.ratio,
    };

    let (first, last) = match params.goal {
        Goal::Sort if root_lower_bound == 0 => {
            return Ok(SortingSequence {
                moves: Vec::new(),
                ratio: Ratio::new(0, 0),
            })
        }
        Goal::Sort => (root_lower_bound, params.ratio.cap(root_lower_bound)),
        Goal::Progress if root_lower_bound == 0 => return Err(not_found()),
        Goal::Progress => (1, params.ratio.cap(root_lower_bound).max(1)),
    };

    for moves in first..=last {
        trace!(budget = moves, lower_bound = root_lower_bound, "search iteration");
        let budget = Budget {
            root_lower_bound,
            moves,
            ratio: params.ratio,
            goal: params.goal,
        };
        if let Some(found) = search_budget(&root, &budget, params, ctx)? {
            let mut end = root.clone();
            for &rho in &found {
                end.try_apply(rho);
            }
            let reduction = root_lower_bound - end.lower_bound();
            let ratio = Ratio::new(found.len(), reduction);
            debug!(
                moves = found.len(),
                reduction,
                nodes = ctx.nodes,
                "search hit for {}",
                config.key()
            );
            return Ok(SortingSequence {
                moves: found
                    .into_iter()
                    .map(|m| Cycle::from_trusted(m.to_vec()))
                    .collect(),
                ratio,
            });
        }
    }
    Err(not_found())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::classifier::{is_11_8, validate_sorting};

    fn arrangement(pi: &str) -> Configuration {
        Configuration::of_permutation(&pi.parse().unwrap()).unwrap()
    }

    #[test]
    fn test_exact_distances() {
        for (pi, distance) in [
            ("0 3 2 1", 2),
            ("0 5 4 3 2 1", 3),
            ("0 4 3 2 1", 3),
            ("0 3 6 2 5 1 4", 4),
            ("0 3 5 2 6 4 1", 3),
            ("0 4 3 2 1 5 9 8 7 6", 5),
        ] {
            let config = arrangement(pi);
            let sequence = search(&config, &SearchParams::default()).unwrap();
            assert_eq!(sequence.len(), distance, "{pi}");
            assert_eq!(validate_sorting(&config, &sequence.moves, RATIO_3_2), Ok(()));
            assert_eq!(sequence.reduction(), config.lower_bound());
        }
    }

    #[test]
    fn test_simplified_instance_takes_seven_moves() {
        let config = arrangement("0 4 8 3 7 2 6 1 5 9 14 13 12 11 10");
        assert_eq!(config.lower_bound(), 5);
        let mut ctx = SearchContext::new();
        let sequence = search_with(&config, &SearchParams::default(), &mut ctx).unwrap();
        assert_eq!(sequence.len(), 7);
        assert!(ctx.nodes() > 0);
        assert_eq!(validate_sorting(&config, &sequence.moves, RATIO_3_2), Ok(()));
    }

    #[test]
    fn test_sorted_needs_no_moves() {
        let config = arrangement("0 1 2 3");
        let sequence = search(&config, &SearchParams::default()).unwrap();
        assert!(sequence.is_empty());
        assert!(matches!(
            search(&config, &SearchParams::progress(RATIO_11_8)),
            Err(SearchError::NotFound { .. })
        ));
    }

    #[test]
    fn test_progress_finds_a_short_prefix() {
        let config = arrangement("0 4 8 3 7 2 6 1 5 9 14 13 12 11 10");
        let sequence = search(&config, &SearchParams::progress(RATIO_11_8)).unwrap();
        assert_eq!(sequence.len(), 4);
        assert!(RATIO_11_8.allows(sequence.len(), sequence.reduction()));
        assert!(is_11_8(config.spi(), config.pi(), &sequence.moves));

        // No 2-move exists, so the cheapest progress is 0-move, 2-move, 2-move.
        let oriented = arrangement("0 3 6 2 5 1 4");
        let sequence = search(&oriented, &SearchParams::progress(RATIO_3_2)).unwrap();
        assert_eq!(sequence.len(), 3);
        assert_eq!(sequence.reduction(), 2);
    }

    #[test]
    fn test_ratio_too_tight() {
        let config = arrangement("0 3 6 2 5 1 4");
        let params = SearchParams::sort(Ratio::new(1, 1));
        assert_eq!(
            search(&config, &params),
            Err(SearchError::NotFound {
                key: config.key().to_string(),
                ratio: Ratio::new(1, 1),
            })
        );
    }

    #[test]
    fn test_node_limit() {
        let config = arrangement("0 4 8 3 7 2 6 1 5 9 14 13 12 11 10");
        let params = SearchParams::default().with_max_nodes(3);
        assert!(matches!(
            search(&config, &params),
            Err(SearchError::NodeLimit { limit: 3, .. })
        ));
    }

    #[test]
    fn test_node_limit_applies_to_each_search() {
        let config = arrangement("0 3 6 2 5 1 4");
        let mut ctx = SearchContext::new();
        search_with(&config, &SearchParams::default(), &mut ctx).unwrap();
        let used = ctx.nodes();

        let params = SearchParams::default().with_max_nodes(used);
        for _ in 0..3 {
            assert!(search_with(&config, &params, &mut ctx).is_ok());
        }
        assert_eq!(ctx.nodes(), 4 * used);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn sorts_within_the_ratio_cap(rest in Just((1..7usize).collect::<Vec<_>>()).prop_shuffle()) {
            let mut symbols = vec![0];
            symbols.extend(rest);
            let config = Configuration::of_permutation(&Cycle::new(symbols).unwrap()).unwrap();
            let sequence = search(&config, &SearchParams::default()).unwrap();
            prop_assert!(sequence.len() >= config.lower_bound());
            prop_assert!(sequence.len() <= RATIO_3_2.cap(config.lower_bound()));
            prop_assert_eq!(validate_sorting(&config, &sequence.moves, RATIO_3_2), Ok(()));
        }
    }
}
