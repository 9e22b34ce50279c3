//! Cyclic sequences of distinct symbols.
//!
//! A [`Cycle`] is both a permutation in its own right (each symbol maps to its
//! successor) and, when it covers every symbol of an instance, the one-line
//! arrangement of a permutation being sorted. Two cycles are equal when one is a
//! rotation of the other; the canonical rotation starts at the minimum symbol.

use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::OnceLock,
};

use bitvec::slice::BitSlice;
use itertools::Itertools;
use rand::{seq::SliceRandom, Rng};

use super::{AsPermutation, PermutationError, Symbol};

/// An immutable cycle with O(1) successor, predecessor and membership queries.
///
/// # Examples
///
/// ```
/// use sbtkit::permutation::Cycle;
///
/// let c: Cycle = "(2 0 1)".parse().unwrap();
/// assert_eq!(c.image(0), 1);
/// assert_eq!(c.image(7), 7);
/// assert_eq!(c, "0 1 2".parse().unwrap());
/// assert_eq!(c.to_string(), "(0 1 2)");
/// ```
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<Symbol>", into = "Vec<Symbol>")
)]
pub struct Cycle {
    symbols: Vec<Symbol>,
    /// `positions[s]` is the index of `s` in `symbols`, `None` for absent symbols.
    positions: Vec<Option<usize>>,
    /// Index of the minimum symbol, where the canonical rotation starts.
    origin: usize,
    inverse: OnceLock<Box<Cycle>>,
}

impl Cycle {
    /// Builds a cycle from its symbols in cyclic order.
    pub fn new(symbols: Vec<Symbol>) -> Result<Self, PermutationError> {
        if symbols.is_empty() {
            return Err(PermutationError::EmptyCycle);
        }
        let size = symbols.iter().max().map_or(0, |&m| m + 1);
        let mut positions = vec![None; size];
        for (i, &s) in symbols.iter().enumerate() {
            if positions[s].replace(i).is_some() {
                return Err(PermutationError::DuplicateSymbol(s));
            }
        }
        Ok(Self::with_positions(symbols, positions))
    }

    /// Builds a cycle from symbols already known to be distinct and non-empty.
    pub(crate) fn from_trusted(symbols: Vec<Symbol>) -> Self {
        debug_assert!(!symbols.is_empty());
        let size = symbols.iter().max().map_or(0, |&m| m + 1);
        let mut positions = vec![None; size];
        for (i, &s) in symbols.iter().enumerate() {
            positions[s] = Some(i);
        }
        Self::with_positions(symbols, positions)
    }

    fn with_positions(symbols: Vec<Symbol>, positions: Vec<Option<usize>>) -> Self {
        let origin = symbols
            .iter()
            .position_min()
            .unwrap_or_default();
        Cycle {
            symbols,
            positions,
            origin,
            inverse: OnceLock::new(),
        }
    }

    /// The arrangement `(0 1 ... n-1)`, i.e. the sorted permutation of `n` symbols.
    pub fn canonical_pi(n: usize) -> Result<Self, PermutationError> {
        if n == 0 {
            return Err(PermutationError::EmptyCycle);
        }
        Ok(Self::from_trusted((0..n).collect()))
    }

    /// A uniformly random arrangement of `0..n` starting at `0`.
    pub fn random_arrangement<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Result<Self, PermutationError> {
        if n == 0 {
            return Err(PermutationError::EmptyCycle);
        }
        let mut symbols: Vec<Symbol> = (0..n).collect();
        symbols[1..].shuffle(rng);
        Ok(Self::from_trusted(symbols))
    }

    // --------------------------------------------------------------------------------------------
    // Accessors
    // --------------------------------------------------------------------------------------------

    /// The symbols in the order this cycle was built with.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbol at position `i`, wrapping around.
    pub fn get(&self, i: usize) -> Symbol {
        self.symbols[i % self.symbols.len()]
    }

    pub fn contains(&self, s: Symbol) -> bool {
        self.index_of(s).is_some()
    }

    pub fn index_of(&self, s: Symbol) -> Option<usize> {
        self.positions.get(s).copied().flatten()
    }

    pub fn min_symbol(&self) -> Symbol {
        self.symbols[self.origin]
    }

    pub fn max_symbol(&self) -> Symbol {
        self.positions.len() - 1
    }

    /// Sum of `len - 1`; the number of 2-cycle factors needed to build this cycle.
    pub fn norm(&self) -> usize {
        self.symbols.len() - 1
    }

    /// A cycle of odd length. In breakpoint-graph terms these are the *even* cycles,
    /// the ones counted by the lower bound.
    pub fn is_even(&self) -> bool {
        self.symbols.len() % 2 == 1
    }

    /// The rotation starting at the minimum symbol.
    pub fn canonical_symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        let n = self.symbols.len();
        (0..n).map(move |i| self.symbols[(self.origin + i) % n])
    }

    // --------------------------------------------------------------------------------------------
    // Cycle Algebra
    // --------------------------------------------------------------------------------------------

    /// The successor of `s`, or `s` itself when `s` is not in the cycle.
    pub fn image(&self, s: Symbol) -> Symbol {
        self.pow(s, 1)
    }

    /// The predecessor of `s`, or `s` itself when `s` is not in the cycle.
    pub fn pre_image(&self, s: Symbol) -> Symbol {
        self.pow(s, -1)
    }

    /// The image of `s` under the `k`-th power of this cycle.
    pub fn pow(&self, s: Symbol, k: isize) -> Symbol {
        match self.index_of(s) {
            Some(i) => {
                let n = self.symbols.len() as isize;
                self.symbols[(i as isize + k).rem_euclid(n) as usize]
            }
            None => s,
        }
    }

    /// Forward distance from `a` to `b` along the cycle.
    ///
    /// ```
    /// # use sbtkit::permutation::Cycle;
    /// let c: Cycle = "0 1 2 3 4".parse().unwrap();
    /// assert_eq!(c.distance(3, 1), Some(3));
    /// assert_eq!(c.distance(1, 3), Some(2));
    /// assert_eq!(c.distance(1, 9), None);
    /// ```
    pub fn distance(&self, a: Symbol, b: Symbol) -> Option<usize> {
        let (i, j) = (self.index_of(a)?, self.index_of(b)?);
        let n = self.symbols.len();
        Some((j + n - i) % n)
    }

    /// The reversed cycle. Computed once and cached.
    pub fn inverse(&self) -> &Cycle {
        self.inverse.get_or_init(|| {
            let mut reversed = self.symbols.clone();
            reversed.reverse();
            Box::new(Cycle::with_positions_of(reversed, &self.positions))
        })
    }

    fn with_positions_of(symbols: Vec<Symbol>, template: &[Option<usize>]) -> Self {
        let mut positions = vec![None; template.len()];
        for (i, &s) in symbols.iter().enumerate() {
            positions[s] = Some(i);
        }
        Self::with_positions(symbols, positions)
    }

    /// The same cycle rotated to start at `s`.
    pub fn starting_by(&self, s: Symbol) -> Option<Cycle> {
        let i = self.index_of(s)?;
        let mut symbols = self.symbols.clone();
        symbols.rotate_left(i);
        Some(Self::from_trusted(symbols))
    }

    /// Conjugation by `g`: the cycle `(g(x1) g(x2) ...)`.
    pub fn conjugate_by(&self, g: impl Fn(Symbol) -> Symbol) -> Result<Cycle, PermutationError> {
        Cycle::new(self.symbols.iter().map(|&s| g(s)).collect())
    }

    /// Whether `symbols`, read cyclically, visit this cycle in its own direction.
    ///
    /// The positions of `symbols` may wrap past the end of the cycle at most once.
    /// Symbols absent from the cycle make the answer `false`.
    ///
    /// ```
    /// # use sbtkit::permutation::Cycle;
    /// let pi: Cycle = "0 5 4 3 8 7 6 2 1".parse().unwrap();
    /// assert!(pi.is_in_cyclic_order(&[5, 8, 1]));
    /// assert!(pi.is_in_cyclic_order(&[8, 1, 5]));
    /// assert!(!pi.is_in_cyclic_order(&[1, 8, 5]));
    /// ```
    pub fn is_in_cyclic_order(&self, symbols: &[Symbol]) -> bool {
        let Some(indexes) = symbols
            .iter()
            .map(|&s| self.index_of(s))
            .collect::<Option<Vec<_>>>()
        else {
            return false;
        };
        let leaps = indexes
            .iter()
            .circular_tuple_windows()
            .filter(|(a, b)| a > b)
            .count();
        leaps <= 1
    }

    /// Applies the transposition `rho = (a b c)` to this arrangement, returning
    /// `rho · self`. The three blocks delimited by `a`, `b` and `c` exchange
    /// places; `rho` must be a 3-cycle whose symbols appear in this cycle's order.
    ///
    /// ```
    /// # use sbtkit::permutation::Cycle;
    /// let pi: Cycle = "0 4 5 6 1 2 3".parse().unwrap();
    /// let rho: Cycle = "0 4 1".parse().unwrap();
    /// assert_eq!(pi.apply_transposition(&rho).unwrap(), "0 1 2 3 4 5 6".parse().unwrap());
    /// ```
    pub fn apply_transposition(&self, rho: &Cycle) -> Result<Cycle, PermutationError> {
        let not_applicable = || PermutationError::NotApplicable {
            a: rho.get(0),
            b: rho.get(1),
            c: rho.get(2),
            target: self.to_string(),
        };
        if rho.len() != 3 || !self.is_in_cyclic_order(rho.symbols()) {
            return Err(not_applicable());
        }
        let mut idx = [0usize; 3];
        for (slot, &s) in idx.iter_mut().zip(rho.symbols()) {
            *slot = self.index_of(s).ok_or_else(not_applicable)?;
        }
        idx.sort_unstable();
        let [i, j, k] = idx;

        let s = &self.symbols;
        let mut result = Vec::with_capacity(s.len());
        result.extend_from_slice(&s[..i]);
        result.extend_from_slice(&s[j..k]);
        result.extend_from_slice(&s[i..j]);
        result.extend_from_slice(&s[k..]);
        Ok(Self::from_trusted(result))
    }

    /// The arrangement restricted to `keep`, in the same relative order.
    pub fn restricted_to(&self, keep: &BitSlice) -> Result<Cycle, PermutationError> {
        Cycle::new(
            self.symbols
                .iter()
                .copied()
                .filter(|&s| keep.get(s).is_some_and(|b| *b))
                .collect(),
        )
    }
}

impl PartialEq for Cycle {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.canonical_symbols().eq(other.canonical_symbols())
    }
}

impl Eq for Cycle {}

impl Hash for Cycle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for s in self.canonical_symbols() {
            s.hash(state);
        }
    }
}

impl PartialOrd for Cycle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cycle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.canonical_symbols().cmp(other.canonical_symbols())
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.canonical_symbols().join(" "))
    }
}

impl fmt::Debug for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cycle{self}")
    }
}

impl FromStr for Cycle {
    type Err = PermutationError;

    /// Accepts `"(a,b,c)"`, `"(a b c)"`, `"a b c"` and `"a,b,c"`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let body = match (trimmed.strip_prefix('('), trimmed.strip_suffix(')')) {
            (Some(_), Some(_)) => &trimmed[1..trimmed.len() - 1],
            (None, None) => trimmed,
            _ => {
                return Err(PermutationError::Parse {
                    input: input.to_owned(),
                    reason: "unbalanced parenthesis".to_owned(),
                })
            }
        };
        let symbols = parse_symbols(body).map_err(|reason| PermutationError::Parse {
            input: input.to_owned(),
            reason,
        })?;
        Cycle::new(symbols)
    }
}

impl TryFrom<Vec<Symbol>> for Cycle {
    type Error = PermutationError;

    fn try_from(symbols: Vec<Symbol>) -> Result<Self, Self::Error> {
        Cycle::new(symbols)
    }
}

impl From<Cycle> for Vec<Symbol> {
    fn from(cycle: Cycle) -> Self {
        cycle.symbols
    }
}

impl AsPermutation for Cycle {
    fn max_symbol(&self) -> Option<Symbol> {
        Some(Cycle::max_symbol(self))
    }

    fn write_images(&self, map: &mut [Symbol], support: &mut BitSlice) {
        for (&a, &b) in self.symbols.iter().circular_tuple_windows() {
            map[a] = b;
            support.set(a, true);
        }
        if let [only] = self.symbols[..] {
            support.set(only, true);
        }
    }
}

/// Splits a comma and/or whitespace separated list of symbols.
pub(crate) fn parse_symbols(body: &str) -> Result<Vec<Symbol>, String> {
    body.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<Symbol>().map_err(|e| format!("{t:?}: {e}")))
        .collect()
}
