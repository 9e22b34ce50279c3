use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use bitvec::{slice::BitSlice, vec::BitVec};
use itertools::Itertools;

use super::{cycle::parse_symbols, AsPermutation, Cycle, PermutationError, Symbol};

/// A permutation written as disjoint cycles.
///
/// The cycles may cover a sparse set of symbols. Equality ignores the order in
/// which cycles are listed and the rotation of each cycle.
///
/// # Examples
///
/// ```
/// use sbtkit::permutation::MulticyclePermutation;
///
/// let spi: MulticyclePermutation = "(0,3)(1,2)".parse().unwrap();
/// assert_eq!(spi, "(2 1)(3 0)".parse().unwrap());
/// assert_eq!(spi.number_of_symbols(), 4);
/// assert_eq!(spi.number_of_even_cycles(), 0);
/// ```
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MulticyclePermutation {
    cycles: Vec<Cycle>,
}

impl MulticyclePermutation {
    /// Collects `cycles`, checking that no symbol is shared between them.
    pub fn new(cycles: Vec<Cycle>) -> Result<Self, PermutationError> {
        let size = cycles.iter().map(|c| c.max_symbol() + 1).max().unwrap_or(0);
        let mut seen: BitVec = BitVec::repeat(false, size);
        for &s in cycles.iter().flat_map(|c| c.symbols()) {
            if seen.replace(s, true) {
                return Err(PermutationError::DuplicateSymbol(s));
            }
        }
        Ok(MulticyclePermutation { cycles })
    }

    pub(crate) fn from_trusted(cycles: Vec<Cycle>) -> Self {
        MulticyclePermutation { cycles }
    }

    /// `σ·π⁻¹` for the arrangement `pi` of `0..n`, with `σ = (0 1 ... n-1)`.
    /// Fixed points are kept as 1-cycles.
    pub fn sigma_pi_inverse(pi: &Cycle) -> Result<Self, PermutationError> {
        let n = pi.len();
        let sigma = Cycle::canonical_pi(n)?;
        super::compute_product_sized(n, true, &[&sigma, pi.inverse()])
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cycle> {
        self.cycles.iter()
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// The inverse permutation: every cycle reversed.
    pub fn inverse(&self) -> Self {
        MulticyclePermutation {
            cycles: self.cycles.iter().map(|c| c.inverse().clone()).collect(),
        }
    }

    /// Cycles of length at least two.
    pub fn non_trivial_cycles(&self) -> impl Iterator<Item = &Cycle> + '_ {
        self.cycles.iter().filter(|c| c.len() > 1)
    }

    /// Number of odd-length cycles, which breakpoint-graph terminology calls even.
    pub fn number_of_even_cycles(&self) -> usize {
        self.cycles.iter().filter(|c| c.is_even()).count()
    }

    pub fn number_of_symbols(&self) -> usize {
        self.cycles.iter().map(Cycle::len).sum()
    }

    /// All symbols, in ascending order.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.cycles
            .iter()
            .flat_map(|c| c.symbols().iter().copied())
            .sorted_unstable()
            .collect()
    }

    /// Bit mask of the symbols, sized to the largest one.
    pub fn support(&self) -> BitVec {
        let mut mask: BitVec = BitVec::repeat(false, self.max_symbol().map_or(0, |m| m + 1));
        for &s in self.cycles.iter().flat_map(|c| c.symbols()) {
            mask.set(s, true);
        }
        mask
    }

    pub fn max_symbol(&self) -> Option<Symbol> {
        self.cycles.iter().map(Cycle::max_symbol).max()
    }

    pub fn norm(&self) -> usize {
        self.cycles.iter().map(Cycle::norm).sum()
    }

    /// `(symbols − even cycles) / 2`, the number of transpositions this
    /// permutation needs at the very least.
    pub fn three_norm(&self) -> usize {
        (self.number_of_symbols() - self.number_of_even_cycles()) / 2
    }

    /// Empty, or made of 1-cycles only.
    pub fn is_identity(&self) -> bool {
        self.cycles.iter().all(|c| c.len() == 1)
    }

    /// The cycle containing `s`.
    pub fn cycle_of(&self, s: Symbol) -> Option<&Cycle> {
        self.cycles.iter().find(|c| c.contains(s))
    }

    /// Dense lookup from symbol to the index of its cycle in [`cycles`](Self::cycles).
    pub fn cycle_index(&self) -> Vec<Option<usize>> {
        let mut index = vec![None; self.max_symbol().map_or(0, |m| m + 1)];
        for (i, c) in self.cycles.iter().enumerate() {
            for &s in c.symbols() {
                index[s] = Some(i);
            }
        }
        index
    }

    /// The single non-trivial cycle of this permutation.
    pub fn as_n_cycle(&self) -> Result<Cycle, PermutationError> {
        match self.non_trivial_cycles().collect_vec().as_slice() {
            [only] => Ok((*only).clone()),
            _ => Err(PermutationError::NotASingleCycle(self.to_string())),
        }
    }

    fn sorted(&self) -> Vec<&Cycle> {
        self.cycles.iter().sorted_unstable().collect()
    }
}

impl From<Cycle> for MulticyclePermutation {
    fn from(cycle: Cycle) -> Self {
        MulticyclePermutation {
            cycles: vec![cycle],
        }
    }
}

impl<'a> IntoIterator for &'a MulticyclePermutation {
    type Item = &'a Cycle;
    type IntoIter = std::slice::Iter<'a, Cycle>;

    fn into_iter(self) -> Self::IntoIter {
        self.cycles.iter()
    }
}

impl PartialEq for MulticyclePermutation {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.sorted() == other.sorted()
    }
}

impl Eq for MulticyclePermutation {}

impl Hash for MulticyclePermutation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sorted().hash(state);
    }
}

impl fmt::Display for MulticyclePermutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cycles.is_empty() {
            return write!(f, "()");
        }
        for c in self.sorted() {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for MulticyclePermutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multicycle{self}")
    }
}

impl FromStr for MulticyclePermutation {
    type Err = PermutationError;

    /// Accepts `"(0,3)(1,2)"`, `"(0 3)(1 2)"`, or a bare single cycle `"0 3 1 2"`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parse_error = |reason: &str| PermutationError::Parse {
            input: input.to_owned(),
            reason: reason.to_owned(),
        };
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "()" {
            return Ok(Self::default());
        }
        if !trimmed.starts_with('(') {
            return Ok(Cycle::from_str(trimmed)?.into());
        }

        let mut cycles = Vec::new();
        let mut rest = trimmed;
        while !rest.is_empty() {
            let body = rest
                .strip_prefix('(')
                .ok_or_else(|| parse_error("expected '('"))?;
            let end = body.find(')').ok_or_else(|| parse_error("unclosed '('"))?;
            let symbols = parse_symbols(&body[..end]).map_err(|reason| parse_error(&reason))?;
            cycles.push(Cycle::new(symbols)?);
            rest = body[end + 1..].trim_start();
        }
        MulticyclePermutation::new(cycles)
    }
}

impl AsPermutation for MulticyclePermutation {
    fn max_symbol(&self) -> Option<Symbol> {
        MulticyclePermutation::max_symbol(self)
    }

    fn write_images(&self, map: &mut [Symbol], support: &mut BitSlice) {
        for c in &self.cycles {
            c.write_images(map, support);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multi(s: &str) -> MulticyclePermutation {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(multi("(3,0)(1,2)").to_string(), "(0 3)(1 2)");
        assert_eq!(multi("(0 4 2) (1 5 3)").to_string(), "(0 4 2)(1 5 3)");
        assert_eq!(multi("0 2 1").to_string(), "(0 2 1)");
        assert!(multi("").is_identity());
        assert_eq!(
            "(0 1)(1 2)".parse::<MulticyclePermutation>(),
            Err(PermutationError::DuplicateSymbol(1))
        );
        assert!(matches!(
            "(0 1)(2".parse::<MulticyclePermutation>(),
            Err(PermutationError::Parse { .. })
        ));
    }

    #[test]
    fn test_norms() {
        let spi = multi("(0 2 7 4)(1 5 3 6)(8)(9 10 11)");
        assert_eq!(spi.number_of_symbols(), 12);
        assert_eq!(spi.number_of_even_cycles(), 2);
        assert_eq!(spi.three_norm(), 5);
        assert_eq!(spi.norm(), 8);
        assert_eq!(spi.non_trivial_cycles().count(), 3);
    }

    #[test]
    fn test_sigma_pi_inverse() {
        let pi: Cycle = "0 3 2 1".parse().unwrap();
        let spi = MulticyclePermutation::sigma_pi_inverse(&pi).unwrap();
        assert_eq!(spi, multi("(0 2)(1 3)"));

        let sorted = Cycle::canonical_pi(5).unwrap();
        assert!(MulticyclePermutation::sigma_pi_inverse(&sorted).unwrap().is_identity());
    }

    #[test]
    fn test_as_n_cycle() {
        assert_eq!(multi("(0 1 2)(3)").as_n_cycle().unwrap(), "0 1 2".parse().unwrap());
        assert!(multi("(0 1)(2 3)").as_n_cycle().is_err());
    }

    #[test]
    fn test_inverse_and_cycle_index() {
        let spi = multi("(0 3 1)(2 4)");
        assert_eq!(spi.inverse(), multi("(0 1 3)(4 2)"));
        let index = spi.cycle_index();
        assert_eq!(index[3], index[1]);
        assert_ne!(index[2], index[0]);
        assert_eq!(spi.cycle_of(4).map(Cycle::len), Some(2));
    }
}
