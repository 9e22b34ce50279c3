//! # Permutations
//!
//! This module provides the permutation algebra the rest of the crate is built on.
//!
//! ## Key Features:
//!
//! - **Symbols**: every permutation acts on small non-negative integer labels ([`Symbol`]).
//! - **Dense form**: a [`Permutation`] is stored by its direct mapping (`map[i]` is
//!   the image of `i`) and its inverse mapping. It is the workhorse for composition.
//! - **Cycle form**:
//!   - [`Cycle`]: a single cyclic sequence of distinct symbols, equal up to rotation.
//!   - [`MulticyclePermutation`]: a collection of disjoint cycles.
//! - **Products**: [`compute_product`] multiplies any mix of cycles, multicycle
//!   permutations and dense permutations, applying the rightmost factor first.
//! - **Enumeration**: [`Permutation::generate_all`] closes a generator set under
//!   composition, which is how the case generators walk every arrangement of a
//!   fixed cycle structure.

use std::fmt;

use ahash::AHashSet;
use bitvec::{slice::BitSlice, vec::BitVec};
use itertools::Itertools;
use thiserror::Error;

pub mod cycle;
pub mod multicycle;

pub use cycle::Cycle;
pub use multicycle::MulticyclePermutation;

/// A label acted upon by permutations.
pub type Symbol = usize;

/// A permutation of `0..n`, stored together with its inverse.
///
/// # Examples
///
/// ```
/// use sbtkit::permutation::Permutation;
///
/// let p = Permutation::from_map(vec![2, 0, 1, 3]);
/// assert_eq!(p.inverse().map(), &[1, 2, 0, 3]);
/// assert_eq!(p.to_string(), "(0 2 1) [2 0 1 3]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Permutation {
    map: Vec<usize>,
    inv: Vec<usize>,
}

impl Permutation {
    // --------------------------------------------------------------------------------------------
    // Basic Constructors and Accessors
    // --------------------------------------------------------------------------------------------

    /// Creates the identity permutation of length `n`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sbtkit::permutation::Permutation;
    /// let p = Permutation::id(4);
    /// assert!(p.is_identity());
    /// ```
    pub fn id(n: usize) -> Self {
        Permutation {
            map: (0..n).collect(),
            inv: (0..n).collect(),
        }
    }

    /// The permutation sending `i` to `map[i]`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sbtkit::permutation::Permutation;
    /// let p = Permutation::from_map(vec![2, 0, 1]);
    /// assert_eq!(p.map(), &[2, 0, 1]);
    /// ```
    pub fn from_map(map: Vec<usize>) -> Self {
        let mut inv = vec![0; map.len()];
        for (i, &j) in map.iter().enumerate() {
            inv[j] = i;
        }
        Permutation { map, inv }
    }

    /// Images, indexed by symbol.
    pub fn map(&self) -> &[usize] {
        &self.map
    }

    pub fn length(&self) -> usize {
        self.map.len()
    }

    // --------------------------------------------------------------------------------------------
    // Basic Operations
    // --------------------------------------------------------------------------------------------

    /// Returns the inverse of the permutation.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sbtkit::permutation::Permutation;
    /// let p = Permutation::from_map(vec![2, 0, 1]);
    /// assert_eq!(p.inverse().map(), &[1, 2, 0]);
    /// ```
    pub fn inverse(&self) -> Self {
        Permutation {
            map: self.inv.clone(),
            inv: self.map.clone(),
        }
    }

    /// `self ∘ other`, applying `other` first.
    pub fn compose(&self, other: &Self) -> Self {
        let map = other.map.iter().map(|&i| self.map[i]).collect();
        Self::from_map(map)
    }

    pub fn is_identity(&self) -> bool {
        self.map.iter().enumerate().all(|(i, &m)| i == m)
    }

    // --------------------------------------------------------------------------------------------
    // Cycles
    // --------------------------------------------------------------------------------------------

    /// Every cycle of `self`, fixed points included, each starting at its
    /// smallest index: `[0, 2, 1]` sends `0` to `2`, `2` to `1` and `1` to `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use sbtkit::permutation::Permutation;
    /// let p = Permutation::from_map(vec![2, 0, 1, 3]);
    /// assert_eq!(p.find_cycles(), vec![vec![0, 2, 1], vec![3]]);
    /// ```
    pub fn find_cycles(&self) -> Vec<Vec<usize>> {
        let mut visited: BitVec = BitVec::repeat(false, self.map.len());
        let mut cycles = Vec::new();
        for i in 0..self.map.len() {
            if visited[i] {
                continue;
            }
            let mut cycle = Vec::new();
            let mut j = i;
            while !visited[j] {
                visited.set(j, true);
                cycle.push(j);
                j = self.map[j];
            }
            cycles.push(cycle);
        }
        cycles
    }

    // --------------------------------------------------------------------------------------------
    // Enumeration
    // --------------------------------------------------------------------------------------------

    /// The two classic generators of the symmetric group on `0..n`: the swap `(0 1)`
    /// and the long cycle `(0 1 ... n-1)`.
    pub fn symmetric_group_generators(n: usize) -> Vec<Permutation> {
        if n < 2 {
            return vec![Permutation::id(n)];
        }
        let mut swap: Vec<usize> = (0..n).collect();
        swap.swap(0, 1);
        let shift = (0..n).map(|i| (i + 1) % n).collect();
        vec![Permutation::from_map(swap), Permutation::from_map(shift)]
    }

    /// Closes `generators` under composition and returns every element of the
    /// generated group, in no particular order.
    pub fn generate_all(generators: &[Permutation]) -> Result<Vec<Permutation>, PermutationError> {
        let size = if let Some(generator) = generators.first() {
            generator.length()
        } else {
            return Err(PermutationError::EmptyGenerators);
        };
        for g in generators {
            if g.length() != size {
                return Err(PermutationError::InvalidGeneratorLength);
            }
        }

        let mut all = AHashSet::new();
        all.insert(Permutation::id(size));
        let mut stack = vec![Permutation::id(size)];

        while let Some(current) = stack.pop() {
            for g in generators {
                let next = current.compose(g);
                if all.insert(next.clone()) {
                    stack.push(next);
                }
            }
        }

        Ok(all.into_iter().collect())
    }
}

impl fmt::Display for Permutation {
    /// Cycle notation without fixed points, then the images in brackets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let moved = self.find_cycles().into_iter().filter(|c| c.len() > 1).collect_vec();
        if moved.is_empty() {
            write!(f, "()")?;
        }
        for (i, cycle) in moved.iter().enumerate() {
            let sep = if i > 0 { " " } else { "" };
            write!(f, "{sep}({})", cycle.iter().join(" "))?;
        }
        write!(f, " [{}]", self.map.iter().join(" "))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermutationError {
    #[error("malformed cycle notation {input:?}: {reason}")]
    Parse { input: String, reason: String },

    #[error("symbol {0} occurs more than once")]
    DuplicateSymbol(Symbol),

    #[error("a cycle needs at least one symbol")]
    EmptyCycle,

    #[error("symbol {symbol} lies outside the domain 0..{size}")]
    DomainMismatch { symbol: Symbol, size: usize },

    #[error("{0} is not a single cycle")]
    NotASingleCycle(String),

    #[error("({a} {b} {c}) is not a transposition applicable to {target}")]
    NotApplicable {
        a: Symbol,
        b: Symbol,
        c: Symbol,
        target: String,
    },

    #[error("Invalid generator length")]
    InvalidGeneratorLength,

    #[error("Empty generators")]
    EmptyGenerators,
}

/// Anything that can be fed to [`compute_product`].
pub trait AsPermutation {
    /// Largest symbol named by `self`, if any.
    fn max_symbol(&self) -> Option<Symbol>;

    /// Overwrites `map[s]` with the image of every symbol `s` named by `self`
    /// and marks those symbols in `support`.
    fn write_images(&self, map: &mut [Symbol], support: &mut BitSlice);
}

impl AsPermutation for Permutation {
    fn max_symbol(&self) -> Option<Symbol> {
        self.map.len().checked_sub(1)
    }

    fn write_images(&self, map: &mut [Symbol], support: &mut BitSlice) {
        for (i, &image) in self.map.iter().enumerate() {
            map[i] = image;
            support.set(i, true);
        }
    }
}

/// Multiplies `factors`, applying the rightmost one first, and returns the
/// product as disjoint cycles over the symbols named by at least one factor.
///
/// The domain is `0..=max symbol`. With `include_fixed` the fixed points of the
/// product appear as 1-cycles.
///
/// # Examples
///
/// ```
/// # use sbtkit::permutation::{compute_product, Cycle, MulticyclePermutation};
/// let rho: Cycle = "0 4 1".parse().unwrap();
/// let pi: Cycle = "0 4 5 6 1 2 3".parse().unwrap();
/// let product = compute_product(false, &[&rho, &pi]);
/// assert_eq!(product, MulticyclePermutation::from("0 1 2 3 4 5 6".parse::<Cycle>().unwrap()));
/// ```
pub fn compute_product(include_fixed: bool, factors: &[&dyn AsPermutation]) -> MulticyclePermutation {
    let n = factors
        .iter()
        .filter_map(|f| f.max_symbol())
        .max()
        .map_or(0, |max| max + 1);
    product_over(n, include_fixed, factors)
}

/// Like [`compute_product`] over the explicit domain `0..n`; fails if any factor
/// names a symbol outside it.
pub fn compute_product_sized(
    n: usize,
    include_fixed: bool,
    factors: &[&dyn AsPermutation],
) -> Result<MulticyclePermutation, PermutationError> {
    if let Some(symbol) = factors
        .iter()
        .filter_map(|f| f.max_symbol())
        .find(|&max| max >= n)
    {
        return Err(PermutationError::DomainMismatch { symbol, size: n });
    }
    Ok(product_over(n, include_fixed, factors))
}

fn product_over(n: usize, include_fixed: bool, factors: &[&dyn AsPermutation]) -> MulticyclePermutation {
    let mut support: BitVec = BitVec::repeat(false, n);
    let mut product = Permutation::id(n);
    let mut scratch: Vec<Symbol> = Vec::with_capacity(n);

    for factor in factors.iter().rev() {
        scratch.clear();
        scratch.extend(0..n);
        factor.write_images(&mut scratch, &mut support);
        product = Permutation::from_map(std::mem::take(&mut scratch)).compose(&product);
    }

    let cycles = product
        .find_cycles()
        .into_iter()
        .filter(|c| support[c[0]] && (include_fixed || c.len() > 1))
        .map(Cycle::from_trusted)
        .collect();
    MulticyclePermutation::from_trusted(cycles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_and_inverse() {
        let p = Permutation::from_map(vec![1, 2, 0]);
        let q = p.inverse();
        assert!(p.compose(&q).is_identity());
        assert_eq!(p.compose(&p).map(), &[2, 0, 1]);
    }

    #[test]
    fn test_find_cycles_covers_every_index() {
        let p = Permutation::from_map(vec![3, 2, 1, 0, 4]);
        let cycles = p.find_cycles();
        assert_eq!(cycles, vec![vec![0, 3], vec![1, 2], vec![4]]);
    }

    #[test]
    fn test_generate_all_symmetric_group() {
        for n in 1..=5 {
            let all = Permutation::generate_all(&Permutation::symmetric_group_generators(n)).unwrap();
            let factorial: usize = (1..=n).product();
            assert_eq!(all.len(), factorial, "S_{n}");
        }
    }

    #[test]
    fn test_generate_all_rejects_bad_generators() {
        assert_eq!(
            Permutation::generate_all(&[]),
            Err(PermutationError::EmptyGenerators)
        );
        assert_eq!(
            Permutation::generate_all(&[Permutation::id(2), Permutation::id(3)]),
            Err(PermutationError::InvalidGeneratorLength)
        );
    }

    #[test]
    fn test_product_of_transposition_and_arrangement() {
        let rho: Cycle = "0 4 1".parse().unwrap();
        let pi: Cycle = "0 4 5 6 1 2 3".parse().unwrap();
        let expected = MulticyclePermutation::from("0 1 2 3 4 5 6".parse::<Cycle>().unwrap());
        assert_eq!(compute_product(false, &[&rho, &pi]), expected);
    }

    #[test]
    fn test_product_with_inverse_is_identity() {
        let cycle: Cycle = "0 1 2 3 4 5".parse().unwrap();
        let without_fixed = compute_product(false, &[&cycle, cycle.inverse()]);
        assert!(without_fixed.cycles().is_empty());

        let with_fixed = compute_product(true, &[&cycle, cycle.inverse()]);
        assert_eq!(with_fixed.to_string(), "(0)(1)(2)(3)(4)(5)");
        assert!(with_fixed.is_identity());
    }

    #[test]
    fn test_product_order_is_right_to_left() {
        // (0 1)(1 2): 2 -> 1 -> 0, 0 -> 1, 1 -> 2
        let a: Cycle = "0 1".parse().unwrap();
        let b: Cycle = "1 2".parse().unwrap();
        let product = compute_product(false, &[&a, &b]);
        assert_eq!(product.to_string(), "(0 1 2)");
    }

    #[test]
    fn test_sized_product_rejects_foreign_symbols() {
        let a: Cycle = "0 5".parse().unwrap();
        assert_eq!(
            compute_product_sized(4, false, &[&a]),
            Err(PermutationError::DomainMismatch { symbol: 5, size: 4 })
        );
        assert!(compute_product_sized(6, false, &[&a]).is_ok());
    }

    #[test]
    fn test_display() {
        let p = Permutation::from_map(vec![1, 0, 2]);
        assert_eq!(p.to_string(), "(0 1) [1 0 2]");
        assert_eq!(Permutation::id(2).to_string(), "() [0 1]");
    }
}
