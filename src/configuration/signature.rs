//! Signatures and open gates.

use std::fmt;

use itertools::Itertools;

use crate::{
    classifier::is_oriented,
    permutation::{Cycle, MulticyclePermutation, Symbol},
};

/// What the signature records for one position of `pi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignatureEntry {
    /// 1-based label of the `spi` cycle, numbered by first appearance in `pi`.
    pub label: usize,
    /// 1-based position inside an oriented cycle, counted from the member that
    /// comes first in `pi`. `None` for unoriented cycles.
    pub rank: Option<usize>,
}

/// The sequence of cycle labels read along `pi`.
///
/// Two configurations with the same signature have the same cycle structure
/// relative to their arrangements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    entries: Vec<SignatureEntry>,
}

impl Signature {
    pub fn new(spi: &MulticyclePermutation, pi: &Cycle) -> Self {
        let index = spi.cycle_index();
        let cycle_of = |s: Symbol| index.get(s).copied().flatten();

        let mut labels: Vec<Option<usize>> = vec![None; spi.len()];
        let mut starts: Vec<Option<Symbol>> = vec![None; spi.len()];
        let mut next_label = 1;
        let mut entries = Vec::with_capacity(pi.len());

        for &s in pi.symbols() {
            let Some(c) = cycle_of(s) else {
                entries.push(SignatureEntry {
                    label: next_label,
                    rank: None,
                });
                next_label += 1;
                continue;
            };
            let label = *labels[c].get_or_insert_with(|| {
                next_label += 1;
                next_label - 1
            });
            let cycle = &spi.cycles()[c];
            let rank = if is_oriented(pi, cycle) {
                let start = *starts[c].get_or_insert(s);
                cycle.distance(start, s).map(|d| d + 1)
            } else {
                None
            };
            entries.push(SignatureEntry { label, rank });
        }
        Signature { entries }
    }

    pub fn entries(&self) -> &[SignatureEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct cycles.
    pub fn cycle_count(&self) -> usize {
        self.entries.iter().map(|e| e.label).max().unwrap_or(0)
    }

    pub fn has_oriented_cycle(&self) -> bool {
        self.entries.iter().any(|e| e.rank.is_some())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.entries.iter().format_with(" ", |e, f| match e.rank {
            Some(rank) => f(&format_args!("{}:{}", e.label, rank)),
            None => f(&e.label),
        });
        write!(f, "{rendered}")
    }
}

/// Symbols `a` of non-trivial cycles whose pair `(a, spi(a))` is an open gate.
///
/// The pair is closed when another non-trivial cycle has a pair `(c, d)` with
/// `[a, c, b, d]` in the cyclic order of `pi⁻¹`, or when some third symbol `c`
/// of the same cycle makes `[a, b, c]` follow the order of `pi`.
pub fn open_gate_symbols(spi: &MulticyclePermutation, pi: &Cycle) -> Vec<Symbol> {
    let pi_inverse = pi.inverse();
    let cycles = spi.non_trivial_cycles().collect_vec();
    let mut open = Vec::new();

    for (i, e) in cycles.iter().enumerate() {
        for &a in e.symbols() {
            let b = e.image(a);
            let intersected = cycles.iter().enumerate().any(|(j, f)| {
                j != i
                    && f.symbols()
                        .iter()
                        .any(|&c| pi_inverse.is_in_cyclic_order(&[a, c, b, f.image(c)]))
            });
            if intersected {
                continue;
            }
            let interleaved = e
                .symbols()
                .iter()
                .any(|&c| c != a && c != b && pi.is_in_cyclic_order(&[a, b, c]));
            if !interleaved {
                open.push(a);
            }
        }
    }
    open
}

/// Some pair `(a, e(a))` of `e` and `(c, f(c))` of `f` read `[a, c, e(a), f(c)]`
/// along `pi⁻¹`.
pub(crate) fn intersects(pi_inverse: &Cycle, e: &Cycle, f: &Cycle) -> bool {
    e.symbols().iter().any(|&a| {
        let b = e.image(a);
        f.symbols()
            .iter()
            .any(|&c| pi_inverse.is_in_cyclic_order(&[a, c, b, f.image(c)]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(spi: &str) -> (MulticyclePermutation, Cycle) {
        let spi: MulticyclePermutation = spi.parse().unwrap();
        let pi = Cycle::canonical_pi(spi.number_of_symbols()).unwrap();
        (spi, pi)
    }

    #[test]
    fn test_signature_labels() {
        let (spi, pi) = parts("(0 4 2)(1 5 3)");
        let sig = Signature::new(&spi, &pi);
        insta::assert_snapshot!(sig.to_string(), @"1 2 1 2 1 2");
        assert_eq!(sig.cycle_count(), 2);
        assert!(!sig.has_oriented_cycle());
    }

    #[test]
    fn test_signature_ranks_oriented_cycle() {
        let (spi, pi) = parts("(0 1 2)");
        let sig = Signature::new(&spi, &pi);
        insta::assert_snapshot!(sig.to_string(), @"1:1 1:2 1:3");

        let (spi, pi) = parts("(0 2 4 1 3)");
        insta::assert_snapshot!(Signature::new(&spi, &pi).to_string(), @"1:1 1:4 1:2 1:5 1:3");
    }

    #[test]
    fn test_open_gate_counts() {
        let cases = [
            ("(0 2 7 4)(1 5 3 6)", 0),
            ("(0 4 2)(1 5 3)", 0),
            ("(0 4 1 6 3)(2 7 5)", 0),
            ("(0 4 1)(2 5 3)", 2),
            ("(2 7 5)(4 8 6)(0 3 1)", 1),
            ("(0 7 3)(1 6 2 8 5 4)", 1),
            ("(0 1 10)(2 9 5)(3 11 7)(4 8 6)", 0),
            ("(0 15 13 2 1)(3 16 5)(4 8 6)(7 11 9)(10 14 12)", 2),
        ];
        for (spi, expected) in cases {
            let (spi, pi) = parts(spi);
            assert_eq!(open_gate_symbols(&spi, &pi).len(), expected, "{spi}");
        }
    }

    #[test]
    fn test_single_unoriented_cycle_is_all_open() {
        let (spi, pi) = parts("(0 2 1)");
        assert_eq!(open_gate_symbols(&spi, &pi), vec![0, 2, 1]);
    }
}
