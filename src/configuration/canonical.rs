//! Canonical forms of configurations.
//!
//! A configuration `(spi, pi)` is relabeled so that `pi` reads `(0 1 ... n-1)`.
//! There are `n` such relabelings, one per starting symbol of `pi`, and as many
//! again for the *mirror* `(spi⁻¹, spi·pi⁻¹·spi⁻¹)`, which is sorted by the same
//! number of moves. Each relabeling turns `spi` into a dense image vector; the
//! lexicographically smallest vector is the canonical key.
//!
//! The key is a map, so permuting or rotating the cycles of `spi` never changes
//! it and the automorphisms of the cycle structure need no separate enumeration.
//! The group searched has exactly `2n` elements, each costing `O(n)`.

use std::fmt;

use ahash::RandomState;

use super::dense::DenseConfiguration;
use crate::permutation::{Cycle, MulticyclePermutation, Symbol};

/// Fixed seeds keep fingerprints stable across runs and processes.
const FINGERPRINT_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// The relabeled image vector of `spi`: entry `i` is the image of `i` once `pi`
/// has been renamed to `(0 1 ... n-1)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CanonicalKey(Vec<Symbol>);

impl CanonicalKey {
    pub fn images(&self) -> &[Symbol] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deterministic 64-bit digest of the key.
    pub fn fingerprint(&self) -> u64 {
        let [k0, k1, k2, k3] = FINGERPRINT_SEEDS;
        RandomState::with_seeds(k0, k1, k2, k3).hash_one(&self.0)
    }

    /// The canonical `spi`, fixed points included.
    pub fn spi(&self) -> MulticyclePermutation {
        let mut seen = vec![false; self.0.len()];
        let mut cycles = Vec::new();
        for start in 0..self.0.len() {
            if seen[start] {
                continue;
            }
            let mut symbols = Vec::new();
            let mut s = start;
            while !seen[s] {
                seen[s] = true;
                symbols.push(s);
                s = self.0[s];
            }
            cycles.push(Cycle::from_trusted(symbols));
        }
        MulticyclePermutation::from_trusted(cycles)
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, s) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{s}")?;
        }
        write!(f, "]")
    }
}

/// How a configuration maps onto its canonical representative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relabeling {
    /// Whether the minimum was reached on the mirror.
    pub mirrored: bool,
    /// `labels[i]` is the live symbol renamed to `i`.
    pub labels: Vec<Symbol>,
}

impl Relabeling {
    /// Live symbol → canonical symbol, as a dense lookup sized to the largest live symbol.
    pub fn to_canonical(&self) -> Vec<Option<Symbol>> {
        let size = self.labels.iter().max().map_or(0, |&m| m + 1);
        let mut inverse = vec![None; size];
        for (i, &s) in self.labels.iter().enumerate() {
            inverse[s] = Some(i);
        }
        inverse
    }
}

impl DenseConfiguration {
    /// `(spi⁻¹, spi·pi⁻¹·spi⁻¹)`, with the mirrored arrangement read from
    /// the first symbol of `pi`.
    pub(crate) fn mirror(&self) -> Self {
        let n = self.arrangement.len();
        let spi_inverse = self.inverse_images();

        let mut pi_inverse = self.images.clone();
        for (i, &s) in self.arrangement.iter().enumerate() {
            pi_inverse[s] = self.arrangement[(i + n - 1) % n];
        }

        let mut arrangement = Vec::with_capacity(n);
        let start = self.arrangement[0];
        let mut s = start;
        loop {
            arrangement.push(s);
            s = self.images[pi_inverse[spi_inverse[s]]];
            if s == start || arrangement.len() == n {
                break;
            }
        }

        DenseConfiguration {
            arrangement,
            images: spi_inverse,
        }
    }

    /// The key obtained by renaming `arrangement[start + i]` to `i`.
    fn key_from(&self, start: usize, positions: &[usize], out: &mut Vec<Symbol>) {
        let n = self.arrangement.len();
        out.clear();
        out.extend((0..n).map(|i| {
            let s = self.arrangement[(start + i) % n];
            (positions[self.images[s]] + n - start) % n
        }));
    }

    /// Every `(key, relabeling)` pair of the orbit, identity rotation first.
    pub(crate) fn orbit(&self) -> impl Iterator<Item = (CanonicalKey, Relabeling)> {
        let mirror = self.mirror();
        let variants = [(false, self.clone()), (true, mirror)];
        variants.into_iter().flat_map(|(mirrored, dense)| {
            let positions = dense.positions();
            let n = dense.arrangement.len();
            (0..n).map(move |start| {
                let mut key = Vec::with_capacity(n);
                dense.key_from(start, &positions, &mut key);
                let labels = (0..n).map(|i| dense.arrangement[(start + i) % n]).collect();
                (CanonicalKey(key), Relabeling { mirrored, labels })
            })
        })
    }

    /// The smallest key of the orbit, with the first relabeling reaching it.
    pub(crate) fn canonicalize(&self) -> (CanonicalKey, Relabeling) {
        let n = self.arrangement.len();
        let mut best: Option<(Vec<Symbol>, bool, usize, usize)> = None;
        let mut key = Vec::with_capacity(n);

        let mirror = self.mirror();
        for (variant, dense) in [self, &mirror].into_iter().enumerate() {
            let positions = dense.positions();
            for start in 0..n {
                dense.key_from(start, &positions, &mut key);
                if best.as_ref().map_or(true, |(b, ..)| key < *b) {
                    best = Some((key.clone(), variant == 1, variant, start));
                }
            }
        }

        let (key, mirrored, variant, start) = best.unwrap_or_default();
        let dense = if variant == 1 { &mirror } else { self };
        let labels = (0..n).map(|i| dense.arrangement[(start + i) % n]).collect();
        (CanonicalKey(key), Relabeling { mirrored, labels })
    }
}

/// Rewrites a sorting of some configuration as a sorting of its mirror.
///
/// With `spi_k = spi·ρ₁⁻¹…ρₖ⁻¹`, the mirrored move is `spi_k·ρₖ⁻¹·spi_k⁻¹`.
pub(crate) fn mirror_sorting(images: &[Symbol], sorting: &[[Symbol; 3]]) -> Vec<[Symbol; 3]> {
    let mut spi = images.to_vec();
    sorting
        .iter()
        .map(|&[a, b, c]| {
            let (sa, sb, sc) = (spi[a], spi[b], spi[c]);
            spi[a] = sc;
            spi[b] = sa;
            spi[c] = sb;
            [spi[a], spi[c], spi[b]]
        })
        .collect()
}
