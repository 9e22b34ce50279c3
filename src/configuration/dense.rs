//! Array-backed configurations for the hot loops of classification and search.

use bitvec::vec::BitVec;

use crate::permutation::{Cycle, MulticyclePermutation, Symbol};

/// `images[s]` is the image of `s` under `spi`; `pi` symbols missing from
/// `spi`, and labels absent from `pi`, are fixed points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DenseConfiguration {
    pub(crate) arrangement: Vec<Symbol>,
    pub(crate) images: Vec<Symbol>,
}

impl DenseConfiguration {
    pub(crate) fn new(spi: &MulticyclePermutation, pi: &Cycle) -> Self {
        let size = pi.max_symbol() + 1;
        let mut images: Vec<Symbol> = (0..size).collect();
        for cycle in spi {
            for &s in cycle.symbols() {
                images[s] = cycle.image(s);
            }
        }
        DenseConfiguration {
            arrangement: pi.symbols().to_vec(),
            images,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.arrangement.len()
    }

    pub(crate) fn positions(&self) -> Vec<usize> {
        let mut positions = vec![usize::MAX; self.images.len()];
        for (i, &s) in self.arrangement.iter().enumerate() {
            positions[s] = i;
        }
        positions
    }

    pub(crate) fn inverse_images(&self) -> Vec<Symbol> {
        let mut inverse = self.images.clone();
        for (s, &t) in self.images.iter().enumerate() {
            inverse[t] = s;
        }
        inverse
    }

    /// `(n − odd-length cycles) / 2` over the symbols of the arrangement.
    pub(crate) fn lower_bound(&self) -> usize {
        let mut seen: BitVec = BitVec::repeat(false, self.images.len());
        let mut even = 0;
        for &start in &self.arrangement {
            if seen[start] {
                continue;
            }
            let mut len = 0;
            let mut s = start;
            while !seen[s] {
                seen.set(s, true);
                len += 1;
                s = self.images[s];
            }
            even += len % 2;
        }
        (self.arrangement.len() - even) / 2
    }

    pub(crate) fn is_sorted(&self) -> bool {
        self.arrangement.iter().all(|&s| self.images[s] == s)
    }

    /// Whether `(a b c)` is a transposition of this arrangement.
    pub(crate) fn is_applicable(&self, positions: &[usize], [a, b, c]: [Symbol; 3]) -> bool {
        let at = |s: Symbol| positions.get(s).copied().filter(|&p| p != usize::MAX);
        let (Some(i), Some(j), Some(k)) = (at(a), at(b), at(c)) else {
            return false;
        };
        if i == j || j == k || i == k {
            return false;
        }
        let leaps = usize::from(i > j) + usize::from(j > k) + usize::from(k > i);
        leaps <= 1
    }

    /// Applies `(a b c)`, which must be applicable: the blocks delimited by its
    /// symbols swap places and `spi` becomes `spi·ρ⁻¹`.
    pub(crate) fn apply(&mut self, positions: &[usize], [a, b, c]: [Symbol; 3]) {
        let mut idx = [positions[a], positions[b], positions[c]];
        idx.sort_unstable();
        let [i, j, k] = idx;
        self.arrangement[i..k].rotate_left(j - i);

        let (sa, sb, sc) = (self.images[a], self.images[b], self.images[c]);
        self.images[a] = sc;
        self.images[b] = sa;
        self.images[c] = sb;
    }

    /// Like [`apply`](Self::apply) but checks applicability first.
    pub(crate) fn try_apply(&mut self, rho: [Symbol; 3]) -> bool {
        let positions = self.positions();
        if !self.is_applicable(&positions, rho) {
            return false;
        }
        self.apply(&positions, rho);
        true
    }

    /// The non-trivial cycles of `spi`, each starting at its first symbol in `pi`.
    pub(crate) fn spi(&self) -> MulticyclePermutation {
        let mut seen: BitVec = BitVec::repeat(false, self.images.len());
        let mut cycles = Vec::new();
        for &start in &self.arrangement {
            if seen[start] || self.images[start] == start {
                continue;
            }
            let mut symbols = Vec::new();
            let mut s = start;
            while !seen[s] {
                seen.set(s, true);
                symbols.push(s);
                s = self.images[s];
            }
            cycles.push(Cycle::from_trusted(symbols));
        }
        MulticyclePermutation::from_trusted(cycles)
    }

    pub(crate) fn pi(&self) -> Cycle {
        Cycle::from_trusted(self.arrangement.clone())
    }

    /// Every transposition of the arrangement, as position triples `i < j < k`.
    pub(crate) fn moves(&self) -> impl Iterator<Item = [Symbol; 3]> + '_ {
        let n = self.arrangement.len();
        (0..n).flat_map(move |i| {
            (i + 1..n).flat_map(move |j| {
                (j + 1..n).map(move |k| [self.arrangement[i], self.arrangement[j], self.arrangement[k]])
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_matches_cycle_transposition() {
        let pi: Cycle = "0 3 6 2 5 1 4".parse().unwrap();
        let spi = MulticyclePermutation::sigma_pi_inverse(&pi).unwrap();
        let mut dense = DenseConfiguration::new(&spi, &pi);
        assert_eq!(dense.lower_bound(), 3);

        for rho in [[0, 3, 6], [3, 6, 5], [6, 5, 1], [2, 0, 4]] {
            let expected = Cycle::new(dense.arrangement.clone())
                .unwrap()
                .apply_transposition(&Cycle::new(rho.to_vec()).unwrap())
                .unwrap();
            assert!(dense.try_apply(rho), "{rho:?}");
            assert_eq!(dense.pi(), expected);
        }
        assert!(dense.is_sorted());
        assert_eq!(dense.lower_bound(), 0);
        assert!(dense.spi().is_empty());
    }

    #[test]
    fn test_rejects_reversed_triples() {
        let pi: Cycle = "0 1 2 3".parse().unwrap();
        let mut dense = DenseConfiguration::new(&"(0 2)(1 3)".parse().unwrap(), &pi);
        assert!(!dense.try_apply([0, 2, 1]));
        assert!(!dense.try_apply([0, 0, 1]));
        assert!(!dense.try_apply([0, 1, 7]));
        assert_eq!(dense.moves().count(), 4);
    }
}
