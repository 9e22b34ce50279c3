//! Move classification and sequence validation.
//!
//! A transposition `ρ = (a b c)` acts on a configuration `(spi, pi)` by
//! `spi ↦ spi·ρ⁻¹` and `pi ↦ ρ·pi`. Its effect on the lower bound is decided by
//! how many odd-length cycles it creates or destroys among the (at most three)
//! `spi` cycles it touches.

use std::fmt;

use bitvec::vec::BitVec;
use itertools::Itertools;
use thiserror::Error;

use crate::{
    configuration::{open_gate_symbols, Configuration, DenseConfiguration},
    permutation::{Cycle, MulticyclePermutation, Symbol},
    search::{Ratio, RATIO_11_8, RATIO_3_2},
};

/// Largest number of open gates a component may keep and still be extended.
pub const MAX_OPEN_GATES: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("sequence for {key} is not an (11,8)-sequence")]
    PatternMismatch { key: String },
    #[error("move {index} ({rho}) is not applicable to {pi}")]
    NotApplicable { index: usize, rho: String, pi: String },
    #[error("{moves} moves exceed {ratio} of a lower-bound reduction of {reduction}")]
    RatioExceeded {
        moves: usize,
        reduction: usize,
        ratio: Ratio,
    },
    #[error("sequence leaves {remaining} unsorted")]
    NotSorted { remaining: String },
}

/// An oriented cycle does not follow the cyclic order of `pi⁻¹`.
///
/// Cycles of length at most two are never oriented.
pub fn is_oriented(pi: &Cycle, cycle: &Cycle) -> bool {
    !pi.inverse().is_in_cyclic_order(cycle.symbols())
}

/// `(a b c)` is a transposition of `pi`: three distinct symbols of `pi` in its
/// cyclic order.
pub fn is_applicable(pi: &Cycle, a: Symbol, b: Symbol, c: Symbol) -> bool {
    a != b && b != c && a != c && pi.is_in_cyclic_order(&[a, b, c])
}

pub fn open_gates(spi: &MulticyclePermutation, pi: &Cycle) -> Vec<Symbol> {
    open_gate_symbols(spi, pi)
}

/// The effect of one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveClass {
    /// Change in the number of odd-length cycles: `+2`, `0` or `-2`.
    pub delta: i8,
    /// Distinct `spi` cycles holding `a`, `b` and `c`.
    pub touched: u8,
}

impl MoveClass {
    pub fn is_two_move(&self) -> bool {
        self.delta == 2
    }

    pub fn extension_type(&self) -> ExtensionType {
        let gain = match self.delta {
            2 => 0,
            0 => 1,
            _ => 2,
        };
        ExtensionType(gain * 3 + self.touched.saturating_sub(1).min(2))
    }
}

/// Kind of move, ranked so that candidates are tried best first.
///
/// Types 1 to 3 are 2-moves, 4 to 6 are 0-moves and 7 to 9 are (-2)-moves;
/// within each gain the move touching fewer cycles comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtensionType(u8);

pub const EXTENSION_TYPES: [ExtensionType; 9] = [
    ExtensionType(0),
    ExtensionType(1),
    ExtensionType(2),
    ExtensionType(3),
    ExtensionType(4),
    ExtensionType(5),
    ExtensionType(6),
    ExtensionType(7),
    ExtensionType(8),
];

impl ExtensionType {
    /// 1-based number of this type.
    pub fn number(self) -> u8 {
        self.0 + 1
    }

    pub fn delta(self) -> i8 {
        2 - 2 * (self.0 / 3) as i8
    }

    pub fn touched(self) -> u8 {
        self.0 % 3 + 1
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExtensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type {} ({:+}, {} cycle{})",
            self.number(),
            self.delta(),
            self.touched(),
            if self.touched() == 1 { "" } else { "s" }
        )
    }
}

/// Classifies `rho` against `(spi, pi)`, or `None` when it is not a
/// transposition of `pi`.
pub fn classify(spi: &MulticyclePermutation, pi: &Cycle, rho: &Cycle) -> Option<MoveClass> {
    if rho.len() != 3 {
        return None;
    }
    let dense = DenseConfiguration::new(spi, pi);
    let positions = dense.positions();
    classify_dense(&dense, &positions, [rho.get(0), rho.get(1), rho.get(2)])
}

pub(crate) fn classify_dense(
    dense: &DenseConfiguration,
    positions: &[usize],
    rho: [Symbol; 3],
) -> Option<MoveClass> {
    if !dense.is_applicable(positions, rho) {
        return None;
    }
    let images = &dense.images;
    let mut members: Vec<Symbol> = Vec::new();
    let mut touched = 0u8;
    let mut before = 0i8;
    for &x in &rho {
        if members.contains(&x) {
            continue;
        }
        touched += 1;
        let start = members.len();
        let mut s = x;
        loop {
            members.push(s);
            s = images[s];
            if s == x {
                break;
            }
        }
        before += ((members.len() - start) % 2) as i8;
    }

    let [a, b, c] = rho;
    let mut after_images = images.clone();
    after_images[a] = images[c];
    after_images[b] = images[a];
    after_images[c] = images[b];

    let mut seen: BitVec = BitVec::repeat(false, images.len());
    let mut after = 0i8;
    for &x in &members {
        if seen[x] {
            continue;
        }
        let mut len = 0;
        let mut s = x;
        while !seen[s] {
            seen.set(s, true);
            len += 1;
            s = after_images[s];
        }
        after += (len % 2) as i8;
    }

    Some(MoveClass {
        delta: after - before,
        touched,
    })
}

/// Every transposition of `pi`, by increasing positions.
pub fn all_moves(pi: &Cycle) -> impl Iterator<Item = Cycle> + '_ {
    pi.symbols()
        .iter()
        .copied()
        .tuple_combinations()
        .map(|(a, b, c)| Cycle::from_trusted(vec![a, b, c]))
}

/// A 2-move acting inside a single oriented cycle.
pub fn two_move_from_oriented_cycle(spi: &MulticyclePermutation, pi: &Cycle) -> Option<Cycle> {
    for cycle in spi.cycles() {
        if cycle.len() < 3 || !is_oriented(pi, cycle) {
            continue;
        }
        let before = usize::from(cycle.is_even());
        for (a, b, c) in cycle.symbols().iter().copied().tuple_combinations() {
            if !pi.is_in_cyclic_order(&[a, b, c]) {
                continue;
            }
            let after = [(a, b), (b, c), (c, a)]
                .into_iter()
                .filter(|&(x, y)| cycle.distance(x, y).is_some_and(|k| k % 2 == 1))
                .count();
            if after == before + 2 {
                return Some(Cycle::from_trusted(vec![a, b, c]));
            }
        }
    }
    None
}

/// A 2-move joining two even-length cycles into two odd-length ones.
pub fn two_move_joining_even_length_cycles(spi: &MulticyclePermutation, pi: &Cycle) -> Option<Cycle> {
    let mut even_length = spi.cycles().iter().filter(|c| c.len() % 2 == 0);
    let (first, second) = (even_length.next()?, even_length.next()?);
    let a = first.get(0);
    let b = first.image(a);
    let c = second.get(0);
    let symbols = if pi.is_in_cyclic_order(&[a, b, c]) {
        vec![a, b, c]
    } else {
        vec![a, c, b]
    };
    Some(Cycle::from_trusted(symbols))
}

/// Two consecutive 2-moves.
pub fn two_two_sequence(spi: &MulticyclePermutation, pi: &Cycle) -> Option<Vec<Cycle>> {
    let dense = DenseConfiguration::new(spi, pi);
    let positions = dense.positions();
    for first in dense.moves() {
        if !classify_dense(&dense, &positions, first).is_some_and(|m| m.is_two_move()) {
            continue;
        }
        let mut next = dense.clone();
        next.apply(&positions, first);
        let next_positions = next.positions();
        let second = next
            .moves()
            .find(|&m| classify_dense(&next, &next_positions, m).is_some_and(|c| c.is_two_move()));
        if let Some(second) = second {
            return Some(vec![
                Cycle::from_trusted(first.to_vec()),
                Cycle::from_trusted(second.to_vec()),
            ]);
        }
    }
    None
}

/// The (3,2)-sequence `(a b c)(b c d)(c d e)` of an oriented 5-cycle read as
/// `(a d b e c)`.
pub fn bad_oriented_five_cycle_sequence(spi: &MulticyclePermutation, pi: &Cycle) -> Option<Vec<Cycle>> {
    for cycle in spi.cycles() {
        if cycle.len() != 5 || !is_oriented(pi, cycle) {
            continue;
        }
        for r in 0..5 {
            let [a, d, b, e, c] = [0, 1, 2, 3, 4].map(|i| cycle.get(r + i));
            let sequence = vec![
                Cycle::from_trusted(vec![a, b, c]),
                Cycle::from_trusted(vec![b, c, d]),
                Cycle::from_trusted(vec![c, d, e]),
            ];
            if is_ratio_sequence(spi, pi, &sequence, RATIO_3_2) {
                return Some(sequence);
            }
        }
    }
    None
}

/// `moves` applies in order and lowers the lower bound by some `r > 0` with
/// `moves.len() ≤ ratio · r`.
pub fn is_ratio_sequence(spi: &MulticyclePermutation, pi: &Cycle, moves: &[Cycle], ratio: Ratio) -> bool {
    if moves.is_empty() {
        return false;
    }
    let mut dense = DenseConfiguration::new(spi, pi);
    let before = dense.lower_bound();
    for rho in moves {
        if rho.len() != 3 || !dense.try_apply([rho.get(0), rho.get(1), rho.get(2)]) {
            return false;
        }
    }
    let after = dense.lower_bound();
    after < before && ratio.allows(moves.len(), before - after)
}

pub fn is_11_8(spi: &MulticyclePermutation, pi: &Cycle, moves: &[Cycle]) -> bool {
    is_ratio_sequence(spi, pi, moves, RATIO_11_8)
}

/// Fails with [`ClassifierError::PatternMismatch`] unless `moves` is an
/// (11,8)-sequence of `config`.
pub fn check_11_8(config: &Configuration, moves: &[Cycle]) -> Result<(), ClassifierError> {
    if is_11_8(config.spi(), config.pi(), moves) {
        Ok(())
    } else {
        Err(ClassifierError::PatternMismatch {
            key: config.key().to_string(),
        })
    }
}

/// Like [`is_ratio_sequence`], reporting why `moves` falls short.
pub fn check_ratio_sequence(config: &Configuration, moves: &[Cycle], ratio: Ratio) -> Result<(), ClassifierError> {
    let mut dense = config.dense();
    let before = dense.lower_bound();
    for (index, rho) in moves.iter().enumerate() {
        if rho.len() != 3 || !dense.try_apply([rho.get(0), rho.get(1), rho.get(2)]) {
            return Err(ClassifierError::NotApplicable {
                index,
                rho: rho.to_string(),
                pi: dense.pi().to_string(),
            });
        }
    }
    let reduction = before.saturating_sub(dense.lower_bound());
    if moves.is_empty() || reduction == 0 || !ratio.allows(moves.len(), reduction) {
        return Err(ClassifierError::RatioExceeded {
            moves: moves.len(),
            reduction,
            ratio,
        });
    }
    Ok(())
}

/// Replays `moves` on `config`, which must end sorted within `ratio` of the
/// lower bound.
pub fn validate_sorting(config: &Configuration, moves: &[Cycle], ratio: Ratio) -> Result<(), ClassifierError> {
    let mut dense = config.dense();
    for (index, rho) in moves.iter().enumerate() {
        if rho.len() != 3 || !dense.try_apply([rho.get(0), rho.get(1), rho.get(2)]) {
            return Err(ClassifierError::NotApplicable {
                index,
                rho: rho.to_string(),
                pi: dense.pi().to_string(),
            });
        }
    }
    if !dense.is_sorted() {
        return Err(ClassifierError::NotSorted {
            remaining: dense.spi().to_string(),
        });
    }
    let reduction = config.lower_bound();
    if !ratio.allows(moves.len(), reduction) {
        return Err(ClassifierError::RatioExceeded {
            moves: moves.len(),
            reduction,
            ratio,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrangement(pi: &str) -> (MulticyclePermutation, Cycle) {
        let pi: Cycle = pi.parse().unwrap();
        (MulticyclePermutation::sigma_pi_inverse(&pi).unwrap(), pi)
    }

    fn cycles(list: &[[Symbol; 3]]) -> Vec<Cycle> {
        list.iter().map(|m| Cycle::new(m.to_vec()).unwrap()).collect()
    }

    #[test]
    fn test_orientation() {
        let pi: Cycle = "0 5 4 3 8 7 6 2 1".parse().unwrap();
        let alpha: Cycle = "0 2 7".parse().unwrap();
        assert!(pi.inverse().is_in_cyclic_order(alpha.symbols()));
        assert!(!pi.is_in_cyclic_order(alpha.symbols()));
        assert!(is_oriented(&pi, alpha.inverse()));
        assert!(!is_oriented(&pi, &alpha));
    }

    #[test]
    fn test_applicability() {
        let pi: Cycle = "0 3 2 1".parse().unwrap();
        assert!(is_applicable(&pi, 0, 3, 2));
        assert!(is_applicable(&pi, 2, 1, 0));
        assert!(!is_applicable(&pi, 0, 2, 3));
        assert!(!is_applicable(&pi, 0, 0, 3));
        assert_eq!(all_moves(&pi).count(), 4);
    }

    #[test]
    fn test_classify() {
        let (spi, pi) = arrangement("0 3 2 1");
        let class = classify(&spi, &pi, &"0 3 2".parse().unwrap()).unwrap();
        assert_eq!(class, MoveClass { delta: 2, touched: 2 });
        assert_eq!(class.extension_type().number(), 2);
        assert_eq!(classify(&spi, &pi, &"0 2 3".parse().unwrap()), None);

        let sorted = Cycle::canonical_pi(4).unwrap();
        let identity = MulticyclePermutation::sigma_pi_inverse(&sorted).unwrap();
        let class = classify(&identity, &sorted, &"0 1 2".parse().unwrap()).unwrap();
        assert_eq!(class.delta, -2);
        assert_eq!(class.touched, 3);
    }

    #[test]
    fn test_extension_type_order() {
        let rendered = EXTENSION_TYPES.iter().map(ToString::to_string).join("\n");
        insta::assert_snapshot!(rendered, @r"
        type 1 (+2, 1 cycle)
        type 2 (+2, 2 cycles)
        type 3 (+2, 3 cycles)
        type 4 (+0, 1 cycle)
        type 5 (+0, 2 cycles)
        type 6 (+0, 3 cycles)
        type 7 (-2, 1 cycle)
        type 8 (-2, 2 cycles)
        type 9 (-2, 3 cycles)
        ");
        assert!(EXTENSION_TYPES.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_two_move_from_oriented_cycle() {
        let (spi, pi) = arrangement("0 2 1 4 3");
        let rho = two_move_from_oriented_cycle(&spi, &pi).unwrap();
        assert_eq!(rho, "0 4 3".parse().unwrap());
        assert!(classify(&spi, &pi, &rho).unwrap().is_two_move());

        let (spi, pi) = arrangement("0 4 3 2 1");
        assert_eq!(two_move_from_oriented_cycle(&spi, &pi), None);
    }

    #[test]
    fn test_two_move_joining_even_length_cycles() {
        let (spi, pi) = arrangement("0 3 2 1");
        let rho = two_move_joining_even_length_cycles(&spi, &pi).unwrap();
        assert!(classify(&spi, &pi, &rho).unwrap().is_two_move());

        let (spi, pi) = arrangement("0 4 3 2 1");
        assert_eq!(two_move_joining_even_length_cycles(&spi, &pi), None);
    }

    #[test]
    fn test_two_two_sequence_sorts_small_reversal() {
        let (spi, pi) = arrangement("0 3 2 1");
        let config = Configuration::new(spi.clone(), pi.clone()).unwrap();
        let sequence = two_two_sequence(&spi, &pi).unwrap();
        assert_eq!(sequence.len(), 2);
        assert_eq!(validate_sorting(&config, &sequence, RATIO_3_2), Ok(()));
    }

    #[test]
    fn test_bad_oriented_five_cycle() {
        let (spi, pi) = arrangement("0 4 3 2 1");
        let config = Configuration::new(spi.clone(), pi.clone()).unwrap();
        let sequence = bad_oriented_five_cycle_sequence(&spi, &pi).unwrap();
        assert_eq!(sequence.len(), 3);
        assert_eq!(validate_sorting(&config, &sequence, RATIO_3_2), Ok(()));
    }

    #[test]
    fn test_ratio_sequences() {
        let (spi, pi) = arrangement("0 3 6 2 5 1 4");
        let config = Configuration::new(spi.clone(), pi.clone()).unwrap();
        let sorting = cycles(&[[0, 3, 6], [3, 6, 5], [6, 5, 1], [2, 0, 4]]);

        assert!(is_ratio_sequence(&spi, &pi, &sorting, RATIO_3_2));
        assert!(is_11_8(&spi, &pi, &sorting));
        assert_eq!(check_11_8(&config, &sorting), Ok(()));

        // A 0-move then a 2-move: two moves for one unit of lower bound.
        assert!(!is_ratio_sequence(&spi, &pi, &sorting[..1], RATIO_3_2));
        assert!(!is_11_8(&spi, &pi, &sorting[..2]));
        assert!(matches!(
            check_11_8(&config, &sorting[..2]),
            Err(ClassifierError::PatternMismatch { .. })
        ));
        assert!(!is_ratio_sequence(&spi, &pi, &[], RATIO_3_2));
    }

    #[test]
    fn test_check_ratio_sequence() {
        let (spi, pi) = arrangement("0 3 6 2 5 1 4");
        let config = Configuration::new(spi, pi).unwrap();
        let sorting = cycles(&[[0, 3, 6], [3, 6, 5], [6, 5, 1], [2, 0, 4]]);

        assert_eq!(check_ratio_sequence(&config, &sorting[..3], RATIO_3_2), Ok(()));
        assert_eq!(
            check_ratio_sequence(&config, &sorting[..2], RATIO_3_2),
            Err(ClassifierError::RatioExceeded {
                moves: 2,
                reduction: 1,
                ratio: RATIO_3_2
            })
        );
        assert!(matches!(
            check_ratio_sequence(&config, &cycles(&[[0, 6, 3]]), RATIO_3_2),
            Err(ClassifierError::NotApplicable { index: 0, .. })
        ));
    }

    #[test]
    fn test_validate_sorting_errors() {
        let (spi, pi) = arrangement("0 3 6 2 5 1 4");
        let config = Configuration::new(spi, pi).unwrap();
        let sorting = cycles(&[[0, 3, 6], [3, 6, 5], [6, 5, 1], [2, 0, 4]]);

        assert_eq!(validate_sorting(&config, &sorting, RATIO_3_2), Ok(()));
        assert!(matches!(
            validate_sorting(&config, &sorting, Ratio::new(1, 1)),
            Err(ClassifierError::RatioExceeded { moves: 4, reduction: 3, .. })
        ));
        assert!(matches!(
            validate_sorting(&config, &sorting[..3], RATIO_3_2),
            Err(ClassifierError::NotSorted { .. })
        ));
        assert!(matches!(
            validate_sorting(&config, &cycles(&[[0, 6, 3]]), RATIO_3_2),
            Err(ClassifierError::NotApplicable { index: 0, .. })
        ));
    }
}
