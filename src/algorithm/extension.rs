//! Component growth.
//!
//! A component is a list of *segments*: runs of consecutive symbols of `spi`
//! cycles, each at least three long. Growing it one extension at a time keeps
//! its 3-norm small enough for the case library to cover.

use bitvec::vec::BitVec;

use crate::{
    classifier::MAX_OPEN_GATES,
    configuration::open_gate_symbols,
    permutation::{Cycle, MulticyclePermutation, Symbol},
};

/// The ways a component grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Extension {
    /// A segment of an untouched cycle crossing an open gate.
    Intersecting,
    /// A segment of an untouched cycle interleaving a pair of the component.
    /// Only tried once every gate is closed.
    Interleaving,
    /// Two more symbols of a cycle the component holds only part of.
    Segment,
}

/// What a component looks like once it grows into `component`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: Extension,
    pub component: Vec<Cycle>,
}

/// Everything the growth rules need to know about the host configuration.
struct Host<'a> {
    spi: &'a MulticyclePermutation,
    pi: &'a Cycle,
    pi_inverse: &'a Cycle,
    cycle_index: Vec<Option<usize>>,
}

impl<'a> Host<'a> {
    fn new(spi: &'a MulticyclePermutation, pi: &'a Cycle) -> Self {
        Host {
            spi,
            pi,
            pi_inverse: pi.inverse(),
            cycle_index: spi.cycle_index(),
        }
    }

    fn cycle_of(&self, s: Symbol) -> Option<&'a Cycle> {
        let index = self.cycle_index.get(s).copied().flatten()?;
        self.spi.cycles().get(index)
    }

    fn position(&self, s: Symbol) -> Option<usize> {
        self.pi_inverse.index_of(s)
    }

    /// Symbols strictly between `a` and `b` along `pi⁻¹`, and the positions
    /// bounding them.
    fn between(&self, a: Symbol, b: Symbol) -> Option<(usize, usize, Vec<Symbol>)> {
        let n = self.pi_inverse.len();
        let (from, to) = (self.position(a)?, self.position(b)?);
        let inner = (1..(to + n - from) % n).map(|k| self.pi_inverse.get(from + k)).collect();
        Some((from, to, inner))
    }

    /// Whether `s` lies outside the closed stretch of `pi⁻¹` from `from` to `to`.
    fn is_outside(&self, from: usize, to: usize, s: Symbol) -> bool {
        let n = self.pi_inverse.len();
        self.position(s)
            .is_some_and(|p| (p + n - from) % n > (to + n - from) % n)
    }

    /// A fresh segment starting at `x` that crosses the pair at `from..to`.
    fn crossing_segment(&self, from: usize, to: usize, x: Symbol, touched: &BitVec) -> Option<Cycle> {
        let cycle = self.cycle_of(x)?;
        if cycle.len() < 3 || cycle.symbols().iter().any(|&s| touched.get(s).is_some_and(|t| *t)) {
            return None;
        }
        self.is_outside(from, to, cycle.image(x))
            .then(|| segment(cycle, x))
    }
}

/// The first three symbols of `cycle` from `start`.
fn segment(cycle: &Cycle, start: Symbol) -> Cycle {
    Cycle::from_trusted(vec![start, cycle.image(start), cycle.pow(start, 2)])
}

/// The segment a component starts from: the first three symbols of `cycle`.
pub fn seed(cycle: &Cycle) -> Option<Cycle> {
    (cycle.len() >= 3).then(|| segment(cycle, cycle.get(0)))
}

/// `(symbols − odd-length segments) / 2`.
pub fn three_norm(component: &[Cycle]) -> usize {
    let symbols: usize = component.iter().map(Cycle::len).sum();
    let odd = component.iter().filter(|c| c.is_even()).count();
    (symbols - odd) / 2
}

fn touched_symbols(component: &[Cycle], pi: &Cycle) -> BitVec {
    let mut touched: BitVec = BitVec::repeat(false, pi.max_symbol() + 1);
    for &s in component.iter().flat_map(|c| c.symbols()) {
        if s < touched.len() {
            touched.set(s, true);
        }
    }
    touched
}

fn with_segment(component: &[Cycle], segment: Cycle) -> Vec<Cycle> {
    let mut grown = component.to_vec();
    grown.push(segment);
    grown
}

fn intersecting(component: &[Cycle], host: &Host<'_>) -> Vec<Vec<Cycle>> {
    let touched = touched_symbols(component, host.pi);
    let gates = open_gate_symbols(&MulticyclePermutation::from_trusted(component.to_vec()), host.pi);
    let mut found = Vec::new();
    for a in gates {
        let Some(owner) = component.iter().find(|c| c.contains(a)) else {
            continue;
        };
        let Some((from, to, inner)) = host.between(a, owner.image(a)) else {
            continue;
        };
        for x in inner {
            if let Some(segment) = host.crossing_segment(from, to, x, &touched) {
                found.push(with_segment(component, segment));
            }
        }
    }
    found
}

fn interleaving(component: &[Cycle], host: &Host<'_>) -> Vec<Vec<Cycle>> {
    let component_spi = MulticyclePermutation::from_trusted(component.to_vec());
    if !open_gate_symbols(&component_spi, host.pi).is_empty() {
        return Vec::new();
    }
    let touched = touched_symbols(component, host.pi);
    let mut found = Vec::new();
    for owner in component {
        for &a in owner.symbols() {
            let Some((from, to, inner)) = host.between(a, owner.image(a)) else {
                continue;
            };
            for x in inner {
                if let Some(segment) = host.crossing_segment(from, to, x, &touched) {
                    found.push(with_segment(component, segment));
                }
            }
        }
    }
    found
}

fn lengthened(component: &[Cycle], host: &Host<'_>) -> Vec<Vec<Cycle>> {
    let mut found = Vec::new();
    for (i, part) in component.iter().enumerate() {
        let Some(cycle) = host.cycle_of(part.get(0)) else {
            continue;
        };
        if cycle.len() <= part.len() {
            continue;
        }
        let Some(&start) = part
            .symbols()
            .iter()
            .find(|&&s| !part.contains(cycle.pre_image(s)))
        else {
            continue;
        };
        let len = (part.len() + 2).min(cycle.len());
        let longer = Cycle::from_trusted((0..len).map(|k| cycle.pow(start, k as isize)).collect());

        let mut grown = component.to_vec();
        grown[i] = longer;
        let gates = open_gate_symbols(&MulticyclePermutation::from_trusted(grown.clone()), host.pi);
        if gates.len() <= MAX_OPEN_GATES {
            found.push(grown);
        }
    }
    found
}

/// Every way `component` grows inside `(spi, pi)` by one of `kinds`, in the
/// order of `kinds`.
pub fn candidates(
    component: &[Cycle],
    spi: &MulticyclePermutation,
    pi: &Cycle,
    kinds: &[Extension],
) -> Vec<Candidate> {
    let host = Host::new(spi, pi);
    let mut all: Vec<Candidate> = Vec::new();
    for &kind in kinds {
        for grown in candidates_of(kind, component, &host) {
            if !all.iter().any(|c| c.component == grown) {
                all.push(Candidate { kind, component: grown });
            }
        }
    }
    all
}

fn candidates_of(kind: Extension, component: &[Cycle], host: &Host<'_>) -> Vec<Vec<Cycle>> {
    match kind {
        Extension::Intersecting => intersecting(component, host),
        Extension::Interleaving => interleaving(component, host),
        Extension::Segment => lengthened(component, host),
    }
}

/// The first growth of `component` by one of `kinds`, tried in order.
pub fn extend(
    component: &[Cycle],
    spi: &MulticyclePermutation,
    pi: &Cycle,
    kinds: &[Extension],
) -> Option<Candidate> {
    let host = Host::new(spi, pi);
    kinds.iter().find_map(|&kind| {
        candidates_of(kind, component, &host)
            .into_iter()
            .next()
            .map(|component| Candidate { kind, component })
    })
}
