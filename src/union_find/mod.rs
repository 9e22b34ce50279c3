//! Union–find over `spi` cycles, used to split a configuration into
//! components of mutually intersecting cycles.

use std::{
    cell::Cell,
    ops::{Index, IndexMut},
};

use derive_more::{From, Into};
use itertools::Itertools;

use crate::{
    configuration::signature::intersects,
    permutation::{Cycle, MulticyclePermutation},
};

/// Position of an element in [`UnionFind::elements`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From, Into)]
pub struct ElementIndex(pub usize);

/// Slot of a live set's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From, Into)]
pub struct SetIndex(pub usize);

/// A node of the parent-pointer forest.
///
/// - `Root { set, rank }`: a representative, holding its union-by-rank value
///   and the slot of its set data.
/// - `Child(parent)`: not a representative.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UFNode {
    Root { set: SetIndex, rank: usize },
    Child(ElementIndex),
}

/// Partitions `elements` and keeps one `U` per live set, compactly.
///
/// Parent pointers sit in `Cell`s so that [`find`](Self::find) compresses
/// paths through a shared reference. Merged-away sets free their data slot by
/// swap removal; `owners` maps each slot back to its root.
pub struct UnionFind<T, U> {
    pub elements: Vec<T>,
    nodes: Vec<Cell<UFNode>>,
    set_data: Vec<U>,
    owners: Vec<ElementIndex>,
}

impl<T, U> UnionFind<T, U> {
    /// Every element in its own set, with `associated[i]` as the data of element `i`.
    ///
    /// Extra entries of the longer vector are dropped.
    pub fn new(elements: Vec<T>, associated: Vec<U>) -> Self {
        let n = elements.len().min(associated.len());
        let mut elements = elements;
        let mut set_data = associated;
        elements.truncate(n);
        set_data.truncate(n);
        UnionFind {
            elements,
            nodes: (0..n)
                .map(|i| {
                    Cell::new(UFNode::Root {
                        set: SetIndex(i),
                        rank: 0,
                    })
                })
                .collect(),
            set_data,
            owners: (0..n).map(ElementIndex).collect(),
        }
    }

    pub fn n_sets(&self) -> usize {
        self.set_data.len()
    }

    /// The root of the set containing `x`, compressing the path on the way.
    pub fn find(&self, x: ElementIndex) -> ElementIndex {
        match self.nodes[x.0].get() {
            UFNode::Root { .. } => x,
            UFNode::Child(parent) => {
                let root = self.find(parent);
                self.nodes[x.0].set(UFNode::Child(root));
                root
            }
        }
    }

    fn root_parts(&self, root: ElementIndex) -> (SetIndex, usize) {
        match self.nodes[root.0].get() {
            UFNode::Root { set, rank } => (set, rank),
            UFNode::Child(_) => unreachable!("find always lands on a root"),
        }
    }

    /// The data slot of the set containing `x`.
    pub fn find_set(&self, x: ElementIndex) -> SetIndex {
        self.root_parts(self.find(x)).0
    }

    pub fn find_data(&self, x: ElementIndex) -> &U {
        &self[self.find_set(x)]
    }

    pub fn same_set(&self, x: ElementIndex, y: ElementIndex) -> bool {
        self.find(x) == self.find(y)
    }

    /// Joins the sets of `x` and `y`; the surviving data absorbs the other
    /// through `merge`. Returns the new root.
    pub fn union<F>(&mut self, x: ElementIndex, y: ElementIndex, merge: F) -> ElementIndex
    where
        F: FnOnce(&mut U, U),
    {
        let (root_x, root_y) = (self.find(x), self.find(y));
        if root_x == root_y {
            return root_x;
        }
        let (set_x, rank_x) = self.root_parts(root_x);
        let (set_y, rank_y) = self.root_parts(root_y);

        let (winner, loser, mut winner_set, loser_set) = if rank_x < rank_y {
            (root_y, root_x, set_y, set_x)
        } else {
            (root_x, root_y, set_x, set_y)
        };
        let winner_rank = if rank_x == rank_y { rank_x + 1 } else { rank_x.max(rank_y) };
        self.nodes[loser.0].set(UFNode::Child(winner));

        let last = self.set_data.len() - 1;
        let absorbed = self.set_data.swap_remove(loser_set.0);
        self.owners.swap_remove(loser_set.0);
        if loser_set.0 != last {
            // The former last slot now lives at `loser_set`.
            let moved = self.owners[loser_set.0];
            if moved == winner {
                winner_set = loser_set;
            } else if let UFNode::Root { rank, .. } = self.nodes[moved.0].get() {
                self.nodes[moved.0].set(UFNode::Root { set: loser_set, rank });
            }
        }
        self.nodes[winner.0].set(UFNode::Root {
            set: winner_set,
            rank: winner_rank,
        });
        merge(&mut self.set_data[winner_set.0], absorbed);
        winner
    }

    /// The data of every live set, in slot order.
    pub fn into_set_data(self) -> Vec<U> {
        self.set_data
    }
}

impl<T, U> Index<SetIndex> for UnionFind<T, U> {
    type Output = U;
    fn index(&self, index: SetIndex) -> &Self::Output {
        &self.set_data[index.0]
    }
}

impl<T, U> IndexMut<SetIndex> for UnionFind<T, U> {
    fn index_mut(&mut self, index: SetIndex) -> &mut Self::Output {
        &mut self.set_data[index.0]
    }
}

impl<T, U> Index<ElementIndex> for UnionFind<T, U> {
    type Output = T;
    fn index(&self, index: ElementIndex) -> &Self::Output {
        &self.elements[index.0]
    }
}

/// Groups the non-trivial cycles of `spi` into components: two cycles share
/// a component when a chain of intersecting cycles links them.
///
/// Components are listed by the position in `pi` of their first symbol.
pub fn components(spi: &MulticyclePermutation, pi: &Cycle) -> Vec<MulticyclePermutation> {
    let cycles: Vec<Cycle> = spi.non_trivial_cycles().cloned().collect();
    let indices = (0..cycles.len()).map(|i| vec![i]).collect();
    let mut uf = UnionFind::new(cycles, indices);

    let pi_inverse = pi.inverse();
    for (i, j) in (0..uf.elements.len()).tuple_combinations() {
        if uf.same_set(ElementIndex(i), ElementIndex(j)) {
            continue;
        }
        let (e, f) = (&uf.elements[i], &uf.elements[j]);
        if intersects(pi_inverse, e, f) || intersects(pi_inverse, f, e) {
            uf.union(ElementIndex(i), ElementIndex(j), |a, b| a.extend(b));
        }
    }

    let first_position = |c: &Cycle| c.symbols().iter().filter_map(|&s| pi.index_of(s)).min();
    let cycles = std::mem::take(&mut uf.elements);
    uf.into_set_data()
        .into_iter()
        .map(|members| {
            members
                .into_iter()
                .sorted_by_key(|&i| first_position(&cycles[i]))
                .map(|i| cycles[i].clone())
                .collect::<Vec<_>>()
        })
        .sorted_by_key(|members| members.first().and_then(first_position))
        .map(MulticyclePermutation::from_trusted)
        .collect()
}
