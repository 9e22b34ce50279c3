//! # sbtkit
//!
//! sbtkit is a Rust library for sorting permutations by transpositions.
//! It provides the cycle algebra of `σ·π⁻¹`, canonical forms of
//! configurations, a branch-and-bound search for sequences meeting a target
//! approximation ratio, a library of precomputed cases, and two drivers
//! after the 11/8 algorithms of Elias and Hartman and of Silva et al. Every
//! sorting a driver returns is checked to be within
//! [`GUARANTEED_RATIO`](algorithm::GUARANTEED_RATIO) of the lower bound.
//!
//! ```
//! use std::sync::Arc;
//!
//! use sbtkit::{
//!     algorithm::{Silva, SortingAlgorithm},
//!     cases::CaseLibrary,
//! };
//!
//! let driver = Silva::new(Arc::new(CaseLibrary::new()));
//! let outcome = driver.sort(&"0 3 2 1".parse().unwrap()).unwrap();
//! assert_eq!(outcome.moves.len(), 2);
//! ```

pub mod algorithm;
pub mod cases;
pub mod classifier;
pub mod configuration;
pub mod permutation;
pub mod search;
pub mod simplification;
pub mod union_find;
