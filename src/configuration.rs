//! Configurations: an arrangement `pi` together with the cycles of `σ·π⁻¹`.
//!
//! A configuration is what the algorithms reason about. Sub-configurations
//! take a few cycles of `spi` and the arrangement restricted to their symbols,
//! which is how components are looked up in the case library. Equality and
//! hashing go through the canonical key, so two configurations compare equal
//! exactly when one is a relabeling, rotation or mirror of the other.

pub mod canonical;
pub(crate) mod dense;
pub mod signature;

use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use bitvec::vec::BitVec;
use thiserror::Error;

use crate::permutation::{compute_product, Cycle, MulticyclePermutation, PermutationError, Symbol};

pub use canonical::{CanonicalKey, Relabeling};
pub use signature::{open_gate_symbols, Signature, SignatureEntry};

use canonical::mirror_sorting;
pub(crate) use dense::DenseConfiguration;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("symbol {symbol} of spi does not occur in pi {pi}")]
    SymbolOutsidePi { symbol: Symbol, pi: String },
    #[error("arrangement {0} is not over 0..n")]
    NotDense(String),
    #[error("configurations {left} and {right} are not equivalent")]
    NotEquivalent { left: String, right: String },
    #[error(transparent)]
    Permutation(#[from] PermutationError),
}

/// The pair `(spi, pi)`.
///
/// # Examples
///
/// ```
/// use sbtkit::configuration::Configuration;
///
/// let a: Configuration = "(0,3)(1,2)".parse().unwrap();
/// let b = Configuration::new("(0,1)(2,3)".parse().unwrap(), "0 3 2 1".parse().unwrap()).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.fingerprint(), b.fingerprint());
/// ```
#[derive(Clone)]
pub struct Configuration {
    spi: MulticyclePermutation,
    pi: Cycle,
    key: CanonicalKey,
    relabeling: Relabeling,
    fingerprint: u64,
}

impl Configuration {
    pub fn new(spi: MulticyclePermutation, pi: Cycle) -> Result<Self, ConfigurationError> {
        if let Some(&symbol) = spi
            .cycles()
            .iter()
            .flat_map(|c| c.symbols())
            .find(|&&s| !pi.contains(s))
        {
            return Err(ConfigurationError::SymbolOutsidePi {
                symbol,
                pi: pi.to_string(),
            });
        }
        Ok(Self::from_trusted(spi, pi))
    }

    /// Skips the check that every symbol of `spi` is in `pi`.
    pub(crate) fn from_trusted(spi: MulticyclePermutation, pi: Cycle) -> Self {
        let (key, relabeling) = DenseConfiguration::new(&spi, &pi).canonicalize();
        let fingerprint = key.fingerprint();
        Configuration {
            spi,
            pi,
            key,
            relabeling,
            fingerprint,
        }
    }

    /// Uses the symbols of `spi` in increasing order as the arrangement.
    pub fn from_spi(spi: MulticyclePermutation) -> Result<Self, ConfigurationError> {
        let pi = Cycle::new(spi.symbols())?;
        Ok(Self::from_trusted(spi, pi))
    }

    /// The configuration of the arrangement `pi` of `0..n`, with `spi = σ·π⁻¹`.
    pub fn of_permutation(pi: &Cycle) -> Result<Self, ConfigurationError> {
        if pi.max_symbol() + 1 != pi.len() {
            return Err(ConfigurationError::NotDense(pi.to_string()));
        }
        let spi = MulticyclePermutation::sigma_pi_inverse(pi)?;
        Ok(Self::from_trusted(spi, pi.clone()))
    }

    /// The configuration made of `cycles`, with `pi` restricted to their symbols.
    pub fn sub_configuration<'a>(
        cycles: impl IntoIterator<Item = &'a Cycle>,
        pi: &Cycle,
    ) -> Result<Self, ConfigurationError> {
        let cycles: Vec<Cycle> = cycles.into_iter().cloned().collect();
        let spi = MulticyclePermutation::new(cycles)?;
        let mut keep: BitVec = BitVec::repeat(false, pi.max_symbol() + 1);
        for &s in spi.cycles().iter().flat_map(|c| c.symbols()) {
            if s >= keep.len() || !pi.contains(s) {
                return Err(ConfigurationError::SymbolOutsidePi {
                    symbol: s,
                    pi: pi.to_string(),
                });
            }
            keep.set(s, true);
        }
        let restricted = pi.restricted_to(&keep)?;
        Ok(Self::from_trusted(spi, restricted))
    }

    pub fn spi(&self) -> &MulticyclePermutation {
        &self.spi
    }

    pub fn pi(&self) -> &Cycle {
        &self.pi
    }

    pub fn key(&self) -> &CanonicalKey {
        &self.key
    }

    pub fn relabeling(&self) -> &Relabeling {
        &self.relabeling
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Number of symbols of the arrangement.
    pub fn size(&self) -> usize {
        self.pi.len()
    }

    /// `(n − even cycles) / 2`, with symbols of `pi` missing from `spi`
    /// counted as fixed points.
    pub fn lower_bound(&self) -> usize {
        self.spi.three_norm()
    }

    pub fn three_norm(&self) -> usize {
        self.spi.three_norm()
    }

    pub fn is_sorted(&self) -> bool {
        self.spi.is_identity()
    }

    pub fn signature(&self) -> Signature {
        Signature::new(&self.spi, &self.pi)
    }

    /// Symbols opening a gate; see [`open_gate_symbols`].
    pub fn open_gates(&self) -> Vec<Symbol> {
        open_gate_symbols(&self.spi, &self.pi)
    }

    /// No open gates: the configuration cannot be extended by intersection.
    pub fn is_full(&self) -> bool {
        self.open_gates().is_empty()
    }

    /// `(spi·ρ⁻¹, ρ·pi)`.
    pub fn apply_transposition(&self, rho: &Cycle) -> Result<Configuration, ConfigurationError> {
        let pi = self.pi.apply_transposition(rho)?;
        let spi = compute_product(false, &[&self.spi, rho.inverse()]);
        Ok(Self::from_trusted(spi, pi))
    }

    pub(crate) fn dense(&self) -> DenseConfiguration {
        DenseConfiguration::new(&self.spi, &self.pi)
    }

    /// The canonical representative, over `0..n` with `pi = (0 1 ... n-1)`,
    /// and the relabeling leading to it.
    pub fn canonical(&self) -> (Configuration, Relabeling) {
        (self.canonical_representative(), self.relabeling.clone())
    }

    fn canonical_representative(&self) -> Configuration {
        let pi = Cycle::from_trusted((0..self.key.len()).collect());
        Configuration {
            spi: self.key.spi(),
            pi,
            key: self.key.clone(),
            relabeling: Relabeling {
                mirrored: false,
                labels: (0..self.key.len()).collect(),
            },
            fingerprint: self.fingerprint,
        }
    }

    /// Every relabeling of this configuration and of its mirror, as
    /// configurations over `0..n`.
    pub fn equivalent_configurations(&self) -> Vec<(Configuration, Relabeling)> {
        let pi = Cycle::from_trusted((0..self.size()).collect());
        self.dense()
            .orbit()
            .map(|(key, relabeling)| (Self::from_trusted(key.spi(), pi.clone()), relabeling))
            .collect()
    }

    /// Rewrites `sorting`, a sorting of the equivalent configuration `matched`
    /// in `matched`'s labels, as a sorting of `self`.
    pub fn translated_sorting(
        &self,
        matched: &Configuration,
        sorting: &[Cycle],
    ) -> Result<Vec<Cycle>, ConfigurationError> {
        if self.key != matched.key {
            return Err(ConfigurationError::NotEquivalent {
                left: self.to_string(),
                right: matched.to_string(),
            });
        }
        let outside = |symbol: Symbol| ConfigurationError::SymbolOutsidePi {
            symbol,
            pi: matched.pi.to_string(),
        };

        let mut moves = Vec::with_capacity(sorting.len());
        for rho in sorting {
            if rho.len() != 3 {
                return Err(PermutationError::NotApplicable {
                    a: rho.get(0),
                    b: rho.get(1),
                    c: rho.get(2),
                    target: matched.pi.to_string(),
                }
                .into());
            }
            let [a, b, c] = [rho.get(0), rho.get(1), rho.get(2)];
            if let Some(&s) = [a, b, c].iter().find(|&&s| !matched.pi.contains(s)) {
                return Err(outside(s));
            }
            moves.push([a, b, c]);
        }

        if matched.relabeling.mirrored {
            moves = mirror_sorting(&matched.dense().images, &moves);
        }

        let to_canonical = matched.relabeling.to_canonical();
        let labels = &self.relabeling.labels;
        for m in moves.iter_mut() {
            for s in m.iter_mut() {
                let i = to_canonical
                    .get(*s)
                    .copied()
                    .flatten()
                    .ok_or_else(|| outside(*s))?;
                *s = labels[i];
            }
        }

        if self.relabeling.mirrored {
            moves = mirror_sorting(&self.dense().inverse_images(), &moves);
        }

        Ok(moves
            .into_iter()
            .map(|m| Cycle::from_trusted(m.to_vec()))
            .collect())
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint && self.key == other.key
    }
}

impl Eq for Configuration {}

impl Hash for Configuration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} over {}", self.spi, self.pi)
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("spi", &self.spi)
            .field("pi", &self.pi)
            .field("key", &format_args!("{}", self.key))
            .finish()
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    /// Parses `spi`; the arrangement is its symbols in increasing order.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_spi(s.parse()?)
    }
}
