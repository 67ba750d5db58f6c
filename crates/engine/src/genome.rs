//! Genomes: fixed-schema gene vectors plus the scalar loci every strategy carries
//!
//! A family names its tunable fields with an enum implementing [`GeneField`];
//! the enum indexes a [`Genes`] vector. Scalars (candle, exits) are addressed
//! through [`Locus`] so evolution can treat every numeric field uniformly.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::random::RandomNumberProvider;
use crate::types::{HistoryMode, OriginTag, StrategyType};

// ============================================================================
// Fields and loci
// ============================================================================

/// Enumerated identifier of one tunable field in a family's gene vector
pub trait GeneField: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// All fields in schema order
    const ALL: &'static [Self];

    /// Position of this field in the gene vector
    fn index(self) -> usize;

    fn name(self) -> &'static str;
}

/// Any numeric position in a genome that evolution may draw, inherit or mutate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locus<F> {
    Gene(F),
    Candle,
    StopLoss,
    TakeProfit,
    TrailingStopLoss,
}

impl<F: GeneField> Locus<F> {
    /// Every locus: gene fields in schema order, then candle, sl, tp, tsl
    pub fn all() -> Vec<Locus<F>> {
        F::ALL
            .iter()
            .map(|&f| Locus::Gene(f))
            .chain([
                Locus::Candle,
                Locus::StopLoss,
                Locus::TakeProfit,
                Locus::TrailingStopLoss,
            ])
            .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            Locus::Gene(f) => f.name(),
            Locus::Candle => "candle",
            Locus::StopLoss => "sl",
            Locus::TakeProfit => "tp",
            Locus::TrailingStopLoss => "tsl",
        }
    }
}

// ============================================================================
// Gene vector
// ============================================================================

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Genes<F> {
    values: Vec<f64>,
    #[serde(skip)]
    field: PhantomData<F>,
}

impl<F: GeneField> Genes<F> {
    /// All fields zeroed
    pub fn zeroed() -> Self {
        Self {
            values: vec![0.0; F::ALL.len()],
            field: PhantomData,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (F, f64)> + '_ {
        F::ALL.iter().map(move |&f| (f, self.values[f.index()]))
    }
}

impl<F: GeneField> Default for Genes<F> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<F: GeneField> Index<F> for Genes<F> {
    type Output = f64;

    fn index(&self, field: F) -> &f64 {
        &self.values[field.index()]
    }
}

impl<F: GeneField> IndexMut<F> for Genes<F> {
    fn index_mut(&mut self, field: F) -> &mut f64 {
        &mut self.values[field.index()]
    }
}

impl<F: GeneField> fmt::Debug for Genes<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(field, v)| (field.name(), v)))
            .finish()
    }
}

// ============================================================================
// Genome
// ============================================================================

/// One candidate parameter set for a strategy family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Genome<F: GeneField> {
    pub id: String,
    pub origin: OriginTag,
    pub strategy_type: StrategyType,
    pub history: HistoryMode,
    /// Candle interval in seconds
    pub candle: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub trailing_stop_loss: f64,
    pub genes: Genes<F>,
}

impl<F: GeneField> Genome<F> {
    /// Zeroed genome of the given type, without an id
    pub fn blank(strategy_type: StrategyType, history: HistoryMode, origin: OriginTag) -> Self {
        Self {
            id: String::new(),
            origin,
            strategy_type,
            history,
            candle: 0.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            trailing_stop_loss: 0.0,
            genes: Genes::zeroed(),
        }
    }

    pub fn get(&self, locus: Locus<F>) -> f64 {
        match locus {
            Locus::Gene(f) => self.genes[f],
            Locus::Candle => self.candle,
            Locus::StopLoss => self.stop_loss,
            Locus::TakeProfit => self.take_profit,
            Locus::TrailingStopLoss => self.trailing_stop_loss,
        }
    }

    pub fn set(&mut self, locus: Locus<F>, value: f64) {
        match locus {
            Locus::Gene(f) => self.genes[f] = value,
            Locus::Candle => self.candle = value,
            Locus::StopLoss => self.stop_loss = value,
            Locus::TakeProfit => self.take_profit = value,
            Locus::TrailingStopLoss => self.trailing_stop_loss = value,
        }
    }

    /// Pipe-delimited identity: genes in schema order, candle, type, history, sl, tp, tsl.
    /// The origin tag is not part of the identity. Collisions are not resolved.
    pub fn fingerprint(&self) -> String {
        let mut parts: Vec<String> = self.genes.iter().map(|(_, v)| v.to_string()).collect();
        parts.push(self.candle.to_string());
        parts.push(self.strategy_type.tag().to_string());
        parts.push(self.history.tag().to_string());
        parts.push(self.stop_loss.to_string());
        parts.push(self.take_profit.to_string());
        parts.push(self.trailing_stop_loss.to_string());
        parts.join("|")
    }

    /// Recompute `id` from the current field values
    pub fn seal(mut self) -> Self {
        self.id = self.fingerprint();
        self
    }
}

// ============================================================================
// Elite gene pools
// ============================================================================

/// Outcome of drawing one locus from an elite pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Inheritance {
    Inherit(f64),
    /// No inheritance; the locus takes the documented default of zero
    Skip,
}

impl Inheritance {
    pub fn value(self) -> f64 {
        match self {
            Inheritance::Inherit(v) => v,
            Inheritance::Skip => 0.0,
        }
    }
}

/// Observed values per locus, collected from the elites of a generation
#[derive(Debug, Clone)]
pub struct GenePools<F> {
    pools: Vec<(Locus<F>, Vec<f64>)>,
}

impl<F: GeneField> GenePools<F> {
    /// Project elites onto one ordered value sequence per locus
    pub fn from_elites(elites: &[Genome<F>]) -> Self {
        let pools = Locus::all()
            .into_iter()
            .map(|locus| (locus, elites.iter().map(|g| g.get(locus)).collect()))
            .collect();
        Self { pools }
    }

    pub fn pool(&self, locus: Locus<F>) -> &[f64] {
        self.pools
            .iter()
            .find(|(l, _)| *l == locus)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// `Skip` with probability `1/(len+1)`, otherwise a uniform pick from the pool
    pub fn draw<R>(&self, locus: Locus<F>, rng: &mut R) -> Inheritance
    where
        R: RandomNumberProvider + ?Sized,
    {
        let pool = self.pool(locus);
        let slot = rng.pick(pool.len() + 1);
        match pool.get(slot) {
            Some(&v) => Inheritance::Inherit(v),
            None => Inheritance::Skip,
        }
    }
}
