//! Generic evolutionary search over a family's gene schema
//!
//! Exposes the generation primitives only: random/recombined fill, elite
//! selection, crossover and mutation. The caller owns the generation loop.

use tracing::{debug, info, warn};

use crate::config::GeneticConfig;
use crate::error::{EngineError, EngineResult};
use crate::genome::{GenePools, Genome, Locus};
use crate::random::RandomNumberProvider;
use crate::schema::GeneSchema;
use crate::types::{BacktestResult, HistoryMode, OriginTag};

/// Fewer elites than this and crossover yields nothing
pub const MIN_ELITES: usize = 3;

pub struct EvolutionEngine<S: GeneSchema> {
    schema: S,
    config: GeneticConfig,
    loci: Vec<Locus<S::Field>>,
}

impl<S: GeneSchema> EvolutionEngine<S> {
    pub fn new(schema: S, config: GeneticConfig) -> EngineResult<Self> {
        schema.validate()?;
        config.validate()?;
        Ok(Self {
            schema,
            config,
            loci: Locus::all(),
        })
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    // ========================================================================
    // Fill
    // ========================================================================

    /// Generate exactly `count` valid genomes.
    ///
    /// Without pools every locus is drawn from its range (origin `rand`); with
    /// pools every locus is inherited from the elites or skipped (origin
    /// `crossover`). Each slot is retried up to `max_attempts` times.
    pub fn fill<R>(
        &self,
        count: usize,
        pools: Option<&GenePools<S::Field>>,
        rng: &mut R,
    ) -> EngineResult<Vec<Genome<S::Field>>>
    where
        R: RandomNumberProvider + ?Sized,
    {
        let mut genomes = Vec::with_capacity(count);
        for _ in 0..count {
            genomes.push(self.generate(pools, rng)?);
        }
        debug!(
            count,
            recombined = pools.is_some(),
            "Filled generation slots"
        );
        Ok(genomes)
    }

    fn generate<R>(
        &self,
        pools: Option<&GenePools<S::Field>>,
        rng: &mut R,
    ) -> EngineResult<Genome<S::Field>>
    where
        R: RandomNumberProvider + ?Sized,
    {
        let attempts = self.config.max_attempts;
        for _ in 0..attempts {
            let candidate = match pools {
                Some(pools) => self.recombine(pools, rng),
                None => self.randomize(rng),
            };
            if self.schema.is_valid(&candidate) {
                return Ok(candidate.seal());
            }
        }
        warn!(attempts, recombined = pools.is_some(), "No valid genome within retry cap");
        Err(EngineError::ExhaustedSearchSpace {
            attempts,
            context: "no candidate satisfied the validity rules".to_string(),
        })
    }

    fn randomize<R>(&self, rng: &mut R) -> Genome<S::Field>
    where
        R: RandomNumberProvider + ?Sized,
    {
        let strategy_type = self.schema.draw_strategy_type(rng);
        let history = draw_history(rng);
        let mut genome = Genome::blank(strategy_type, history, OriginTag::Rand);
        for &locus in &self.loci {
            genome.set(locus, rng.draw(self.schema.range(locus)));
        }
        self.schema.apply_gate_defaults(&mut genome);
        genome
    }

    /// Independent assortment: every locus draws from its own elite pool
    fn recombine<R>(&self, pools: &GenePools<S::Field>, rng: &mut R) -> Genome<S::Field>
    where
        R: RandomNumberProvider + ?Sized,
    {
        let mut genome = Genome::blank(
            self.schema.draw_strategy_type(rng),
            HistoryMode::TwoCandle,
            OriginTag::Crossover,
        );
        for &locus in &self.loci {
            genome.set(locus, pools.draw(locus, rng).value());
        }
        genome.history = draw_history(rng);
        self.schema.apply_gate_defaults(&mut genome);
        genome
    }

    // ========================================================================
    // Selection and crossover
    // ========================================================================

    /// Top `population_size * best_percent / 100` results with at least one
    /// position, ranked by net profit (stable on ties).
    pub fn select_elite(
        &self,
        results: &[BacktestResult<S::Field>],
        best_percent: u32,
    ) -> Vec<Genome<S::Field>> {
        let mut ranked: Vec<&BacktestResult<S::Field>> =
            results.iter().filter(|r| r.position_count > 0).collect();
        ranked.sort_by(|a, b| b.net_profit.cmp(&a.net_profit));
        ranked
            .into_iter()
            .take(self.config.share(best_percent))
            .map(|r| r.genome.clone())
            .collect()
    }

    /// Recombine the elites of a generation. Empty when fewer than
    /// [`MIN_ELITES`] results qualify.
    pub fn crossover<R>(
        &self,
        results: &[BacktestResult<S::Field>],
        rng: &mut R,
    ) -> EngineResult<Vec<Genome<S::Field>>>
    where
        R: RandomNumberProvider + ?Sized,
    {
        let elites = self.select_elite(results, self.config.best_percent);
        if elites.len() < MIN_ELITES {
            debug!(elites = elites.len(), "Too few elites for crossover");
            return Ok(Vec::new());
        }

        let pools = GenePools::from_elites(&elites);
        let children = self.fill(
            self.config.share(self.config.crossover_percent),
            Some(&pools),
            rng,
        )?;

        info!(
            elites = elites.len(),
            children = children.len(),
            "Crossover complete"
        );
        Ok(children)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Mutate the first `population_size * mutation_percent / 100` results in
    /// input order. Strategy type and history mode are inherited unchanged.
    pub fn mutation<R>(
        &self,
        results: &[BacktestResult<S::Field>],
        rng: &mut R,
    ) -> EngineResult<Vec<Genome<S::Field>>>
    where
        R: RandomNumberProvider + ?Sized,
    {
        let take = self.config.share(self.config.mutation_percent);
        let mutants = results
            .iter()
            .take(take)
            .map(|r| self.mutate(&r.genome, rng))
            .collect::<EngineResult<Vec<_>>>()?;

        info!(
            mutants = mutants.len(),
            steps = self.config.mutation_count,
            "Mutation complete"
        );
        Ok(mutants)
    }

    fn mutate<R>(&self, parent: &Genome<S::Field>, rng: &mut R) -> EngineResult<Genome<S::Field>>
    where
        R: RandomNumberProvider + ?Sized,
    {
        let mut child = parent.clone();
        for _ in 0..self.config.mutation_count {
            self.mutate_locus(&mut child, rng)?;
        }
        self.schema.repair(&mut child);
        child.origin = OriginTag::Mutation;
        Ok(child.seal())
    }

    /// Overwrite one random locus with a fresh non-zero draw
    fn mutate_locus<R>(&self, genome: &mut Genome<S::Field>, rng: &mut R) -> EngineResult<()>
    where
        R: RandomNumberProvider + ?Sized,
    {
        let attempts = self.config.max_attempts;
        for _ in 0..attempts {
            let locus = self.loci[rng.pick(self.loci.len())];
            let donor = self.generate(None, rng)?;
            let value = donor.get(locus);
            if value != 0.0 {
                genome.set(locus, value);
                return Ok(());
            }
            debug!(locus = locus.name(), "Donor value is zero, retrying mutation step");
        }
        warn!(attempts, "Mutation step found no non-zero donor value");
        Err(EngineError::ExhaustedSearchSpace {
            attempts,
            context: "mutation step found no non-zero value".to_string(),
        })
    }
}

fn draw_history<R>(rng: &mut R) -> HistoryMode
where
    R: RandomNumberProvider + ?Sized,
{
    if rng.coin() {
        HistoryMode::TwoCandle
    } else {
        HistoryMode::ThreeCandle
    }
}
