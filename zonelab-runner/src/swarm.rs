//! Particle swarm optimizer: minimizes a fitness function over a box.
//!
//! Each generation runs in three phases:
//! 1. Velocity and position updates for every particle, drawn sequentially
//!    from one seeded `StdRng`
//! 2. Fitness evaluation of every particle (on the rayon pool when
//!    `parallel` is set)
//! 3. A reduction in particle order that updates personal and global bests
//!
//! Because random draws never depend on evaluation order and the reduction
//! runs in index order, sequential and parallel runs give identical results.
//! The lowest particle index wins ties.
//!
//! Candidates whose evaluation fails or returns a non-finite value are scored
//! [`SENTINEL_FITNESS`] and the run carries on.

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Score given to candidates that could not be evaluated.
pub const SENTINEL_FITNESS: f64 = f64::MAX;

// ─── Objective ───────────────────────────────────────────────────────

/// Objective to minimize. Evaluations may run concurrently.
pub trait FitnessFunction: Sync {
    type Error: fmt::Display;

    fn evaluate(&self, position: &[f64]) -> Result<f64, Self::Error>;
}

impl<F> FitnessFunction for F
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    type Error = Infallible;

    fn evaluate(&self, position: &[f64]) -> Result<f64, Infallible> {
        Ok(self(position))
    }
}

// ─── Config types ────────────────────────────────────────────────────

/// How the inertia weight changes over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InertiaSchedule {
    /// `w_g = inertia * (G - g) / G`, reaching zero on the last generation.
    #[default]
    LinearDecay,
    Constant,
}

impl InertiaSchedule {
    /// Inertia weight for generation `g` of `total` (1-based).
    pub fn weight(&self, inertia: f64, g: usize, total: usize) -> f64 {
        match self {
            Self::LinearDecay if total > 0 => {
                inertia * total.saturating_sub(g) as f64 / total as f64
            }
            Self::LinearDecay => 0.0,
            Self::Constant => inertia,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub swarm_size: usize,
    pub generations: usize,
    /// ω
    pub inertia: f64,
    /// c1, pull towards the particle's own best
    pub cognitive: f64,
    /// c2, pull towards the swarm's best
    pub social: f64,
    pub inertia_schedule: InertiaSchedule,
    pub seed: u64,
    pub parallel: bool,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            swarm_size: 30,
            generations: 100,
            inertia: 0.999,
            cognitive: 2.0,
            social: 2.0,
            inertia_schedule: InertiaSchedule::LinearDecay,
            seed: 42,
            parallel: true,
        }
    }
}

impl SwarmConfig {
    pub fn validate(&self) -> Result<(), SwarmError> {
        if self.swarm_size == 0 {
            return Err(SwarmError::EmptySwarm);
        }
        for (name, value) in [
            ("inertia", self.inertia),
            ("cognitive", self.cognitive),
            ("social", self.social),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SwarmError::InvalidCoefficient { name, value });
            }
        }
        Ok(())
    }
}

/// Malformed bounds or swarm configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SwarmError {
    #[error("search space has no dimensions")]
    EmptyBounds,

    #[error("bounds length mismatch: {mins} minimums, {maxs} maximums")]
    LengthMismatch { mins: usize, maxs: usize },

    #[error("invalid bounds on dimension {dimension}: [{min}, {max}]")]
    InvalidBound { dimension: usize, min: f64, max: f64 },

    #[error("swarm size must be at least 1")]
    EmptySwarm,

    #[error("{name} must be a finite non-negative coefficient, got {value}")]
    InvalidCoefficient { name: &'static str, value: f64 },
}

// ─── Outcome ─────────────────────────────────────────────────────────

/// Result of a (possibly cancelled) optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmOutcome {
    pub best_position: Vec<f64>,
    pub best_fitness: f64,
    pub generations_run: usize,
    pub evaluations: usize,
    pub failed_evaluations: usize,
    /// Global-best fitness after initialization, then after each generation.
    pub history: Vec<f64>,
}

// ─── Optimizer ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    best_position: Vec<f64>,
    best_fitness: f64,
}

struct Score {
    value: f64,
    failed: bool,
}

pub struct ParticleSwarmOptimizer<F> {
    fitness: F,
    mins: Vec<f64>,
    maxs: Vec<f64>,
    config: SwarmConfig,
    rng: StdRng,
    particles: Vec<Particle>,
    global_best: Vec<f64>,
    global_best_fitness: f64,
    evaluations: usize,
    failed_evaluations: usize,
    history: Vec<f64>,
}

impl<F: FitnessFunction> ParticleSwarmOptimizer<F> {
    /// Validate the search box and seed the swarm.
    ///
    /// Positions are drawn uniformly inside `[mins, maxs]`, velocities start
    /// at zero and every particle is evaluated once.
    pub fn new(
        fitness: F,
        mins: Vec<f64>,
        maxs: Vec<f64>,
        config: SwarmConfig,
    ) -> Result<Self, SwarmError> {
        validate_bounds(&mins, &maxs)?;
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let dims = mins.len();
        let positions: Vec<Vec<f64>> = (0..config.swarm_size)
            .map(|_| {
                (0..dims)
                    .map(|d| mins[d] + (maxs[d] - mins[d]) * rng.gen::<f64>())
                    .collect()
            })
            .collect();

        let mut optimizer = Self {
            fitness,
            mins,
            maxs,
            config,
            rng,
            particles: Vec::new(),
            global_best: Vec::new(),
            global_best_fitness: SENTINEL_FITNESS,
            evaluations: 0,
            failed_evaluations: 0,
            history: Vec::new(),
        };

        let scores = optimizer.evaluate_all(&positions);
        let mut particles = Vec::with_capacity(positions.len());
        for (i, (position, value)) in positions.into_iter().zip(scores).enumerate() {
            if i == 0 || value < optimizer.global_best_fitness {
                optimizer.global_best = position.clone();
                optimizer.global_best_fitness = value;
            }
            particles.push(Particle {
                velocity: vec![0.0; dims],
                best_position: position.clone(),
                best_fitness: value,
                position,
            });
        }
        optimizer.particles = particles;
        optimizer.history.push(optimizer.global_best_fitness);

        debug!(
            swarm_size = optimizer.config.swarm_size,
            dimensions = dims,
            best = optimizer.global_best_fitness,
            "swarm initialized"
        );
        Ok(optimizer)
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn best_position(&self) -> &[f64] {
        &self.global_best
    }

    pub fn best_fitness(&self) -> f64 {
        self.global_best_fitness
    }

    /// Run every configured generation and return the best position found.
    pub fn learn(self) -> Vec<f64> {
        self.run(None).best_position
    }

    /// Run up to `generations` generations. The cancel flag is checked only
    /// between generations.
    pub fn run(mut self, cancel: Option<&AtomicBool>) -> SwarmOutcome {
        let total = self.config.generations;
        let mut generations_run = 0;

        for g in 1..=total {
            if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                info!(generation = g, "swarm cancelled");
                break;
            }
            self.step(g, total);
            generations_run = g;
        }

        info!(
            generations = generations_run,
            evaluations = self.evaluations,
            failed = self.failed_evaluations,
            best = self.global_best_fitness,
            "swarm finished"
        );

        SwarmOutcome {
            best_position: self.global_best,
            best_fitness: self.global_best_fitness,
            generations_run,
            evaluations: self.evaluations,
            failed_evaluations: self.failed_evaluations,
            history: self.history,
        }
    }

    fn step(&mut self, g: usize, total: usize) {
        let w = self
            .config
            .inertia_schedule
            .weight(self.config.inertia, g, total);
        let (c1, c2) = (self.config.cognitive, self.config.social);

        for particle in &mut self.particles {
            for d in 0..particle.position.len() {
                let r1: f64 = self.rng.gen();
                let r2: f64 = self.rng.gen();
                let x = particle.position[d];
                let v = w * particle.velocity[d]
                    + c1 * r1 * (particle.best_position[d] - x)
                    + c2 * r2 * (self.global_best[d] - x);
                particle.velocity[d] = v;
                particle.position[d] = (x + v).clamp(self.mins[d], self.maxs[d]);
            }
        }

        let positions: Vec<Vec<f64>> = self.particles.iter().map(|p| p.position.clone()).collect();
        let scores = self.evaluate_all(&positions);

        for (particle, value) in self.particles.iter_mut().zip(scores) {
            if value < particle.best_fitness {
                particle.best_fitness = value;
                particle.best_position = particle.position.clone();
            }
            if value < self.global_best_fitness {
                self.global_best_fitness = value;
                self.global_best = particle.position.clone();
            }
        }
        self.history.push(self.global_best_fitness);

        debug!(generation = g, inertia = w, best = self.global_best_fitness, "generation done");
    }

    fn evaluate_all(&mut self, positions: &[Vec<f64>]) -> Vec<f64> {
        let fitness = &self.fitness;
        let scores: Vec<Score> = if self.config.parallel {
            positions.par_iter().map(|p| score(fitness, p)).collect()
        } else {
            positions.iter().map(|p| score(fitness, p)).collect()
        };
        self.evaluations += scores.len();
        self.failed_evaluations += scores.iter().filter(|s| s.failed).count();
        scores.into_iter().map(|s| s.value).collect()
    }
}

/// Evaluate one candidate, mapping failures and non-finite values to the
/// sentinel.
fn score<F: FitnessFunction + ?Sized>(fitness: &F, position: &[f64]) -> Score {
    match fitness.evaluate(position) {
        Ok(value) if value.is_finite() => Score {
            value,
            failed: false,
        },
        Ok(value) => {
            warn!(?position, value, "non-finite fitness, scoring as sentinel");
            Score {
                value: SENTINEL_FITNESS,
                failed: true,
            }
        }
        Err(e) => {
            warn!(?position, error = %e, "fitness evaluation failed, scoring as sentinel");
            Score {
                value: SENTINEL_FITNESS,
                failed: true,
            }
        }
    }
}

fn validate_bounds(mins: &[f64], maxs: &[f64]) -> Result<(), SwarmError> {
    if mins.len() != maxs.len() {
        return Err(SwarmError::LengthMismatch {
            mins: mins.len(),
            maxs: maxs.len(),
        });
    }
    if mins.is_empty() {
        return Err(SwarmError::EmptyBounds);
    }
    for (dimension, (&min, &max)) in mins.iter().zip(maxs).enumerate() {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(SwarmError::InvalidBound {
                dimension,
                min,
                max,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(x: &[f64]) -> f64 {
        x.iter().map(|v| v * v).sum()
    }

    fn small(generations: usize) -> SwarmConfig {
        SwarmConfig {
            swarm_size: 10,
            generations,
            parallel: false,
            ..SwarmConfig::default()
        }
    }

    #[test]
    fn linear_decay_reaches_zero_on_last_generation() {
        let s = InertiaSchedule::LinearDecay;
        assert!((s.weight(0.999, 1, 10) - 0.999 * 0.9).abs() < 1e-12);
        assert_eq!(s.weight(0.999, 10, 10), 0.0);
    }

    #[test]
    fn constant_schedule_ignores_generation() {
        assert_eq!(InertiaSchedule::Constant.weight(0.7, 3, 10), 0.7);
    }

    #[test]
    fn zero_generations_returns_initial_best() {
        let pso = ParticleSwarmOptimizer::new(sphere, vec![-1.0], vec![1.0], small(0)).unwrap();
        let initial = pso.best_fitness();
        let outcome = pso.run(None);
        assert_eq!(outcome.generations_run, 0);
        assert_eq!(outcome.history, vec![initial]);
        assert_eq!(outcome.evaluations, 10);
    }

    #[test]
    fn positions_stay_inside_bounds() {
        let pso = ParticleSwarmOptimizer::new(sphere, vec![2.0, -3.0], vec![4.0, -1.0], small(20))
            .unwrap();
        let best = pso.learn();
        assert!((2.0..=4.0).contains(&best[0]));
        assert!((-3.0..=-1.0).contains(&best[1]));
    }

    #[test]
    fn degenerate_dimension_is_allowed() {
        let pso = ParticleSwarmOptimizer::new(sphere, vec![1.5], vec![1.5], small(5)).unwrap();
        assert_eq!(pso.learn(), vec![1.5]);
    }

    #[test]
    fn zero_swarm_rejected() {
        let cfg = SwarmConfig {
            swarm_size: 0,
            ..SwarmConfig::default()
        };
        let err = ParticleSwarmOptimizer::new(sphere, vec![0.0], vec![1.0], cfg)
            .err()
            .unwrap();
        assert_eq!(err, SwarmError::EmptySwarm);
    }

    #[test]
    fn negative_coefficient_rejected() {
        let cfg = SwarmConfig {
            social: -1.0,
            ..SwarmConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SwarmError::InvalidCoefficient { name: "social", .. })
        ));
    }
}
