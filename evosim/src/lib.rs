//! Generational evolution of bodies whose fitness comes
//! from a physics simulation.
//!
//! Each generation, a [`GenePool`] is simulated in parallel:
//! [`simulate_pop`] hands individuals to a fixed pool of workers,
//! each owning its own [`PhysicsEngine`], and merges their
//! trajectories back by id. The evaluated pool then goes through
//! [`selection`] and [`crossing`] to produce the next generation.
//! [`Evolution`] repeats this for a configured number of
//! generations, recording statistics, optionally tracking chosen
//! lineages, and checkpointing through a [`Persistence`]
//! implementation so interrupted runs can be resumed.
//!
//! All randomness derives from a single seed, so identical
//! configurations produce identical runs.
//!
//! A rigid-body walking creature engine is supplied by the
//! `evosim-body` crate.
//!
//! # Example usage: evolving points towards a target
//! ```
//! use evosim::{
//!     EvolutionConfig, Evolution, GeneBounds, GeneSpace, Genome, PhysicsEngine, Position,
//!     PopulationConfig, SimulationConfig, SimulationFailure, SimulationId, StopSignal,
//! };
//! use std::num::NonZeroUsize;
//!
//! /// A point gliding along the direction spelled by its genes.
//! struct Glide {
//!     velocity: (f32, f32),
//!     position: Option<Position>,
//! }
//!
//! impl PhysicsEngine for Glide {
//!     fn spawn(&mut self, genome: &Genome) -> Result<Position, SimulationFailure> {
//!         self.velocity = (genome.genes()[0], genome.genes()[1]);
//!         self.position = Some(Position::ORIGIN);
//!         Ok(Position::ORIGIN)
//!     }
//!
//!     fn step(&mut self, _step: usize) -> Result<(), SimulationFailure> {
//!         let p = self.position.as_mut().ok_or(SimulationFailure::Interrupted)?;
//!         p.x += self.velocity.0 * 0.1;
//!         p.y += self.velocity.1 * 0.1;
//!         Ok(())
//!     }
//!
//!     fn position(&self) -> Option<Position> {
//!         self.position
//!     }
//!
//!     fn remove_simulation(&mut self) {
//!         self.position = None;
//!     }
//! }
//!
//! fn main() {
//!     let config = EvolutionConfig {
//!         population: PopulationConfig {
//!             size: NonZeroUsize::new(30).unwrap(),
//!             survival_fraction: 0.2,
//!             elitism: 1,
//!             child_mutation_chance: 0.5,
//!             mutation_rate: 0.5,
//!             ..PopulationConfig::zero()
//!         },
//!         simulation: SimulationConfig {
//!             fps: NonZeroUsize::new(10).unwrap(),
//!             duration_secs: 1.0,
//!             target: Position::new(0.5, -0.5, 0.0),
//!             ..SimulationConfig::zero()
//!         },
//!         generations: 10,
//!         num_cores: NonZeroUsize::new(2),
//!         ..EvolutionConfig::default()
//!     };
//!     let space = GeneSpace::uniform(2, GeneBounds::new(-1.0, 1.0).unwrap());
//!     let build_engine = |_: SimulationId| Glide {
//!         velocity: (0.0, 0.0),
//!         position: None,
//!     };
//!
//!     let mut evolution = Evolution::new(config, space, build_engine).unwrap();
//!     let summary = evolution.run(&StopSignal::new(), None).unwrap();
//!     let champion = summary.champion.unwrap();
//!     println!("Best individual: {}", champion);
//!     assert!(champion.distance().unwrap() < 0.5);
//! }
//! ```

mod evolution;
mod genome;
mod individuals;
mod persistence;
mod populations;
mod rng;
mod simulation;
mod tracking;

#[cfg(test)]
mod testing;

pub use evolution::*;
pub use genome::*;
pub use individuals::*;
pub use persistence::*;
pub use populations::*;
pub use rng::*;
pub use simulation::*;
pub use tracking::*;
