//! # evosim-body
//! A walking creature implementation of the [`evosim` crate](../evosim/index.html)'s
//! `PhysicsEngine` trait, simulated with `rapier3d`.
//!
//! Creatures are made of six boxes (chest, hip, two hands and two feet)
//! linked by spheres and ten motorized revolute joints. Their genome
//! holds the size of every box and, for each joint, a cyclic pattern of
//! target angles the joint's motor follows step after step. Heavier
//! parts get stronger motors.
//!
//! [`CreatureFactory`] validates a [`BodyConfig`], supplies the
//! matching gene space, and builds one [`BodySimulator`] per worker.
//!
//! # Example usage: a short evolution of crawling creatures
//! ```
//! use evosim::{
//!     Evolution, EvolutionConfig, Objective, PopulationConfig, SimulationConfig, SimulationId,
//!     StopSignal,
//! };
//! use evosim_body::{BodyConfig, CreatureFactory};
//! use std::num::NonZeroUsize;
//!
//! fn main() {
//!     let simulation = SimulationConfig {
//!         fps: NonZeroUsize::new(60).unwrap(),
//!         duration_secs: 0.5,
//!         objective: Objective::Displacement,
//!         record_every: NonZeroUsize::new(10).unwrap(),
//!         ..SimulationConfig::zero()
//!     };
//!     let factory = CreatureFactory::new(BodyConfig::default(), simulation.timestep()).unwrap();
//!     let config = EvolutionConfig {
//!         population: PopulationConfig {
//!             size: NonZeroUsize::new(6).unwrap(),
//!             ..PopulationConfig::default()
//!         },
//!         simulation,
//!         generations: 2,
//!         num_cores: NonZeroUsize::new(2),
//!         ..EvolutionConfig::default()
//!     };
//!
//!     let mut evolution = Evolution::new(config, factory.gene_space(), |id: SimulationId| {
//!         factory.build(id)
//!     })
//!     .unwrap();
//!     let summary = evolution.run(&StopSignal::new(), None).unwrap();
//!     assert_eq!(summary.completed, 2);
//!     println!("Best crawler: {}", summary.champion.unwrap());
//! }
//! ```

mod config;
mod creature;
mod layout;
mod physics;
mod simulator;

pub use config::{BodyConfig, BodyConfigError};
pub use layout::{BodyLayout, BodyPlan, Joint, LayoutError, Part, GENES_PER_PART};
pub use physics::{compute_force, compute_mass};
pub use simulator::{BodySimulator, CreatureFactory};
