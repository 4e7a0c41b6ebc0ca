use crate::creature::Creature;
use crate::layout::{BodyLayout, BodyPlan};
use crate::{BodyConfig, BodyConfigError};

use evosim::{GeneSpace, Genome, PhysicsEngine, Position, SimulationFailure, SimulationId};
use rapier3d::na::{vector, Vector3};
use rapier3d::prelude::*;
use tracing::trace;

/// Builds identical [`BodySimulator`]s, one per worker.
///
/// # Examples
/// ```
/// use evosim::{PhysicsEngine, SimulationId};
/// use evosim_body::{BodyConfig, CreatureFactory};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let factory = CreatureFactory::new(BodyConfig::default(), 1.0 / 240.0).unwrap();
/// let genome = factory.gene_space().random_genome(&mut StdRng::seed_from_u64(1));
///
/// let mut engine = factory.build(SimulationId(0));
/// let start = engine.spawn(&genome).unwrap();
/// for step in 0..60 {
///     engine.step(step).unwrap();
/// }
/// assert!(engine.position().unwrap().is_finite());
/// assert!(start.is_finite());
/// engine.remove_simulation();
/// assert!(engine.position().is_none());
/// ```
#[derive(Clone, Debug)]
pub struct CreatureFactory {
    layout: BodyLayout,
    config: BodyConfig,
    timestep: f32,
}

impl CreatureFactory {
    /// Validates `config` for simulations advancing by
    /// `timestep` seconds per step.
    pub fn new(config: BodyConfig, timestep: f32) -> Result<CreatureFactory, BodyConfigError> {
        config.validate()?;
        if !(timestep.is_finite() && timestep > 0.0) {
            return Err(BodyConfigError::NotPositive {
                field: "timestep",
                value: timestep,
            });
        }
        let layout = BodyLayout::new(&config).ok_or(BodyConfigError::EmptyRange {
            field: "max_half_extent",
            min: config.min_half_extent,
            max: config.max_half_extent,
        })?;
        Ok(CreatureFactory {
            layout,
            config,
            timestep,
        })
    }

    pub fn layout(&self) -> &BodyLayout {
        &self.layout
    }

    pub fn config(&self) -> &BodyConfig {
        &self.config
    }

    /// Bounds of every creature gene.
    pub fn gene_space(&self) -> GeneSpace {
        self.layout.gene_space()
    }

    /// Creates the engine of worker `id`.
    pub fn build(&self, id: SimulationId) -> BodySimulator {
        BodySimulator {
            id,
            layout: self.layout.clone(),
            config: self.config.clone(),
            timestep: self.timestep,
            world: None,
        }
    }
}

/// A [`PhysicsEngine`] simulating one creature at a time
/// on a flat, infinite-looking ground.
#[derive(Debug)]
pub struct BodySimulator {
    id: SimulationId,
    layout: BodyLayout,
    config: BodyConfig,
    timestep: f32,
    world: Option<World>,
}

impl BodySimulator {
    pub fn id(&self) -> SimulationId {
        self.id
    }

    /// Blueprint of the creature currently simulated.
    pub fn plan(&self) -> Option<&BodyPlan> {
        self.world.as_ref().map(|w| &w.plan)
    }
}

impl PhysicsEngine for BodySimulator {
    fn spawn(&mut self, genome: &Genome) -> Result<Position, SimulationFailure> {
        let plan = self
            .layout
            .decode(genome)
            .map_err(|e| SimulationFailure::InvalidGenome(e.to_string()))?;
        let world = World::new(plan, &self.config, self.timestep);
        let start = world
            .position()
            .ok_or_else(|| SimulationFailure::Engine("creature chest missing".into()))?;
        self.world = Some(world);
        trace!(sim = self.id.0, "creature spawned");
        Ok(start)
    }

    fn step(&mut self, step: usize) -> Result<(), SimulationFailure> {
        let world = self
            .world
            .as_mut()
            .ok_or_else(|| SimulationFailure::Engine("no creature spawned".into()))?;
        world.step(step, &self.config);
        Ok(())
    }

    fn position(&self) -> Option<Position> {
        self.world.as_ref().and_then(World::position)
    }

    fn render(&mut self) {
        if let Some(p) = self.position() {
            trace!(sim = self.id.0, x = p.x, y = p.y, z = p.z, "frame");
        }
    }

    fn remove_simulation(&mut self) {
        if self.world.take().is_some() {
            trace!(sim = self.id.0, "creature removed");
        }
    }
}

/// Rapier state of a single rollout.
struct World {
    pipeline: PhysicsPipeline,
    gravity: Vector3<f32>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    creature: Creature,
    plan: BodyPlan,
}

impl World {
    fn new(plan: BodyPlan, config: &BodyConfig, timestep: f32) -> World {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = timestep;

        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();
        let mut impulse_joints = ImpulseJointSet::new();

        let ground = bodies.insert(RigidBodyBuilder::fixed().build());
        let ground_collider = ColliderBuilder::cuboid(500.0, 500.0, 1.0)
            .translation(vector![0.0, 0.0, -1.0])
            .friction(config.friction)
            .build();
        colliders.insert_with_parent(ground_collider, ground, &mut bodies);

        let creature = Creature::build(
            &plan,
            config,
            &mut bodies,
            &mut colliders,
            &mut impulse_joints,
        );

        World {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, 0.0, -config.gravity],
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders,
            impulse_joints,
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            creature,
            plan,
        }
    }

    fn step(&mut self, step: usize, config: &BodyConfig) {
        self.creature
            .drive(&self.plan, step, config, &mut self.impulse_joints);
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    fn position(&self) -> Option<Position> {
        let chest = self.bodies.get(self.creature.chest())?.translation();
        Some(Position::new(chest.x, chest.y, chest.z))
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("bodies", &self.bodies.len())
            .field("joints", &self.impulse_joints.len())
            .field("position", &self.position())
            .finish()
    }
}
