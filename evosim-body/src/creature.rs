//! Assembly of a creature's rigid bodies and motorized joints.
//!
//! The creature lies flat, its spine along the y axis: a chest
//! box linked through a waist sphere to a hip box. An arm hangs
//! off each side of the chest and a leg off each side of the hip,
//! each made of a shoulder sphere and a box (hand or foot).
//! Every sphere sits between two revolute joints.
use crate::layout::{BodyPlan, Joint, Part};
use crate::physics::{compute_force, compute_mass};
use crate::BodyConfig;

use rapier3d::na::{point, vector, Vector3};
use rapier3d::prelude::*;

/// Handles into the rapier sets holding a built creature.
#[derive(Debug)]
pub(crate) struct Creature {
    chest: RigidBodyHandle,
    motors: Vec<(Joint, ImpulseJointHandle)>,
}

impl Creature {
    /// Inserts the creature described by `plan`, resting
    /// `config.drop_height` above the ground plane `z = 0`.
    pub(crate) fn build(
        plan: &BodyPlan,
        config: &BodyConfig,
        bodies: &mut RigidBodySet,
        colliders: &mut ColliderSet,
        joints: &mut ImpulseJointSet,
    ) -> Creature {
        let mut assembly = Assembly {
            config,
            bodies,
            colliders,
            joints,
            motors: Vec::with_capacity(Joint::ALL.len()),
        };
        let r = config.joint_radius;
        let lowest = Part::ALL
            .iter()
            .map(|&part| plan.half_extents(part)[2])
            .fold(r, f32::max);
        let height = lowest + config.drop_height;

        let chest_size = plan.half_extents(Part::Chest);
        let chest_center = vector![0.0, 0.0, height];
        let chest = assembly.add_box(chest_size, chest_center);

        // Spine: chest -> waist -> hip.
        let hip_size = plan.half_extents(Part::Hip);
        let waist_center = chest_center - vector![0.0, chest_size[1] + r, 0.0];
        let waist = assembly.add_sphere(waist_center);
        assembly.add_joint(
            Joint::HipX,
            (chest, vector![0.0, -chest_size[1], 0.0]),
            (waist, vector![0.0, r, 0.0]),
            Vector3::x(),
            hip_size,
        );
        let hip_center = waist_center - vector![0.0, r + hip_size[1], 0.0];
        let hip = assembly.add_box(hip_size, hip_center);
        assembly.add_joint(
            Joint::HipY,
            (waist, vector![0.0, -r, 0.0]),
            (hip, vector![0.0, hip_size[1], 0.0]),
            Vector3::y(),
            hip_size,
        );

        let limbs = [
            (
                Limb::new(chest, chest_size, chest_center, 1.0),
                Part::LeftHand,
                Joint::LeftArmY,
                Joint::LeftArmZ,
            ),
            (
                Limb::new(chest, chest_size, chest_center, -1.0),
                Part::RightHand,
                Joint::RightArmY,
                Joint::RightArmZ,
            ),
            (
                Limb::new(hip, hip_size, hip_center, 1.0),
                Part::LeftFoot,
                Joint::LeftLegY,
                Joint::LeftLegZ,
            ),
            (
                Limb::new(hip, hip_size, hip_center, -1.0),
                Part::RightFoot,
                Joint::RightLegY,
                Joint::RightLegZ,
            ),
        ];
        for (limb, part, swing, sweep) in limbs {
            let Limb {
                parent,
                parent_size,
                parent_center,
                side,
            } = limb;
            let size = plan.half_extents(part);
            let shoulder_center = parent_center + vector![side * (parent_size[0] + r), 0.0, 0.0];
            let shoulder = assembly.add_sphere(shoulder_center);
            assembly.add_joint(
                swing,
                (parent, vector![side * parent_size[0], 0.0, 0.0]),
                (shoulder, vector![-side * r, 0.0, 0.0]),
                Vector3::y(),
                size,
            );
            let extremity =
                assembly.add_box(size, shoulder_center + vector![side * (r + size[0]), 0.0, 0.0]);
            assembly.add_joint(
                sweep,
                (shoulder, vector![side * r, 0.0, 0.0]),
                (extremity, vector![-side * size[0], 0.0, 0.0]),
                Vector3::z(),
                size,
            );
        }

        Creature {
            chest,
            motors: assembly.motors,
        }
    }

    /// The body whose position is reported for the creature.
    pub(crate) fn chest(&self) -> RigidBodyHandle {
        self.chest
    }

    /// Points every motor at its pattern's angle for `step`.
    pub(crate) fn drive(
        &self,
        plan: &BodyPlan,
        step: usize,
        config: &BodyConfig,
        joints: &mut ImpulseJointSet,
    ) {
        for &(joint, handle) in &self.motors {
            if let Some(motor) = joints.get_mut(handle, true) {
                motor.data.set_motor_position(
                    JointAxis::AngX,
                    plan.target(joint, step),
                    config.motor_stiffness,
                    config.motor_damping,
                );
            }
        }
    }
}

/// Attachment point of an arm or a leg. `side` is
/// `1.0` towards positive x (left) and `-1.0` otherwise.
struct Limb {
    parent: RigidBodyHandle,
    parent_size: [f32; 3],
    parent_center: Vector3<f32>,
    side: f32,
}

impl Limb {
    fn new(
        parent: RigidBodyHandle,
        parent_size: [f32; 3],
        parent_center: Vector3<f32>,
        side: f32,
    ) -> Limb {
        Limb {
            parent,
            parent_size,
            parent_center,
            side,
        }
    }
}

struct Assembly<'a> {
    config: &'a BodyConfig,
    bodies: &'a mut RigidBodySet,
    colliders: &'a mut ColliderSet,
    joints: &'a mut ImpulseJointSet,
    motors: Vec<(Joint, ImpulseJointHandle)>,
}

impl Assembly<'_> {
    fn add_box(&mut self, half_extents: [f32; 3], center: Vector3<f32>) -> RigidBodyHandle {
        let [x, y, z] = half_extents;
        let collider = ColliderBuilder::cuboid(x, y, z)
            .mass(compute_mass(half_extents, self.config.standard_volume))
            .friction(self.config.friction)
            .build();
        self.add_body(collider, center)
    }

    fn add_sphere(&mut self, center: Vector3<f32>) -> RigidBodyHandle {
        let collider = ColliderBuilder::ball(self.config.joint_radius)
            .mass(self.config.joint_mass)
            .friction(self.config.friction)
            .build();
        self.add_body(collider, center)
    }

    fn add_body(&mut self, collider: Collider, center: Vector3<f32>) -> RigidBodyHandle {
        let handle = self
            .bodies
            .insert(RigidBodyBuilder::dynamic().translation(center).build());
        self.colliders.insert_with_parent(collider, handle, self.bodies);
        handle
    }

    /// Links two bodies at the passed local anchors. The motor's
    /// strength derives from the mass of the part it moves.
    fn add_joint(
        &mut self,
        joint: Joint,
        (parent, parent_anchor): (RigidBodyHandle, Vector3<f32>),
        (child, child_anchor): (RigidBodyHandle, Vector3<f32>),
        axis: Vector3<f32>,
        moved_part: [f32; 3],
    ) {
        let revolute = RevoluteJointBuilder::new(UnitVector::new_normalize(axis))
            .local_anchor1(point![parent_anchor.x, parent_anchor.y, parent_anchor.z])
            .local_anchor2(point![child_anchor.x, child_anchor.y, child_anchor.z])
            .contacts_enabled(false);
        let handle = self.joints.insert(parent, child, revolute, true);

        let mass = compute_mass(moved_part, self.config.standard_volume);
        let force = compute_force(mass, self.config.min_force, self.config.max_force);
        if let Some(motor) = self.joints.get_mut(handle, false) {
            motor
                .data
                .set_motor_model(JointAxis::AngX, MotorModel::ForceBased);
            motor.data.set_motor_max_force(JointAxis::AngX, force);
            motor.data.set_motor_position(
                JointAxis::AngX,
                0.0,
                self.config.motor_stiffness,
                self.config.motor_damping,
            );
        }
        self.motors.push((joint, handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BodyLayout;

    use evosim::Genome;

    fn build(genes: Vec<f32>) -> (Creature, RigidBodySet, ColliderSet, ImpulseJointSet) {
        let config = BodyConfig::default();
        let plan = BodyLayout::new(&config)
            .unwrap()
            .decode(&Genome::from_genes(genes))
            .unwrap();
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();
        let mut joints = ImpulseJointSet::new();
        let creature = Creature::build(&plan, &config, &mut bodies, &mut colliders, &mut joints);
        (creature, bodies, colliders, joints)
    }

    fn uniform_genes(size: f32) -> Vec<f32> {
        let mut genes = vec![size; 18];
        genes.extend(vec![0.0; 40]);
        genes
    }

    #[test]
    fn every_part_and_joint_is_built() {
        let (creature, bodies, colliders, joints) = build(uniform_genes(0.3));
        // Six boxes and five spheres.
        assert_eq!(bodies.len(), 11);
        assert_eq!(colliders.len(), 11);
        assert_eq!(joints.len(), Joint::ALL.len());
        assert_eq!(creature.motors.len(), Joint::ALL.len());
        assert!(bodies.get(creature.chest()).is_some());
    }

    #[test]
    fn creature_spawns_above_the_ground() {
        let (creature, bodies, _, _) = build(uniform_genes(0.4));
        let config = BodyConfig::default();
        let chest = bodies.get(creature.chest()).unwrap();
        let height = chest.translation().z;
        assert!((height - (0.4 + config.drop_height)).abs() < 1e-5);
        for (_, body) in bodies.iter() {
            assert!(body.translation().z == height);
        }
    }

    #[test]
    fn limbs_are_mirrored_across_the_spine() {
        let (_, bodies, _, _) = build(uniform_genes(0.3));
        let mut xs: Vec<f32> = bodies.iter().map(|(_, b)| b.translation().x).collect();
        let sum: f32 = xs.iter().sum();
        assert!(sum.abs() < 1e-4);
        xs.retain(|x| x.abs() > 1e-6);
        assert_eq!(xs.len(), 8);
    }
}
