//! Per-player jointed skeleton solved by the same constraint solver that
//! services the rest of the world. There is deliberately no separate
//! integrator here -- the
//! pelvis is a kinematic body that follows the player, the rest of the
//! chain is dynamic bodies wired with [`DistanceConstraint`]/
//! [`DistanceRangeConstraint`], and `PhysicsWorld::step` does the work.

use serde::{Deserialize, Serialize};

use duskfang_foundation::fixed::{fixed, Fixed, FixedVec2};

use crate::physics::{layer, BodyKind, DistanceConstraint, DistanceRangeConstraint, PhysicsWorld};

const GROUND_PLANE: f32 = 0.0;
const GROUND_EPSILON: f32 = 0.01;
const SEGMENT_MASS: f32 = 0.05;

/// Indices into [`PlayerSkeleton::segments`] for the named joints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SkeletonSegments {
    pub pelvis: u32,
    pub spine: [u32; 2],
    pub left_leg: [u32; 3],
    pub right_leg: [u32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSkeleton {
    pub segments: SkeletonSegments,
    pub left_foot_grounded: bool,
    pub right_foot_grounded: bool,
    pub com_offset: Fixed,
    pub balance_quality: Fixed,
}

impl PlayerSkeleton {
    /// Spawn the pelvis, two 3-joint leg chains, and a 2-joint spine, all
    /// wired with constraints, returning a handle with derived signals
    /// zeroed until the first `update` call.
    pub fn spawn(world: &mut PhysicsWorld, pelvis_pos: FixedVec2) -> Self {
        let pelvis = world.create_body(BodyKind::Kinematic, pelvis_pos, Fixed::ZERO, fixed(0.03));
        world.get_body_mut(pelvis).unwrap().layer = layer::PLAYER;
        world.get_body_mut(pelvis).unwrap().mask = layer::ENVIRONMENT;

        let spine = [
            Self::spawn_segment(world, pelvis_pos + FixedVec2::new(Fixed::ZERO, fixed(0.08))),
            Self::spawn_segment(world, pelvis_pos + FixedVec2::new(Fixed::ZERO, fixed(0.16))),
        ];
        world.add_distance_constraint(DistanceConstraint {
            body_a: pelvis,
            body_b: spine[0],
            rest_length: fixed(0.08),
            stiffness: fixed(0.9),
        });
        world.add_distance_constraint(DistanceConstraint {
            body_a: spine[0],
            body_b: spine[1],
            rest_length: fixed(0.08),
            stiffness: fixed(0.9),
        });

        let left_leg = Self::spawn_leg(world, pelvis, pelvis_pos, fixed(-0.03));
        let right_leg = Self::spawn_leg(world, pelvis, pelvis_pos, fixed(0.03));

        PlayerSkeleton {
            segments: SkeletonSegments {
                pelvis,
                spine,
                left_leg,
                right_leg,
            },
            left_foot_grounded: false,
            right_foot_grounded: false,
            com_offset: Fixed::ZERO,
            balance_quality: Fixed::ONE,
        }
    }

    fn spawn_segment(world: &mut PhysicsWorld, pos: FixedVec2) -> u32 {
        let id = world.create_body(BodyKind::Dynamic, pos, fixed(SEGMENT_MASS), fixed(0.015));
        let body = world.get_body_mut(id).unwrap();
        body.layer = layer::PLAYER_ARM;
        body.mask = layer::ENVIRONMENT;
        id
    }

    fn spawn_leg(world: &mut PhysicsWorld, pelvis: u32, pelvis_pos: FixedVec2, x_offset: Fixed) -> [u32; 3] {
        let hip = Self::spawn_segment(world, pelvis_pos + FixedVec2::new(x_offset, fixed(-0.05)));
        let knee = Self::spawn_segment(world, pelvis_pos + FixedVec2::new(x_offset, fixed(-0.1)));
        let foot = Self::spawn_segment(world, pelvis_pos + FixedVec2::new(x_offset, fixed(-0.15)));

        world.add_distance_constraint(DistanceConstraint {
            body_a: pelvis,
            body_b: hip,
            rest_length: fixed(0.05),
            stiffness: fixed(0.9),
        });
        world.add_distance_range_constraint(DistanceRangeConstraint {
            body_a: hip,
            body_b: knee,
            min_length: fixed(0.03),
            max_length: fixed(0.06),
            stiffness: fixed(0.8),
        });
        world.add_distance_range_constraint(DistanceRangeConstraint {
            body_a: knee,
            body_b: foot,
            min_length: fixed(0.03),
            max_length: fixed(0.06),
            stiffness: fixed(0.8),
        });

        [hip, knee, foot]
    }

    /// Have the pelvis follow the player's position (called before
    /// `PhysicsWorld::step` each tick) and recompute balance signals after
    /// the constraint pass settles (called after the step).
    pub fn follow_player(&self, world: &mut PhysicsWorld, player_pos: FixedVec2) {
        world.set_kinematic_position(self.segments.pelvis, player_pos);
    }

    /// Recompute `com_offset`, `left_foot_grounded`, `right_foot_grounded`,
    /// and `balance_quality` from current body positions. Physics does the
    /// work; this just reads a weighted centre of mass.
    pub fn update_signals(&mut self, world: &PhysicsWorld) {
        let pelvis = world.get_body(self.segments.pelvis).unwrap();
        let pelvis_x = pelvis.position.x;

        let mut weighted_x = Fixed::ZERO;
        let mut total_mass = Fixed::ZERO;
        for id in self.all_segment_ids() {
            if let Some(b) = world.get_body(id) {
                weighted_x += b.position.x * b.mass.max(fixed(SEGMENT_MASS));
                total_mass += b.mass.max(fixed(SEGMENT_MASS));
            }
        }
        let com_x = if total_mass.is_zero() {
            pelvis_x
        } else {
            weighted_x / total_mass
        };
        self.com_offset = com_x - pelvis_x;

        let ground = fixed(GROUND_PLANE) + fixed(GROUND_EPSILON);
        self.left_foot_grounded = world
            .get_body(self.segments.left_leg[2])
            .map(|b| b.position.y <= ground)
            .unwrap_or(false);
        self.right_foot_grounded = world
            .get_body(self.segments.right_leg[2])
            .map(|b| b.position.y <= ground)
            .unwrap_or(false);

        let support_width = fixed(0.1);
        let quality = Fixed::ONE - (self.com_offset.abs() / support_width);
        self.balance_quality = quality.clamp(Fixed::ZERO, Fixed::ONE);
    }

    fn all_segment_ids(&self) -> [u32; 8] {
        [
            self.segments.pelvis,
            self.segments.spine[0],
            self.segments.spine[1],
            self.segments.left_leg[0],
            self.segments.left_leg[1],
            self.segments.left_leg[2],
            self.segments.right_leg[0],
            self.segments.right_leg[1],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_wires_exactly_the_expected_joint_count() {
        let mut world = PhysicsWorld::new();
        let _skeleton = PlayerSkeleton::spawn(&mut world, FixedVec2::new(fixed(0.5), fixed(0.5)));
        // pelvis + 2 spine + 2*3 leg segments = 9 bodies.
        assert_eq!(world.bodies().count(), 9);
    }

    #[test]
    fn balance_quality_starts_at_one_when_upright() {
        let mut world = PhysicsWorld::new();
        let mut skeleton =
            PlayerSkeleton::spawn(&mut world, FixedVec2::new(fixed(0.5), fixed(0.5)));
        for _ in 0..5 {
            world.step(fixed(1.0 / 60.0));
        }
        skeleton.update_signals(&world);
        assert!(skeleton.balance_quality.to_f32() > 0.5);
    }
}
