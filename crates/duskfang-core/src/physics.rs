//! Fixed-point rigid-body physics: integration, distance/range constraints,
//! and sphere-contact resolution.
//!
//! This is a hand-rolled position-based-dynamics solver rather than a
//! wrapper around a third-party physics crate -- see `DESIGN.md` for why.
//! The step order below is part of the determinism contract: reordering it
//! changes observable state.

use serde::{Deserialize, Serialize};

use duskfang_foundation::fixed::{fixed, Fixed, FixedVec2};
use duskfang_foundation::ids::IdAllocator;

// ---------------------------------------------------------------------------
// Collision layers
// ---------------------------------------------------------------------------

pub mod layer {
    pub const PLAYER: u16 = 1 << 0;
    pub const PLAYER_ARM: u16 = 1 << 1;
    pub const ENEMY: u16 = 1 << 2;
    pub const ENVIRONMENT: u16 = 1 << 3;
    pub const PROJECTILE: u16 = 1 << 4;
}

// ---------------------------------------------------------------------------
// RigidBody
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    Static,
    Kinematic,
    Dynamic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidBody {
    pub id: u32,
    pub kind: BodyKind,
    pub position: FixedVec2,
    pub previous_position: FixedVec2,
    pub velocity: FixedVec2,
    pub accumulated_force: FixedVec2,
    pub mass: Fixed,
    pub inverse_mass: Fixed,
    pub radius: Fixed,
    pub drag: Fixed,
    pub restitution: Fixed,
    pub friction: Fixed,
    pub layer: u16,
    pub mask: u16,
    pub sleeping: bool,
    pub awake_timer: Fixed,
}

impl RigidBody {
    fn new(id: u32, kind: BodyKind, position: FixedVec2, mass: Fixed, radius: Fixed) -> Self {
        let inverse_mass = match kind {
            BodyKind::Dynamic if !mass.is_zero() => Fixed::ONE / mass,
            _ => Fixed::ZERO,
        };
        RigidBody {
            id,
            kind,
            position,
            previous_position: position,
            velocity: FixedVec2::ZERO,
            accumulated_force: FixedVec2::ZERO,
            mass,
            inverse_mass,
            radius,
            drag: fixed(0.1),
            restitution: fixed(0.1),
            friction: fixed(0.6),
            layer: layer::ENVIRONMENT,
            mask: 0xFFFF,
            sleeping: false,
            awake_timer: Fixed::ZERO,
        }
    }

    fn wake(&mut self) {
        self.sleeping = false;
        self.awake_timer = Fixed::ZERO;
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceConstraint {
    pub body_a: u32,
    pub body_b: u32,
    pub rest_length: Fixed,
    pub stiffness: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceRangeConstraint {
    pub body_a: u32,
    pub body_b: u32,
    pub min_length: Fixed,
    pub max_length: Fixed,
    pub stiffness: Fixed,
}

// ---------------------------------------------------------------------------
// PhysicsWorld
// ---------------------------------------------------------------------------

const SLEEP_VELOCITY_THRESHOLD: f32 = 0.0008;
const SLEEP_TIME_SECONDS: f32 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsWorld {
    ids: IdAllocator,
    bodies: Vec<RigidBody>,
    distance_constraints: Vec<DistanceConstraint>,
    range_constraints: Vec<DistanceRangeConstraint>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        PhysicsWorld {
            ids: IdAllocator::new(),
            bodies: Vec::new(),
            distance_constraints: Vec::new(),
            range_constraints: Vec::new(),
        }
    }

    /// Reset to an empty world with id numbering restarted -- used by
    /// `init_run`/`reset_run`.
    pub fn reset(&mut self) {
        self.ids.reset();
        self.bodies.clear();
        self.distance_constraints.clear();
        self.range_constraints.clear();
    }

    pub fn create_body(
        &mut self,
        kind: BodyKind,
        position: FixedVec2,
        mass: Fixed,
        radius: Fixed,
    ) -> u32 {
        let id = self.ids.allocate();
        self.bodies.push(RigidBody::new(id, kind, position, mass, radius));
        id
    }

    /// Destroy a body and any constraints referencing it. Silently ignores
    /// unknown ids.
    pub fn destroy_body(&mut self, id: u32) {
        if !self.ids.destroy(id) {
            return;
        }
        self.bodies.retain(|b| b.id != id);
        self.distance_constraints
            .retain(|c| c.body_a != id && c.body_b != id);
        self.range_constraints
            .retain(|c| c.body_a != id && c.body_b != id);
    }

    pub fn is_alive(&self, id: u32) -> bool {
        self.ids.is_alive(id)
    }

    fn index_of(&self, id: u32) -> Option<usize> {
        self.bodies.iter().position(|b| b.id == id)
    }

    pub fn get_body(&self, id: u32) -> Option<&RigidBody> {
        self.index_of(id).map(|i| &self.bodies[i])
    }

    pub fn get_body_mut(&mut self, id: u32) -> Option<&mut RigidBody> {
        self.index_of(id).map(move |i| &mut self.bodies[i])
    }

    pub fn bodies(&self) -> impl Iterator<Item = &RigidBody> {
        self.bodies.iter()
    }

    /// Queue a force, consumed on the next `step`. Ignored for unknown ids.
    pub fn apply_force(&mut self, id: u32, force: FixedVec2) {
        if let Some(b) = self.get_body_mut(id) {
            b.accumulated_force += force;
        }
    }

    /// Apply an instantaneous impulse (`v += j * inverse_mass`), waking the
    /// body. Ignored for unknown ids.
    pub fn apply_impulse(&mut self, id: u32, impulse: FixedVec2) {
        if let Some(b) = self.get_body_mut(id) {
            b.velocity += impulse.scale(b.inverse_mass);
            b.wake();
        }
    }

    /// Overwrite a kinematic body's position directly (e.g. the skeleton
    /// pelvis following the player). No-op for non-kinematic bodies.
    pub fn set_kinematic_position(&mut self, id: u32, position: FixedVec2) {
        if let Some(b) = self.get_body_mut(id) {
            if b.kind == BodyKind::Kinematic {
                b.position = position;
            }
        }
    }

    pub fn add_distance_constraint(&mut self, c: DistanceConstraint) {
        self.distance_constraints.push(c);
    }

    pub fn add_distance_range_constraint(&mut self, c: DistanceRangeConstraint) {
        self.range_constraints.push(c);
    }

    pub fn remove_constraints_for_body(&mut self, id: u32) {
        self.distance_constraints
            .retain(|c| c.body_a != id && c.body_b != id);
        self.range_constraints
            .retain(|c| c.body_a != id && c.body_b != id);
    }

    /// Advance the world by `dt`, clamped to
    /// `[crate::constants::MIN_DT, crate::constants::MAX_DT]` by the caller
    /// (the `Coordinator` owns clamping; this method trusts its input).
    pub fn step(&mut self, dt: Fixed) {
        self.integrate_forces(dt);
        for _pass in 0..2 {
            self.resolve_distance_constraints();
            self.resolve_range_constraints();
        }
        self.resolve_contacts();
        self.recompute_velocities(dt);
        self.manage_sleep(dt);
    }

    fn integrate_forces(&mut self, dt: Fixed) {
        for b in &mut self.bodies {
            match b.kind {
                BodyKind::Dynamic => {
                    if b.sleeping {
                        b.accumulated_force = FixedVec2::ZERO;
                        continue;
                    }
                    let accel = b.accumulated_force.scale(b.inverse_mass);
                    b.velocity += accel.scale(dt);
                    b.velocity = b.velocity.scale(Fixed::ONE - b.drag * dt);
                    b.previous_position = b.position;
                    b.position += b.velocity.scale(dt);
                    b.accumulated_force = FixedVec2::ZERO;
                }
                BodyKind::Kinematic => {
                    b.previous_position = b.position;
                    // Position already set externally via `set_kinematic_position`.
                }
                BodyKind::Static => {}
            }
        }
    }

    fn resolve_distance_constraints(&mut self) {
        for i in 0..self.distance_constraints.len() {
            let c = self.distance_constraints[i].clone();
            self.apply_length_correction(c.body_a, c.body_b, c.rest_length, c.stiffness);
        }
    }

    fn resolve_range_constraints(&mut self) {
        for i in 0..self.range_constraints.len() {
            let c = self.range_constraints[i].clone();
            let (ia, ib) = match (self.index_of(c.body_a), self.index_of(c.body_b)) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            let delta = self.bodies[ib].position - self.bodies[ia].position;
            let len = delta.length();
            if len >= c.min_length && len <= c.max_length {
                continue;
            }
            let target = if len < c.min_length {
                c.min_length
            } else {
                c.max_length
            };
            self.apply_length_correction(c.body_a, c.body_b, target, c.stiffness);
        }
    }

    /// Shared positional correction used by both constraint kinds: splits
    /// the length error by inverse-mass weighting and scales by stiffness.
    fn apply_length_correction(&mut self, id_a: u32, id_b: u32, target: Fixed, stiffness: Fixed) {
        let (ia, ib) = match (self.index_of(id_a), self.index_of(id_b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };
        let pa = self.bodies[ia].position;
        let pb = self.bodies[ib].position;
        let delta = pb - pa;
        let len = delta.length();
        if len.is_zero() {
            return;
        }
        let error = len - target;
        let dir = FixedVec2::new(delta.x / len, delta.y / len);

        let wa = self.bodies[ia].inverse_mass;
        let wb = self.bodies[ib].inverse_mass;
        let total_w = wa + wb;
        if total_w.is_zero() {
            return;
        }

        let correction = error * stiffness;
        let corr_a = dir.scale(correction * (wa / total_w));
        let corr_b = dir.scale(correction * (wb / total_w));

        if self.bodies[ia].kind == BodyKind::Dynamic {
            self.bodies[ia].position += corr_a;
        }
        if self.bodies[ib].kind == BodyKind::Dynamic {
            self.bodies[ib].position -= corr_b;
        }
    }

    /// O(n^2) sphere-contact pass over pairs whose `(layer & mask)`
    /// intersect. Separates positionally by weighted inverse mass and
    /// applies a restitution + Coulomb-friction impulse.
    fn resolve_contacts(&mut self) {
        let n = self.bodies.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (layer_i, mask_i) = (self.bodies[i].layer, self.bodies[i].mask);
                let (layer_j, mask_j) = (self.bodies[j].layer, self.bodies[j].mask);
                if (layer_i & mask_j) == 0 && (layer_j & mask_i) == 0 {
                    continue;
                }
                if self.bodies[i].kind == BodyKind::Static
                    && self.bodies[j].kind == BodyKind::Static
                {
                    continue;
                }

                let pi = self.bodies[i].position;
                let pj = self.bodies[j].position;
                let delta = pj - pi;
                let dist = delta.length();
                let min_dist = self.bodies[i].radius + self.bodies[j].radius;
                if dist.is_zero() || dist >= min_dist {
                    continue;
                }

                let normal = FixedVec2::new(delta.x / dist, delta.y / dist);
                let penetration = min_dist - dist;

                let wi = self.bodies[i].inverse_mass;
                let wj = self.bodies[j].inverse_mass;
                let total_w = wi + wj;
                if total_w.is_zero() {
                    continue;
                }

                let sep_i = normal.scale(penetration * (wi / total_w));
                let sep_j = normal.scale(penetration * (wj / total_w));
                if self.bodies[i].kind == BodyKind::Dynamic {
                    self.bodies[i].position -= sep_i;
                }
                if self.bodies[j].kind == BodyKind::Dynamic {
                    self.bodies[j].position += sep_j;
                }

                let rel_vel = self.bodies[j].velocity - self.bodies[i].velocity;
                let vel_along_normal = rel_vel.dot(normal);
                if vel_along_normal < Fixed::ZERO {
                    let restitution = self.bodies[i].restitution.min(self.bodies[j].restitution);
                    let jn = -(Fixed::ONE + restitution) * vel_along_normal / total_w;
                    let impulse_n = normal.scale(jn);
                    if self.bodies[i].kind == BodyKind::Dynamic {
                        self.bodies[i].velocity -= impulse_n.scale(wi);
                    }
                    if self.bodies[j].kind == BodyKind::Dynamic {
                        self.bodies[j].velocity += impulse_n.scale(wj);
                    }

                    let tangent_full = rel_vel - normal.scale(rel_vel.dot(normal));
                    let tangent_len = tangent_full.length();
                    if !tangent_len.is_zero() {
                        let tangent = tangent_full.scale(Fixed::ONE / tangent_len);
                        let jt = -rel_vel.dot(tangent) / total_w;
                        let friction = self.bodies[i].friction.min(self.bodies[j].friction);
                        let max_friction = friction * jn.abs();
                        let jt_clamped = jt.clamp(-max_friction, max_friction);
                        let impulse_t = tangent.scale(jt_clamped);
                        if self.bodies[i].kind == BodyKind::Dynamic {
                            self.bodies[i].velocity -= impulse_t.scale(wi);
                        }
                        if self.bodies[j].kind == BodyKind::Dynamic {
                            self.bodies[j].velocity += impulse_t.scale(wj);
                        }
                    }
                }

                self.bodies[i].wake();
                self.bodies[j].wake();
            }
        }
    }

    fn recompute_velocities(&mut self, dt: Fixed) {
        if dt.is_zero() {
            return;
        }
        for b in &mut self.bodies {
            if b.kind == BodyKind::Dynamic {
                b.velocity = (b.position - b.previous_position).scale(Fixed::ONE / dt);
            }
        }
    }

    fn manage_sleep(&mut self, dt: Fixed) {
        let threshold = fixed(SLEEP_VELOCITY_THRESHOLD);
        let sleep_time = fixed(SLEEP_TIME_SECONDS);
        for b in &mut self.bodies {
            if b.kind != BodyKind::Dynamic {
                continue;
            }
            if b.velocity.length() < threshold {
                b.awake_timer += dt;
                if b.awake_timer >= sleep_time {
                    b.sleeping = true;
                    b.velocity = FixedVec2::ZERO;
                }
            } else {
                b.awake_timer = Fixed::ZERO;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duskfang_foundation::fixed::fixed;

    #[test]
    fn dynamic_body_drifts_with_velocity() {
        let mut world = PhysicsWorld::new();
        let id = world.create_body(
            BodyKind::Dynamic,
            FixedVec2::new(fixed(0.5), fixed(0.5)),
            Fixed::ONE,
            fixed(0.02),
        );
        world.apply_impulse(id, FixedVec2::new(fixed(1.0), Fixed::ZERO));
        for _ in 0..10 {
            world.step(fixed(1.0 / 60.0));
        }
        let body = world.get_body(id).unwrap();
        assert!(body.position.x.to_f32() > 0.5);
    }

    #[test]
    fn destroyed_body_id_is_ignored_not_panicking() {
        let mut world = PhysicsWorld::new();
        world.apply_force(999, FixedVec2::ZERO);
        world.apply_impulse(999, FixedVec2::ZERO);
        world.destroy_body(999);
    }

    #[test]
    fn distance_constraint_pulls_bodies_to_rest_length() {
        let mut world = PhysicsWorld::new();
        let a = world.create_body(
            BodyKind::Static,
            FixedVec2::new(fixed(0.5), fixed(0.5)),
            Fixed::ZERO,
            fixed(0.01),
        );
        let b = world.create_body(
            BodyKind::Dynamic,
            FixedVec2::new(fixed(0.5), fixed(0.7)),
            Fixed::ONE,
            fixed(0.01),
        );
        world.add_distance_constraint(DistanceConstraint {
            body_a: a,
            body_b: b,
            rest_length: fixed(0.1),
            stiffness: fixed(1.0),
        });
        for _ in 0..30 {
            world.step(fixed(1.0 / 60.0));
        }
        let dist =
            (world.get_body(b).unwrap().position - world.get_body(a).unwrap().position).length();
        assert!((dist.to_f32() - 0.1).abs() < 0.02);
    }

    #[test]
    fn overlapping_spheres_separate() {
        let mut world = PhysicsWorld::new();
        let a = world.create_body(
            BodyKind::Dynamic,
            FixedVec2::new(fixed(0.5), fixed(0.5)),
            Fixed::ONE,
            fixed(0.05),
        );
        let b = world.create_body(
            BodyKind::Dynamic,
            FixedVec2::new(fixed(0.50), fixed(0.52)),
            Fixed::ONE,
            fixed(0.05),
        );
        world.get_body_mut(a).unwrap().layer = layer::ENEMY;
        world.get_body_mut(a).unwrap().mask = layer::ENEMY;
        world.get_body_mut(b).unwrap().layer = layer::ENEMY;
        world.get_body_mut(b).unwrap().mask = layer::ENEMY;
        for _ in 0..20 {
            world.step(fixed(1.0 / 60.0));
        }
        let dist =
            (world.get_body(b).unwrap().position - world.get_body(a).unwrap().position).length();
        assert!(dist.to_f32() >= 0.09);
    }

    #[test]
    fn step_is_deterministic_given_same_inputs() {
        fn run() -> FixedVec2 {
            let mut world = PhysicsWorld::new();
            let id = world.create_body(
                BodyKind::Dynamic,
                FixedVec2::new(fixed(0.5), fixed(0.5)),
                Fixed::ONE,
                fixed(0.02),
            );
            world.apply_impulse(id, FixedVec2::new(fixed(0.37), fixed(-0.21)));
            for _ in 0..120 {
                world.step(fixed(1.0 / 60.0));
            }
            world.get_body(id).unwrap().position
        }
        assert_eq!(run(), run());
    }
}
