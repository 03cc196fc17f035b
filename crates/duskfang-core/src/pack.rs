//! Pack-level coordination: role assignment and plan selection across a
//! group of wolves.
//!
//! A pack re-evaluates its plan on a fixed period rather than every tick --
//! the plan is a coarse group-level decision (who flanks, who holds back),
//! not a per-frame reaction, and re-picking it constantly would make packs
//! flicker between behaviors whenever a single wolf's hp ticks down. Plan
//! *execution* runs every tick regardless, driving member wolves through
//! `WolfSim`'s pack-command surface (`force_state`/`set_move_target`/
//! `grant_pack_command`).

use serde::{Deserialize, Serialize};

use duskfang_diagnostics::{DiagnosticLog, GameEvent};
use duskfang_foundation::fixed::{fixed, Fixed, FixedVec2};
use duskfang_foundation::ids::IdAllocator;
use duskfang_foundation::rng::Rng;

use crate::constants;
use crate::physics::PhysicsWorld;
use crate::wolf::{sector_direction, WolfFsmState, WolfSim};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackRole {
    Scout,
    Skirmisher,
    Bruiser,
    /// Read by the `Distract` plan: a support-role wolf draws attention
    /// while others reposition.
    Support,
    /// The member with the highest `intelligence * morale` product at the
    /// last role assignment; plan execution routes commands through it
    /// first but every member still runs its own FSM.
    Leader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackPlan {
    Ambush,
    Pincer,
    Commit,
    Flank,
    Distract,
    Retreat,
    Regroup,
}

impl PackPlan {
    fn name(self) -> &'static str {
        match self {
            PackPlan::Ambush => "ambush",
            PackPlan::Pincer => "pincer",
            PackPlan::Commit => "commit",
            PackPlan::Flank => "flank",
            PackPlan::Distract => "distract",
            PackPlan::Retreat => "retreat",
            PackPlan::Regroup => "regroup",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pack {
    pub id: u32,
    pub member_wolf_ids: Vec<u32>,
    pub roles: Vec<(u32, PackRole)>,
    /// Index into `member_wolf_ids`/`roles` of the current leader, or -1
    /// if the pack has never had a role assignment pass.
    pub leader_index: i32,
    pub plan: PackPlan,
    pub plan_timer: Fixed,
    pub morale: Fixed,
    pub max_concurrent_attackers: u32,
}

impl Pack {
    pub fn role_of(&self, wolf_id: u32) -> Option<PackRole> {
        self.roles.iter().find(|(id, _)| *id == wolf_id).map(|(_, r)| *r)
    }

    pub fn leader_id(&self) -> Option<u32> {
        if self.leader_index < 0 {
            return None;
        }
        self.member_wolf_ids.get(self.leader_index as usize).copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackSim {
    ids: IdAllocator,
    packs: Vec<Pack>,
}

impl Default for PackSim {
    fn default() -> Self {
        Self::new()
    }
}

impl PackSim {
    pub fn new() -> Self {
        PackSim {
            ids: IdAllocator::new(),
            packs: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.ids.reset();
        self.packs.clear();
    }

    pub fn form_pack(&mut self, wolf_sim: &WolfSim, member_wolf_ids: Vec<u32>) -> u32 {
        let id = self.ids.allocate();
        let (roles, leader_index) = Self::assign_roles(wolf_sim, &member_wolf_ids);
        self.packs.push(Pack {
            id,
            member_wolf_ids,
            roles,
            leader_index,
            // No selection trigger picks Ambush; it's the pack's resting
            // plan until a re-evaluation finds a reason to change it.
            plan: PackPlan::Ambush,
            plan_timer: Fixed::ZERO,
            morale: Fixed::ONE,
            max_concurrent_attackers: constants::DEFAULT_MAX_CONCURRENT_ATTACKERS,
        });
        id
    }

    pub fn disband(&mut self, id: u32) {
        self.ids.destroy(id);
        self.packs.retain(|p| p.id != id);
    }

    pub fn get(&self, id: u32) -> Option<&Pack> {
        self.packs.iter().find(|p| p.id == id)
    }

    pub fn packs(&self) -> impl Iterator<Item = &Pack> {
        self.packs.iter()
    }

    /// Remove dead wolves from every pack's roster. Packs left with zero
    /// live members are disbanded.
    pub fn prune_dead_members(&mut self, wolf_sim: &WolfSim) {
        for pack in &mut self.packs {
            pack.member_wolf_ids.retain(|id| wolf_sim.is_alive(*id));
            pack.roles.retain(|(id, _)| wolf_sim.is_alive(*id));
            if pack.leader_index >= pack.member_wolf_ids.len() as i32 {
                pack.leader_index = -1;
            }
        }
        self.packs.retain(|p| !p.member_wolf_ids.is_empty());
    }

    /// Leader: highest `intelligence * morale`. Remaining members:
    /// Bruiser (`aggression > 0.6`) > Skirmisher (`base_speed > 0.28`) >
    /// Support (`intelligence > 0.7`) > Scout.
    fn assign_roles(wolf_sim: &WolfSim, member_wolf_ids: &[u32]) -> (Vec<(u32, PackRole)>, i32) {
        let mut leader_index: i32 = -1;
        let mut leader_score = Fixed::ZERO;
        for (i, id) in member_wolf_ids.iter().enumerate() {
            if let Some(w) = wolf_sim.get(*id) {
                let score = w.intelligence * w.morale;
                if leader_index < 0 || score > leader_score {
                    leader_index = i as i32;
                    leader_score = score;
                }
            }
        }

        let roles = member_wolf_ids
            .iter()
            .enumerate()
            .filter_map(|(i, id)| {
                let wolf = wolf_sim.get(*id)?;
                let role = if i as i32 == leader_index {
                    PackRole::Leader
                } else if wolf.base_aggression > constants::bruiser_aggression_threshold() {
                    PackRole::Bruiser
                } else if wolf.base_speed > constants::skirmisher_speed_threshold() {
                    PackRole::Skirmisher
                } else if wolf.intelligence > constants::support_intelligence_threshold() {
                    PackRole::Support
                } else {
                    PackRole::Scout
                };
                Some((*id, role))
            })
            .collect();
        (roles, leader_index)
    }

    /// Advance every pack's plan timer, re-evaluate plans whose period has
    /// elapsed, and run the current plan's per-tick execution step.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        dt: Fixed,
        wolf_sim: &mut WolfSim,
        world: &PhysicsWorld,
        player_pos: FixedVec2,
        tick: u64,
        rng: &mut Rng,
        log: &mut DiagnosticLog,
    ) {
        for pack in &mut self.packs {
            pack.plan_timer += dt;
            let avg_health = Self::average_health(wolf_sim, &pack.member_wolf_ids);
            pack.morale = constants::pack_morale_base() + avg_health * constants::pack_morale_health_weight();

            if pack.plan_timer >= constants::plan_reevaluate_period() {
                pack.plan_timer = Fixed::ZERO;
                let (roles, leader_index) = Self::assign_roles(wolf_sim, &pack.member_wolf_ids);
                pack.roles = roles;
                pack.leader_index = leader_index;

                if let Some(next) = Self::choose_plan(pack, wolf_sim, world, avg_health, player_pos) {
                    if next != pack.plan {
                        log.record(GameEvent::PackPlanChange {
                            tick,
                            pack_id: pack.id,
                            plan: next.name(),
                        });
                        pack.plan = next;
                    }
                }
                pack.max_concurrent_attackers = Self::attacker_budget(pack.plan, pack.member_wolf_ids.len() as u32);
            }

            Self::execute_plan(pack, wolf_sim, world, player_pos, tick, rng, log);
        }
    }

    fn average_health(wolf_sim: &WolfSim, members: &[u32]) -> Fixed {
        if members.is_empty() {
            return Fixed::ZERO;
        }
        let mut total = Fixed::ZERO;
        let mut count = 0;
        for id in members {
            if let Some(w) = wolf_sim.get(*id) {
                total += w.hp_ratio();
                count += 1;
            }
        }
        if count == 0 {
            Fixed::ZERO
        } else {
            total / fixed(count as f32)
        }
    }

    /// `None` means "keep the current plan" -- this re-evaluation found no
    /// threshold crossed.
    fn choose_plan(
        pack: &Pack,
        wolf_sim: &WolfSim,
        world: &PhysicsWorld,
        avg_health: Fixed,
        player_pos: FixedVec2,
    ) -> Option<PackPlan> {
        if avg_health < constants::pack_retreat_avg_health() {
            return Some(PackPlan::Retreat);
        }

        let members: Vec<_> = pack.member_wolf_ids.iter().filter_map(|id| wolf_sim.get(*id)).collect();
        let alive = members.len() as u32;

        let ready_to_attack = members
            .iter()
            .filter(|w| w.attack_cooldown <= Fixed::ZERO && w.stamina > constants::wolf_attack_min_stamina())
            .count() as u32;
        if ready_to_attack >= 3 {
            return Some(PackPlan::Commit);
        }

        let near_player = pack
            .member_wolf_ids
            .iter()
            .filter(|id| distance_ok(world, wolf_sim, **id, player_pos, constants::pack_near_player_radius()))
            .count() as u32;
        if near_player >= 2 && near_player < alive {
            return Some(PackPlan::Flank);
        }

        if alive >= 3 {
            return Some(PackPlan::Pincer);
        }

        None
    }

    fn attacker_budget(plan: PackPlan, member_count: u32) -> u32 {
        let base = constants::DEFAULT_MAX_CONCURRENT_ATTACKERS;
        match plan {
            PackPlan::Retreat | PackPlan::Regroup => 0,
            PackPlan::Commit => member_count,
            PackPlan::Pincer => (base + 1).min(member_count),
            PackPlan::Distract => 1.min(member_count),
            _ => base.min(member_count),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_plan(
        pack: &Pack,
        wolf_sim: &mut WolfSim,
        world: &PhysicsWorld,
        player_pos: FixedVec2,
        tick: u64,
        _rng: &mut Rng,
        log: &mut DiagnosticLog,
    ) {
        match pack.plan {
            PackPlan::Ambush => {
                for (id, role) in &pack.roles {
                    if *role == PackRole::Scout {
                        wolf_sim.force_state(*id, WolfFsmState::Approach, tick, log);
                    } else {
                        let sector = wolf_sim.optimal_attack_angle(world, *id, player_pos);
                        let target = player_pos + sector_direction(sector.to_f32() as usize).scale(constants::pincer_radius());
                        wolf_sim.set_move_target(*id, target);
                    }
                }
            }
            PackPlan::Pincer => {
                for (i, id) in pack.member_wolf_ids.iter().enumerate() {
                    let sector = if i % 2 == 0 { 0 } else { 4 };
                    let target = player_pos + sector_direction(sector).scale(constants::pincer_radius());
                    wolf_sim.set_move_target(*id, target);
                }
            }
            PackPlan::Commit => {
                let mut ranked: Vec<(u32, Fixed)> = pack
                    .member_wolf_ids
                    .iter()
                    .filter_map(|id| wolf_sim.body_position(world, *id).map(|p| (*id, (p - player_pos).length())))
                    .collect();
                ranked.sort_by(|a, b| a.1.raw().cmp(&b.1.raw()));
                let budget = pack.max_concurrent_attackers as usize;
                for (i, (id, _)) in ranked.iter().enumerate() {
                    if i < budget {
                        wolf_sim.grant_pack_command(*id);
                        wolf_sim.clear_move_target(*id);
                    } else {
                        wolf_sim.force_state(*id, WolfFsmState::CircleStrafe, tick, log);
                    }
                }
            }
            PackPlan::Flank => {
                for (id, role) in &pack.roles {
                    if *role == PackRole::Bruiser {
                        wolf_sim.force_state(*id, WolfFsmState::Approach, tick, log);
                    } else {
                        wolf_sim.force_state(*id, WolfFsmState::CircleStrafe, tick, log);
                    }
                }
            }
            PackPlan::Distract => {
                if let Some((id, _)) = pack.roles.iter().find(|(_, r)| *r == PackRole::Support) {
                    wolf_sim.force_state(*id, WolfFsmState::Approach, tick, log);
                }
            }
            PackPlan::Retreat => {
                for id in &pack.member_wolf_ids {
                    wolf_sim.force_state(*id, WolfFsmState::Retreat, tick, log);
                }
            }
            PackPlan::Regroup => {
                let positions: Vec<FixedVec2> = pack
                    .member_wolf_ids
                    .iter()
                    .filter_map(|id| wolf_sim.body_position(world, *id))
                    .collect();
                if positions.is_empty() {
                    return;
                }
                let mut centroid = FixedVec2::ZERO;
                for p in &positions {
                    centroid += *p;
                }
                centroid = centroid.scale(Fixed::ONE / fixed(positions.len() as f32));
                for id in &pack.member_wolf_ids {
                    wolf_sim.set_move_target(*id, centroid);
                }
            }
        }
    }
}

/// Real distance check against the wolf's physics body (the earlier
/// version of this was a hardcoded `true` stub and never filtered
/// anything).
fn distance_ok(world: &PhysicsWorld, wolf_sim: &WolfSim, wolf_id: u32, player_pos: FixedVec2, radius: Fixed) -> bool {
    match wolf_sim.body_position(world, wolf_id) {
        Some(pos) => (pos - player_pos).length() <= radius,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::PhysicsWorld;

    fn spawn_wolves(n: usize) -> (PhysicsWorld, WolfSim, Vec<u32>) {
        let mut world = PhysicsWorld::new();
        let mut sim = WolfSim::new();
        let mut ids = Vec::new();
        for i in 0..n {
            let id = sim.spawn_wolf(&mut world, FixedVec2::new(fixed(0.5 + i as f32 * 0.05), fixed(0.5)), fixed(1.0));
            ids.push(id);
        }
        (world, sim, ids)
    }

    #[test]
    fn form_pack_assigns_a_role_per_member_and_picks_a_leader() {
        let (_world, wolf_sim, ids) = spawn_wolves(3);
        let mut packs = PackSim::new();
        let pack_id = packs.form_pack(&wolf_sim, ids.clone());
        let pack = packs.get(pack_id).unwrap();
        assert_eq!(pack.roles.len(), 3);
        assert!(pack.leader_index >= 0);
        assert!(pack.leader_id().is_some());
    }

    #[test]
    fn low_average_health_forces_retreat() {
        let (world, mut wolf_sim, ids) = spawn_wolves(2);
        for id in &ids {
            wolf_sim.get_mut(*id).unwrap().hp = fixed(0.1);
        }
        let mut packs = PackSim::new();
        let pack_id = packs.form_pack(&wolf_sim, ids);
        let mut rng = Rng::new(1);
        let mut log = DiagnosticLog::new();
        packs.update(
            constants::plan_reevaluate_period(),
            &mut wolf_sim,
            &world,
            FixedVec2::new(fixed(0.5), fixed(0.5)),
            0,
            &mut rng,
            &mut log,
        );
        assert_eq!(packs.get(pack_id).unwrap().plan, PackPlan::Retreat);
        assert_eq!(packs.get(pack_id).unwrap().max_concurrent_attackers, 0);
        assert_eq!(wolf_sim.get(ids_first(&packs, pack_id)).unwrap().state, WolfFsmState::Retreat);
    }

    fn ids_first(packs: &PackSim, pack_id: u32) -> u32 {
        packs.get(pack_id).unwrap().member_wolf_ids[0]
    }

    #[test]
    fn prune_dead_members_disbands_empty_pack() {
        let (mut world, mut wolf_sim, ids) = spawn_wolves(1);
        let mut packs = PackSim::new();
        let pack_id = packs.form_pack(&wolf_sim, ids.clone());
        let mut log = DiagnosticLog::new();
        wolf_sim.damage_wolf(&mut world, ids[0], fixed(1.0), FixedVec2::ZERO, 0, &mut log);
        packs.prune_dead_members(&wolf_sim);
        assert!(packs.get(pack_id).is_none());
    }

    #[test]
    fn distance_ok_rejects_wolves_outside_the_radius() {
        let (mut world, sim, ids) = spawn_wolves(1);
        let wolf_id = ids[0];
        let body_id = sim.get(wolf_id).unwrap().body_id;
        world.get_body_mut(body_id).unwrap().position = FixedVec2::new(fixed(10.0), fixed(10.0));
        assert!(!distance_ok(&world, &sim, wolf_id, FixedVec2::ZERO, fixed(1.0)));
    }

    #[test]
    fn three_or_more_alive_members_default_to_pincer_on_reevaluation() {
        let (world, mut wolf_sim, ids) = spawn_wolves(3);
        for id in &ids {
            let w = wolf_sim.get_mut(*id).unwrap();
            w.attack_cooldown = fixed(5.0);
            w.stamina = fixed(0.1);
        }
        let mut packs = PackSim::new();
        let pack_id = packs.form_pack(&wolf_sim, ids);
        let mut rng = Rng::new(1);
        let mut log = DiagnosticLog::new();
        packs.update(
            constants::plan_reevaluate_period(),
            &mut wolf_sim,
            &world,
            FixedVec2::new(fixed(50.0), fixed(50.0)),
            0,
            &mut rng,
            &mut log,
        );
        assert_eq!(packs.get(pack_id).unwrap().plan, PackPlan::Pincer);
    }
}
