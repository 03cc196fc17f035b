//! Per-wolf AI: a twelve-state FSM driving movement, attack selection, and
//! damage handling.
//!
//! Emotion is not a stored accumulator -- every tick recomputes it from the
//! wolf's current hp/morale/memory and derives `speed`/`aggression`/
//! `attack_range`/`detection_range` fresh from the wolf's `base_*` values
//! and the winning emotion's modifier row. Storing and decaying emotion
//! across ticks would make a wolf's reaction depend on its own history
//! instead of its current situation, and would let additive modifiers
//! (aggression) compound tick over tick.

use serde::{Deserialize, Serialize};

use duskfang_diagnostics::{Counter, DiagnosticLog, GameEvent};
use duskfang_foundation::fixed::{fixed, Fixed, FixedVec2};
use duskfang_foundation::ids::IdAllocator;
use duskfang_foundation::rng::Rng;

use crate::constants;
use crate::physics::{layer, BodyKind, PhysicsWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WolfFsmState {
    Idle,
    Patrol,
    Alert,
    Approach,
    CircleStrafe,
    AttackWindup,
    AttackActive,
    AttackRecovery,
    Retreat,
    Fearful,
    Desperate,
    Dead,
}

impl WolfFsmState {
    fn name(self) -> &'static str {
        match self {
            WolfFsmState::Idle => "idle",
            WolfFsmState::Patrol => "patrol",
            WolfFsmState::Alert => "alert",
            WolfFsmState::Approach => "approach",
            WolfFsmState::CircleStrafe => "circle_strafe",
            WolfFsmState::AttackWindup => "attack_windup",
            WolfFsmState::AttackActive => "attack_active",
            WolfFsmState::AttackRecovery => "attack_recovery",
            WolfFsmState::Retreat => "retreat",
            WolfFsmState::Fearful => "fearful",
            WolfFsmState::Desperate => "desperate",
            WolfFsmState::Dead => "dead",
        }
    }
}

/// Spawn-time archetype. Drives only stat spread at spawn today; the FSM
/// above is shared by every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WolfKind {
    Normal,
    Alpha,
    Scout,
    Hunter,
    Omega,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Emotion {
    Neutral,
    Fearful,
    Confident,
    Frustrated,
    Desperate,
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackType {
    QuickJab,
    Feint,
    PowerLunge,
    StandardLunge,
}

/// Per-emotion multipliers/offsets applied to a wolf's `base_*` stats.
/// `aggression_add` is the lone additive term; everything else multiplies.
struct EmotionMods {
    detection: Fixed,
    attack_range: Fixed,
    attack_cooldown: Fixed,
    aggression_add: Fixed,
    damage: Fixed,
    speed: Fixed,
}

impl EmotionMods {
    const IDENTITY: EmotionMods = EmotionMods {
        detection: Fixed::ONE,
        attack_range: Fixed::ONE,
        attack_cooldown: Fixed::ONE,
        aggression_add: Fixed::ZERO,
        damage: Fixed::ONE,
        speed: Fixed::ONE,
    };
}

fn emotion_mods(emotion: Emotion) -> EmotionMods {
    match emotion {
        Emotion::Neutral => EmotionMods::IDENTITY,
        Emotion::Fearful => EmotionMods {
            detection: fixed(1.3),
            attack_range: fixed(0.7),
            speed: fixed(0.9),
            ..EmotionMods::IDENTITY
        },
        Emotion::Confident => EmotionMods {
            speed: fixed(1.1),
            attack_cooldown: fixed(0.8),
            ..EmotionMods::IDENTITY
        },
        Emotion::Frustrated => EmotionMods {
            aggression_add: fixed(0.2),
            damage: fixed(1.1),
            ..EmotionMods::IDENTITY
        },
        Emotion::Desperate => EmotionMods {
            damage: fixed(1.3),
            speed: fixed(1.15),
            ..EmotionMods::IDENTITY
        },
        Emotion::Aggressive => EmotionMods {
            attack_range: fixed(1.2),
            speed: fixed(1.05),
            ..EmotionMods::IDENTITY
        },
    }
}

/// A wolf attack that connected and needs resolving against the player's
/// `CombatState` by the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct PendingAttack {
    pub wolf_id: u32,
    pub attack_type: AttackType,
    pub damage: Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wolf {
    pub id: u32,
    pub body_id: u32,
    pub kind: WolfKind,
    pub state: WolfFsmState,
    pub state_timer: Fixed,
    pub hp: Fixed,
    pub max_hp: Fixed,
    pub stamina: Fixed,

    pub base_speed: Fixed,
    pub base_aggression: Fixed,
    pub base_attack_range: Fixed,
    pub base_detection_range: Fixed,
    pub base_damage: Fixed,

    pub speed: Fixed,
    pub aggression: Fixed,
    pub attack_range: Fixed,
    pub detection_range: Fixed,
    pub damage: Fixed,

    pub intelligence: Fixed,
    pub morale: Fixed,
    pub facing: FixedVec2,
    pub attack_cooldown: Fixed,
    pub collision_cooldown: Fixed,
    pub last_attack_type: Option<AttackType>,
    pub last_seen_player_pos: Option<FixedVec2>,

    pub player_speed_estimate: Fixed,
    pub last_block_time: Fixed,
    pub last_roll_time: Fixed,
    pub blocks_seen: u32,
    pub successful: u32,
    pub failed: u32,

    pub emotion: Emotion,
    pub previous_emotion: Emotion,
    pub pack_command_received: bool,
    pub health_at_state_enter: Fixed,
    pub preferred_attack_angle: Fixed,
    pub decision_timer: Fixed,
    pub damage_interrupted: bool,
    pub move_target_override: Option<FixedVec2>,
}

impl Wolf {
    pub fn is_alive(&self) -> bool {
        self.state != WolfFsmState::Dead
    }

    pub fn hp_ratio(&self) -> Fixed {
        if self.max_hp.is_zero() {
            Fixed::ZERO
        } else {
            self.hp / self.max_hp
        }
    }

    pub fn success_rate(&self) -> Fixed {
        let total = self.successful + self.failed;
        if total == 0 {
            Fixed::ZERO
        } else {
            fixed(self.successful as f32) / fixed(total as f32)
        }
    }

    fn set_state(&mut self, next: WolfFsmState, tick: u64, log: &mut DiagnosticLog) {
        if next == self.state {
            return;
        }
        log.record(GameEvent::WolfStateChange {
            tick,
            wolf_id: self.id,
            from: self.state.name(),
            to: next.name(),
        });
        self.state = next;
        self.state_timer = Fixed::ZERO;
        self.health_at_state_enter = self.hp;
    }

    /// A fresh, per-tick emotional read of the wolf's situation.
    fn recompute_emotion(&self, distance: Fixed) -> Emotion {
        let hp_ratio = self.hp_ratio();
        let success_rate = self.success_rate();
        if hp_ratio < constants::desperate_hp_ratio() {
            Emotion::Desperate
        } else if hp_ratio < constants::fearful_hp_ratio() {
            Emotion::Fearful
        } else if success_rate > fixed(0.7) && self.morale > fixed(0.7) {
            Emotion::Confident
        } else if self.failed > 5 && success_rate < fixed(0.3) {
            Emotion::Frustrated
        } else if self.base_aggression > constants::bruiser_aggression_threshold()
            && distance < self.base_attack_range * fixed(1.5)
        {
            Emotion::Aggressive
        } else {
            Emotion::Neutral
        }
    }

    /// Re-derive `speed`/`aggression`/`attack_range`/`detection_range` from
    /// `base_*` and the current emotion's row, then remember the emotion
    /// for next tick's change detection.
    fn apply_emotion(&mut self, emotion: Emotion) {
        let mods = emotion_mods(emotion);
        self.speed = self.base_speed * mods.speed;
        self.aggression = self.base_aggression + mods.aggression_add;
        self.attack_range = self.base_attack_range * mods.attack_range;
        self.detection_range = self.base_detection_range * mods.detection;
        self.previous_emotion = self.emotion;
        self.emotion = emotion;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WolfSim {
    ids: IdAllocator,
    wolves: Vec<Wolf>,
}

impl Default for WolfSim {
    fn default() -> Self {
        Self::new()
    }
}

impl WolfSim {
    pub fn new() -> Self {
        WolfSim {
            ids: IdAllocator::new(),
            wolves: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.ids.reset();
        self.wolves.clear();
    }

    pub fn spawn_wolf(&mut self, world: &mut PhysicsWorld, position: FixedVec2, max_hp: Fixed) -> u32 {
        let id = self.ids.allocate();
        let body_id = world.create_body(BodyKind::Dynamic, position, Fixed::ONE, constants::wolf_radius());
        {
            let body = world.get_body_mut(body_id).unwrap();
            body.layer = layer::ENEMY;
            body.mask = layer::ENEMY | layer::ENVIRONMENT | layer::PLAYER;
        }
        let base_speed = constants::base_wolf_speed();
        let base_aggression = fixed(0.5);
        let base_attack_range = constants::separation_distance() * fixed(1.5);
        let base_detection_range = base_attack_range * fixed(4.0);
        let base_damage = fixed(8.0);
        self.wolves.push(Wolf {
            id,
            body_id,
            kind: WolfKind::Normal,
            state: WolfFsmState::Idle,
            state_timer: Fixed::ZERO,
            hp: max_hp,
            max_hp,
            stamina: Fixed::ONE,
            base_speed,
            base_aggression,
            base_attack_range,
            base_detection_range,
            base_damage,
            speed: base_speed,
            aggression: base_aggression,
            attack_range: base_attack_range,
            detection_range: base_detection_range,
            damage: base_damage,
            intelligence: fixed(0.5),
            morale: Fixed::ONE,
            facing: FixedVec2::new(Fixed::ZERO, Fixed::ONE),
            attack_cooldown: Fixed::ZERO,
            collision_cooldown: Fixed::ZERO,
            last_attack_type: None,
            last_seen_player_pos: None,
            player_speed_estimate: Fixed::ZERO,
            last_block_time: fixed(999.0),
            last_roll_time: fixed(999.0),
            blocks_seen: 0,
            successful: 0,
            failed: 0,
            emotion: Emotion::Neutral,
            previous_emotion: Emotion::Neutral,
            pack_command_received: false,
            health_at_state_enter: max_hp,
            preferred_attack_angle: fixed((id % 8) as f32),
            decision_timer: Fixed::ZERO,
            damage_interrupted: false,
            move_target_override: None,
        });
        id
    }

    pub fn destroy_wolf(&mut self, world: &mut PhysicsWorld, id: u32) {
        if !self.ids.destroy(id) {
            return;
        }
        if let Some(w) = self.wolves.iter().find(|w| w.id == id) {
            world.destroy_body(w.body_id);
        }
        self.wolves.retain(|w| w.id != id);
    }

    pub fn is_alive(&self, id: u32) -> bool {
        self.ids.is_alive(id)
    }

    pub fn get(&self, id: u32) -> Option<&Wolf> {
        self.wolves.iter().find(|w| w.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Wolf> {
        self.wolves.iter_mut().find(|w| w.id == id)
    }

    pub fn wolves(&self) -> impl Iterator<Item = &Wolf> {
        self.wolves.iter()
    }

    pub fn len(&self) -> usize {
        self.wolves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wolves.is_empty()
    }

    /// Force a wolf directly into `state`, as a pack plan's command rather
    /// than the wolf's own FSM transition.
    pub fn force_state(&mut self, id: u32, state: WolfFsmState, tick: u64, log: &mut DiagnosticLog) {
        if let Some(w) = self.get_mut(id) {
            w.set_state(state, tick, log);
        }
    }

    pub fn grant_pack_command(&mut self, id: u32) {
        if let Some(w) = self.get_mut(id) {
            w.pack_command_received = true;
        }
    }

    pub fn set_move_target(&mut self, id: u32, target: FixedVec2) {
        if let Some(w) = self.get_mut(id) {
            w.move_target_override = Some(target);
        }
    }

    pub fn clear_move_target(&mut self, id: u32) {
        if let Some(w) = self.get_mut(id) {
            w.move_target_override = None;
        }
    }

    pub fn body_position(&self, world: &PhysicsWorld, id: u32) -> Option<FixedVec2> {
        let w = self.get(id)?;
        world.get_body(w.body_id).map(|b| b.position)
    }

    /// Notify the sim that a player attack was blocked or parried near a
    /// wolf: raises caution (via `last_block_time`) and feeds its
    /// intelligence/feint read of the player.
    pub fn notify_player_blocked(&mut self, wolf_id: u32) {
        if let Some(w) = self.get_mut(wolf_id) {
            w.last_block_time = Fixed::ZERO;
            w.blocks_seen += 1;
        }
    }

    /// Notify the sim that the player rolled out of a wolf's attack.
    pub fn notify_player_rolled(&mut self, wolf_id: u32) {
        if let Some(w) = self.get_mut(wolf_id) {
            w.last_roll_time = Fixed::ZERO;
        }
    }

    /// Record whether a wolf's own attack landed, feeding Confident/
    /// Frustrated emotion triggers.
    pub fn record_attack_outcome(&mut self, wolf_id: u32, landed: bool) {
        if let Some(w) = self.get_mut(wolf_id) {
            if landed {
                w.successful += 1;
            } else {
                w.failed += 1;
            }
        }
    }

    /// Apply damage to a wolf: decrements hp, kicks it with `knockback*0.3`,
    /// knocks morale down, and forces a 0.5s Recover if it was mid-attack.
    /// Kills and frees the body at hp 0. Returns `true` if the wolf died.
    pub fn damage_wolf(
        &mut self,
        world: &mut PhysicsWorld,
        id: u32,
        amount: Fixed,
        knockback: FixedVec2,
        tick: u64,
        log: &mut DiagnosticLog,
    ) -> bool {
        let Some(index) = self.wolves.iter().position(|w| w.id == id) else {
            log.bump(Counter::InvalidIdAccess);
            log.record(GameEvent::InvalidIdReferenced { tick, kind: "wolf", id });
            return false;
        };

        let body_id = self.wolves[index].body_id;
        let was_attacking = matches!(
            self.wolves[index].state,
            WolfFsmState::AttackWindup | WolfFsmState::AttackActive | WolfFsmState::AttackRecovery
        );

        self.wolves[index].hp = (self.wolves[index].hp - amount).max(Fixed::ZERO);
        self.wolves[index].morale = (self.wolves[index].morale - fixed(0.05)).max(Fixed::ZERO);
        world.apply_impulse(body_id, knockback.scale(fixed(0.3)));

        if was_attacking {
            self.wolves[index].damage_interrupted = true;
            self.wolves[index].set_state(WolfFsmState::AttackRecovery, tick, log);
        }

        if self.wolves[index].hp.is_zero() && self.wolves[index].is_alive() {
            self.wolves[index].set_state(WolfFsmState::Dead, tick, log);
            log.record(GameEvent::WolfKilled { tick, wolf_id: id });
            world.destroy_body(body_id);
            return true;
        }
        false
    }

    /// AI decision pass: FSM transitions, attack gating, and movement-force
    /// application, run against positions as of the end of the previous
    /// physics step. Returns attacks that connected this tick for the
    /// coordinator to resolve against `CombatState::handle_incoming_attack`.
    #[allow(clippy::too_many_arguments)]
    pub fn update_ai(
        &mut self,
        dt: Fixed,
        world: &mut PhysicsWorld,
        player_pos: FixedVec2,
        player_velocity: FixedVec2,
        player_alive: bool,
        max_concurrent_attackers: u32,
        tick: u64,
        rng: &mut Rng,
        log: &mut DiagnosticLog,
    ) -> Vec<PendingAttack> {
        let mut attempted_attackers = 0u32;
        let mut pending = Vec::new();

        let ids: Vec<u32> = self.wolves.iter().map(|w| w.id).collect();
        for id in ids {
            let Some(index) = self.wolves.iter().position(|w| w.id == id) else {
                continue;
            };
            if !self.wolves[index].is_alive() {
                continue;
            }

            self.tick_timers(index, dt);

            let body_pos = world
                .get_body(self.wolves[index].body_id)
                .map(|b| b.position)
                .unwrap_or(player_pos);

            let to_player = player_pos - body_pos;
            let distance = to_player.length();
            let los_clear = player_alive && Self::los_clear_between(world, body_pos, player_pos);

            if player_alive && los_clear {
                self.wolves[index].last_seen_player_pos = Some(player_pos);
            }

            self.update_memory(index, player_velocity, dt);

            let emotion = self.wolves[index].recompute_emotion(distance);
            self.wolves[index].apply_emotion(emotion);

            self.transition(index, distance, los_clear, player_alive, tick, log);

            let wants_windup = matches!(self.wolves[index].state, WolfFsmState::AttackWindup)
                && self.wolves[index].state_timer.is_zero();
            let can_afford_attack = attempted_attackers < max_concurrent_attackers;

            if wants_windup && !can_afford_attack {
                log.bump(Counter::ThreatBudgetDeferrals);
                self.wolves[index].set_state(WolfFsmState::CircleStrafe, tick, log);
            } else if matches!(
                self.wolves[index].state,
                WolfFsmState::AttackWindup | WolfFsmState::AttackActive | WolfFsmState::AttackRecovery
            ) {
                attempted_attackers += 1;
            }

            self.drive_movement(index, world, body_pos, to_player, distance, rng);

            if self.wolves[index].state == WolfFsmState::AttackActive
                && self.wolves[index].state_timer.is_zero()
            {
                if let Some(attack) = self.resolve_attack_gate(index, world, body_pos, to_player, distance, log) {
                    pending.push(attack);
                }
            }
        }

        pending
    }

    fn tick_timers(&mut self, index: usize, dt: Fixed) {
        let w = &mut self.wolves[index];
        w.last_block_time += dt;
        w.last_roll_time += dt;
        if w.collision_cooldown > Fixed::ZERO {
            w.collision_cooldown = w.collision_cooldown * constants::collision_cooldown_decay();
        }
        if w.attack_cooldown > Fixed::ZERO {
            w.attack_cooldown -= dt;
        }
        if w.last_block_time < constants::recent_block_or_roll_window()
            || w.last_roll_time < constants::recent_block_or_roll_window()
        {
            w.attack_cooldown = w.attack_cooldown.max(fixed(0.5));
        }
        w.state_timer += dt;
    }

    /// `player_speed_estimate ← 0.9·prev + 0.1·|player_velocity|`, gating
    /// intelligence creep on the estimate crossing 0.4.
    fn update_memory(&mut self, index: usize, player_velocity: FixedVec2, dt: Fixed) {
        let w = &mut self.wolves[index];
        w.player_speed_estimate =
            w.player_speed_estimate * constants::memory_speed_blend() + player_velocity.length() * fixed(0.1);
        if w.player_speed_estimate > fixed(0.4) {
            w.intelligence = (w.intelligence + constants::intelligence_creep_rate() * dt).min(constants::intelligence_cap());
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn transition(
        &mut self,
        index: usize,
        distance: Fixed,
        los_clear: bool,
        player_alive: bool,
        tick: u64,
        log: &mut DiagnosticLog,
    ) {
        let hp_ratio = self.wolves[index].hp_ratio();

        if !player_alive {
            self.wolves[index].set_state(WolfFsmState::Patrol, tick, log);
            return;
        }

        // Interrupt 1: critical hp always wins.
        if hp_ratio < constants::retreat_hp_ratio_unconditional() && self.wolves[index].state != WolfFsmState::Retreat
        {
            self.wolves[index].set_state(WolfFsmState::Retreat, tick, log);
            return;
        }
        if self.wolves[index].emotion == Emotion::Desperate {
            self.wolves[index].set_state(WolfFsmState::Desperate, tick, log);
        }
        if self.wolves[index].emotion == Emotion::Fearful
            && self.wolves[index].morale < constants::low_morale_retreat_interrupt_ratio()
            && hp_ratio <= constants::retreat_hp_ratio_with_low_morale()
        {
            self.wolves[index].set_state(WolfFsmState::Retreat, tick, log);
            return;
        }

        // Interrupt 2: a pack command always promotes straight to windup.
        if self.wolves[index].pack_command_received && self.wolves[index].attack_cooldown <= Fixed::ZERO {
            self.wolves[index].pack_command_received = false;
            self.wolves[index].set_state(WolfFsmState::AttackWindup, tick, log);
            return;
        }

        // Interrupt 3: sudden close proximity while patrolling snaps to strafe.
        if self.wolves[index].state == WolfFsmState::Patrol
            && distance < self.wolves[index].attack_range * fixed(0.7)
        {
            self.wolves[index].set_state(WolfFsmState::CircleStrafe, tick, log);
            return;
        }

        // Interrupt 4: enough damage taken mid-attack forces recovery.
        if matches!(
            self.wolves[index].state,
            WolfFsmState::AttackWindup | WolfFsmState::AttackActive
        ) && self.wolves[index].health_at_state_enter - self.wolves[index].hp
            >= constants::damage_interrupt_threshold()
        {
            self.wolves[index].set_state(WolfFsmState::AttackRecovery, tick, log);
            return;
        }

        match self.wolves[index].state {
            WolfFsmState::Dead => {}
            WolfFsmState::Idle | WolfFsmState::Patrol => {
                if los_clear && self.wolves[index].morale >= constants::patrol_alert_ratio() {
                    self.wolves[index].set_state(WolfFsmState::Alert, tick, log);
                } else if los_clear {
                    self.wolves[index].set_state(WolfFsmState::Approach, tick, log);
                }
            }
            WolfFsmState::Alert => {
                if !los_clear {
                    self.wolves[index].set_state(WolfFsmState::Patrol, tick, log);
                } else {
                    self.wolves[index].set_state(WolfFsmState::Approach, tick, log);
                }
            }
            WolfFsmState::Approach => {
                if !los_clear {
                    self.wolves[index].set_state(WolfFsmState::Alert, tick, log);
                } else if distance <= constants::approach_stop_ratio() * self.wolves[index].attack_range {
                    self.wolves[index].set_state(WolfFsmState::CircleStrafe, tick, log);
                }
            }
            WolfFsmState::CircleStrafe => {
                if distance > constants::separation_distance() * fixed(4.0) {
                    self.wolves[index].set_state(WolfFsmState::Approach, tick, log);
                } else if self.wolves[index].attack_cooldown <= Fixed::ZERO
                    && self.wolves[index].stamina > constants::wolf_attack_min_stamina()
                    && distance < self.wolves[index].attack_range
                    && self.wolves[index].state_timer > fixed(0.4)
                {
                    self.wolves[index].set_state(WolfFsmState::AttackWindup, tick, log);
                }
            }
            WolfFsmState::AttackWindup => {
                if self.wolves[index].state_timer >= constants::attack_windup() {
                    self.wolves[index].set_state(WolfFsmState::AttackActive, tick, log);
                }
            }
            WolfFsmState::AttackActive => {
                if self.wolves[index].state_timer >= constants::attack_active() {
                    self.wolves[index].set_state(WolfFsmState::AttackRecovery, tick, log);
                }
            }
            WolfFsmState::AttackRecovery => {
                let required = if self.wolves[index].damage_interrupted {
                    constants::damage_interrupt_recovery_duration()
                } else {
                    constants::attack_recovery()
                };
                if self.wolves[index].state_timer >= required {
                    let mods = emotion_mods(self.wolves[index].emotion);
                    self.wolves[index].attack_cooldown = constants::cautious_attack_cooldown_floor() * mods.attack_cooldown;
                    self.wolves[index].damage_interrupted = false;
                    self.wolves[index].set_state(WolfFsmState::CircleStrafe, tick, log);
                }
            }
            WolfFsmState::Retreat => {
                if hp_ratio > constants::fearful_hp_ratio() && self.wolves[index].morale >= constants::patrol_alert_ratio()
                {
                    self.wolves[index].set_state(WolfFsmState::Alert, tick, log);
                }
            }
            WolfFsmState::Fearful => {
                if hp_ratio > constants::fearful_hp_ratio() {
                    self.wolves[index].set_state(WolfFsmState::Alert, tick, log);
                }
            }
            WolfFsmState::Desperate => {
                if hp_ratio > constants::desperate_hp_ratio() {
                    self.wolves[index].set_state(WolfFsmState::CircleStrafe, tick, log);
                }
            }
        }
    }

    fn drive_movement(
        &mut self,
        index: usize,
        world: &mut PhysicsWorld,
        body_pos: FixedVec2,
        to_player: FixedVec2,
        distance: Fixed,
        rng: &mut Rng,
    ) {
        let wolf = &self.wolves[index];
        let body_id = wolf.body_id;
        let speed = wolf.speed;

        if let Some(target) = wolf.move_target_override {
            let to_target = target - body_pos;
            let d = to_target.length();
            if d > fixed(0.02) {
                world.apply_force(body_id, to_target.normalize().scale(speed * fixed(6.0)));
            }
            return;
        }

        let direction = match wolf.state {
            WolfFsmState::Approach | WolfFsmState::Desperate => {
                if wolf.collision_cooldown > Fixed::ZERO {
                    if let Some(body) = world.get_body_mut(body_id) {
                        body.velocity = body.velocity.scale(fixed(0.9));
                    }
                    FixedVec2::ZERO
                } else if distance.is_zero() {
                    FixedVec2::ZERO
                } else {
                    FixedVec2::new(to_player.x / distance, to_player.y / distance)
                }
            }
            WolfFsmState::CircleStrafe => {
                if distance.is_zero() {
                    FixedVec2::ZERO
                } else {
                    let parity = if wolf.id % 2 == 0 { Fixed::ONE } else { -Fixed::ONE };
                    let tangent = FixedVec2::new(to_player.x / distance, to_player.y / distance)
                        .perpendicular()
                        .scale(parity);
                    tangent.scale(constants::circle_strafe_speed_mult())
                }
            }
            WolfFsmState::Retreat | WolfFsmState::Fearful => {
                if distance.is_zero() {
                    FixedVec2::ZERO
                } else {
                    FixedVec2::new(-to_player.x / distance, -to_player.y / distance)
                }
            }
            WolfFsmState::Patrol => {
                let angle_seed = rng.next_float();
                FixedVec2::new(fixed(angle_seed - 0.5), fixed(0.5 - angle_seed)).normalize()
            }
            _ => FixedVec2::ZERO,
        };

        if !direction.length().is_zero() {
            world.apply_force(body_id, direction.scale(speed * fixed(6.0)));
        }
    }

    fn resolve_attack_gate(
        &mut self,
        index: usize,
        world: &PhysicsWorld,
        body_pos: FixedVec2,
        to_player: FixedVec2,
        distance: Fixed,
        log: &mut DiagnosticLog,
    ) -> Option<PendingAttack> {
        let wolf = &mut self.wolves[index];
        if distance.is_zero() {
            return None;
        }
        let to_player_dir = FixedVec2::new(to_player.x / distance, to_player.y / distance);
        let facing_cos = wolf.facing.dot(to_player_dir);
        if facing_cos < constants::attack_facing_cos_threshold() {
            log.bump(Counter::GatingAngleRejects);
            return None;
        }
        if !Self::los_clear_between(world, body_pos, body_pos + to_player) {
            log.bump(Counter::GatingLosRejects);
            return None;
        }

        let attack_type = if wolf.emotion == Emotion::Desperate {
            AttackType::QuickJab
        } else if wolf.intelligence > fixed(0.7) && wolf.blocks_seen > 2 {
            AttackType::Feint
        } else if (wolf.emotion == Emotion::Confident || wolf.emotion == Emotion::Aggressive)
            && wolf.aggression > constants::bruiser_aggression_threshold()
        {
            AttackType::PowerLunge
        } else {
            AttackType::StandardLunge
        };
        let base_damage = match attack_type {
            AttackType::QuickJab => fixed(6.0),
            AttackType::Feint => fixed(7.0),
            AttackType::PowerLunge => fixed(14.0),
            AttackType::StandardLunge => fixed(10.0),
        };
        let mods = emotion_mods(wolf.emotion);
        let damage = base_damage * (Fixed::ONE + wolf.aggression * fixed(0.5)) * mods.damage;
        wolf.last_attack_type = Some(attack_type);

        Some(PendingAttack {
            wolf_id: wolf.id,
            attack_type,
            damage,
        })
    }

    /// A ray from `from` to `to` is blocked if any static/environment body,
    /// or any other wolf, passes within `los_block_perp_distance` of the
    /// segment.
    fn los_clear_between(world: &PhysicsWorld, from: FixedVec2, to: FixedVec2) -> bool {
        let seg = to - from;
        let seg_len_sq = seg.length_sq();
        if seg_len_sq.is_zero() {
            return true;
        }
        for body in world.bodies() {
            if body.layer & layer::ENVIRONMENT == 0 {
                continue;
            }
            let rel = body.position - from;
            let t = (rel.dot(seg) / seg_len_sq).clamp(Fixed::ZERO, Fixed::ONE);
            let closest = FixedVec2::new(from.x + seg.x * t, from.y + seg.y * t);
            let perp = (body.position - closest).length();
            if perp < constants::los_block_perp_distance() {
                return false;
            }
        }
        true
    }

    /// The ring around `player_pos` split into 8 sectors; returns the angle
    /// (as a sector id, 0-7) of the first sector not already occupied by a
    /// pack-mate, defaulting to `wolf.preferred_attack_angle` if all eight
    /// are taken. Updates the wolf's stored preference when a free sector
    /// is found, so it keeps returning to the same spot while it holds.
    pub fn optimal_attack_angle(&mut self, world: &PhysicsWorld, id: u32, player_pos: FixedVec2) -> Fixed {
        let Some(self_index) = self.wolves.iter().position(|w| w.id == id) else {
            return Fixed::ZERO;
        };
        let dirs = sector_unit_vectors();
        let mut occupied = [false; 8];
        for (i, w) in self.wolves.iter().enumerate() {
            if i == self_index || !w.is_alive() {
                continue;
            }
            let Some(body) = world.get_body(w.body_id) else { continue };
            let rel = body.position - player_pos;
            if rel.length_sq().is_zero() {
                continue;
            }
            occupied[sector_of(rel, &dirs)] = true;
        }
        for (sector, taken) in occupied.iter().enumerate() {
            if !taken {
                self.wolves[self_index].preferred_attack_angle = fixed(sector as f32);
                return fixed(sector as f32);
            }
        }
        self.wolves[self_index].preferred_attack_angle
    }

    /// Post-physics pass: read back settled positions/velocities and apply
    /// spatial-awareness separation impulses (keeps wolves from stacking on
    /// the player or each other; they share the `ENEMY` layer/mask and
    /// don't otherwise collide with one another).
    pub fn apply_spatial_awareness(&mut self, world: &mut PhysicsWorld, dt: Fixed) {
        self.apply_separation(world, dt);
        for w in &mut self.wolves {
            if let Some(body) = world.get_body(w.body_id) {
                if body.velocity.length() > constants::velocity_facing_epsilon() {
                    w.facing = body.velocity.normalize();
                }
            }
        }
    }

    fn apply_separation(&mut self, world: &mut PhysicsWorld, dt: Fixed) {
        let n = self.wolves.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (id_i, id_j) = (self.wolves[i].body_id, self.wolves[j].body_id);
                let (Some(pi), Some(pj)) = (world.get_body(id_i).map(|b| b.position), world.get_body(id_j).map(|b| b.position)) else {
                    continue;
                };
                let delta = pj - pi;
                let dist = delta.length();
                if dist.is_zero() || dist >= constants::separation_distance() {
                    continue;
                }
                let ratio = (constants::separation_distance() - dist) / constants::separation_distance();
                let magnitude = ratio * ratio * constants::separation_strength();
                let dir = FixedVec2::new(delta.x / dist, delta.y / dist);
                let impulse = dir.scale(magnitude * dt * fixed(50.0));
                world.apply_impulse(id_i, impulse.scale(-Fixed::ONE));
                world.apply_impulse(id_j, impulse);
            }
        }
    }
}

fn sector_unit_vectors() -> [FixedVec2; 8] {
    let h = fixed(0.70710678);
    [
        FixedVec2::new(Fixed::ONE, Fixed::ZERO),
        FixedVec2::new(h, h),
        FixedVec2::new(Fixed::ZERO, Fixed::ONE),
        FixedVec2::new(-h, h),
        FixedVec2::new(-Fixed::ONE, Fixed::ZERO),
        FixedVec2::new(-h, -h),
        FixedVec2::new(Fixed::ZERO, -Fixed::ONE),
        FixedVec2::new(h, -h),
    ]
}

/// The index of the unit vector in `dirs` with the largest dot product
/// against `rel` -- the sector `rel` falls into.
fn sector_of(rel: FixedVec2, dirs: &[FixedVec2; 8]) -> usize {
    let dir = rel.normalize();
    let mut best = 0usize;
    let mut best_dot = dirs[0].dot(dir);
    for (i, d) in dirs.iter().enumerate().skip(1) {
        let dot = d.dot(dir);
        if dot > best_dot {
            best_dot = dot;
            best = i;
        }
    }
    best
}

/// Public so `pack.rs` can aim plan-execution movement targets (Pincer,
/// Ambush) at the same 8 canonical directions wolves use for attack-angle
/// arbitration.
pub(crate) fn sector_direction(sector: usize) -> FixedVec2 {
    sector_unit_vectors()[sector % 8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_creates_matching_physics_body() {
        let mut world = PhysicsWorld::new();
        let mut sim = WolfSim::new();
        let id = sim.spawn_wolf(&mut world, FixedVec2::new(fixed(0.6), fixed(0.6)), fixed(1.0));
        assert!(sim.is_alive(id));
        assert_eq!(world.bodies().count(), 1);
    }

    #[test]
    fn damage_to_zero_kills_and_frees_body() {
        let mut world = PhysicsWorld::new();
        let mut sim = WolfSim::new();
        let mut log = DiagnosticLog::new();
        let id = sim.spawn_wolf(&mut world, FixedVec2::new(fixed(0.6), fixed(0.6)), fixed(1.0));
        let died = sim.damage_wolf(&mut world, id, fixed(1.0), FixedVec2::ZERO, 0, &mut log);
        assert!(died);
        assert_eq!(world.bodies().count(), 0);
        assert!(!sim.get(id).unwrap().is_alive());
    }

    #[test]
    fn unknown_wolf_id_bumps_invalid_access_counter() {
        let mut world = PhysicsWorld::new();
        let mut sim = WolfSim::new();
        let mut log = DiagnosticLog::new();
        sim.damage_wolf(&mut world, 999, fixed(1.0), FixedVec2::ZERO, 0, &mut log);
        assert_eq!(log.count(Counter::InvalidIdAccess), 1);
    }

    #[test]
    fn damage_mid_attack_knocks_back_and_forces_recovery() {
        let mut world = PhysicsWorld::new();
        let mut sim = WolfSim::new();
        let mut log = DiagnosticLog::new();
        let id = sim.spawn_wolf(&mut world, FixedVec2::new(fixed(0.6), fixed(0.6)), fixed(1.0));
        sim.get_mut(id).unwrap().state = WolfFsmState::AttackActive;
        let morale_before = sim.get(id).unwrap().morale;
        sim.damage_wolf(&mut world, id, fixed(0.2), FixedVec2::new(fixed(1.0), Fixed::ZERO), 0, &mut log);
        let wolf = sim.get(id).unwrap();
        assert_eq!(wolf.state, WolfFsmState::AttackRecovery);
        assert!(wolf.damage_interrupted);
        assert!(wolf.morale < morale_before);
    }

    #[test]
    fn emotion_modifiers_never_compound_across_ticks() {
        let mut world = PhysicsWorld::new();
        let mut sim = WolfSim::new();
        let mut log = DiagnosticLog::new();
        let mut rng = Rng::new(1);
        let id = sim.spawn_wolf(&mut world, FixedVec2::new(fixed(0.6), fixed(0.6)), fixed(1.0));
        sim.get_mut(id).unwrap().hp = fixed(0.1); // Desperate every tick.
        for _ in 0..5 {
            sim.update_ai(
                fixed(1.0 / 60.0),
                &mut world,
                FixedVec2::new(fixed(0.5), fixed(0.5)),
                FixedVec2::ZERO,
                true,
                2,
                0,
                &mut rng,
                &mut log,
            );
        }
        let wolf = sim.get(id).unwrap();
        let expected_speed = wolf.base_speed * fixed(1.15);
        assert!((wolf.speed.to_f32() - expected_speed.to_f32()).abs() < 0.001);
    }

    #[test]
    fn idle_wolf_transitions_to_alert_when_player_visible() {
        let mut world = PhysicsWorld::new();
        let mut sim = WolfSim::new();
        let mut log = DiagnosticLog::new();
        let mut rng = Rng::new(1);
        let id = sim.spawn_wolf(&mut world, FixedVec2::new(fixed(0.6), fixed(0.6)), fixed(1.0));
        sim.get_mut(id).unwrap().morale = Fixed::ONE;
        sim.update_ai(
            fixed(1.0 / 60.0),
            &mut world,
            FixedVec2::new(fixed(0.5), fixed(0.5)),
            FixedVec2::ZERO,
            true,
            2,
            0,
            &mut rng,
            &mut log,
        );
        assert_ne!(sim.get(id).unwrap().state, WolfFsmState::Idle);
    }

    #[test]
    fn pack_command_interrupt_consumes_itself_into_windup() {
        let mut world = PhysicsWorld::new();
        let mut sim = WolfSim::new();
        let mut log = DiagnosticLog::new();
        let mut rng = Rng::new(1);
        let id = sim.spawn_wolf(&mut world, FixedVec2::new(fixed(0.5), fixed(0.55)), fixed(1.0));
        {
            let w = sim.get_mut(id).unwrap();
            w.state = WolfFsmState::CircleStrafe;
            w.pack_command_received = true;
            w.attack_cooldown = Fixed::ZERO;
        }
        sim.update_ai(
            fixed(1.0 / 60.0),
            &mut world,
            FixedVec2::new(fixed(0.5), fixed(0.5)),
            FixedVec2::ZERO,
            true,
            2,
            0,
            &mut rng,
            &mut log,
        );
        let wolf = sim.get(id).unwrap();
        assert_eq!(wolf.state, WolfFsmState::AttackWindup);
        assert!(!wolf.pack_command_received);
    }
}
