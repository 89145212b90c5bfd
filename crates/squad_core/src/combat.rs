//! Attack resolution: hit, defense, location, armor, wounds and bleeding.
//!
//! The roll math lives in pure functions so it can be tested and shown in
//! a UI without a session. [`Simulation::resolve_attack`] strings them
//! together and draws from the session's random source in a fixed order:
//!
//! 1. percentile attack roll
//! 2. percentile defense roll (only if the defender may defend)
//! 3. hit location, `dice(1, total_weight)`
//! 4. weapon damage dice
//!
//! Each step emits its event before the next one runs.

use std::f64::consts::FRAC_PI_2;

use tracing::trace;

use crate::components::{
    Armor, AttackType, BodyLocation, DefensiveStance, EntityId, MoraleStatus, Position, Weapon,
    WoundEffect, WoundSeverity, WoundState,
};
use crate::config::RulesConfig;
use crate::events::GameEventKind;
use crate::geometry::MIN_SEGMENT_LENGTH;
use crate::math::{angle_between, facing_towards, Vec2};
use crate::movement::{attack_arc, AttackArc};
use crate::pathfinding::position_along_path;
use crate::simulation::Simulation;
use crate::world::Entity;

/// What set an attack off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOrigin {
    /// A queued attack order. Pays the weapon's AP cost.
    Command,
    /// Reaction fire. Paid for when overwatch was set.
    Overwatch,
}

/// Reach of `weapon`. Unarmed units and short melee weapons still reach
/// the melee attack range.
#[must_use]
pub fn attack_reach(weapon: Option<&Weapon>, config: &RulesConfig) -> f64 {
    match weapon {
        Some(w) if w.is_ranged() => w.range,
        Some(w) => w.range.max(config.melee_attack_range),
        None => config.melee_attack_range,
    }
}

/// Inputs to the hit target number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitContext {
    /// Attacker skill for the weapon class.
    pub skill: i32,
    /// Summed wound skill penalties.
    pub wound_penalty: i32,
    /// Attacker morale.
    pub morale: MoraleStatus,
    /// Side of the defender struck from.
    pub arc: AttackArc,
    /// Aim stacks held.
    pub aim_stacks: u32,
    /// Distance to the defender.
    pub distance: f64,
    /// Weapon range if the attack is ranged.
    pub ranged_range: Option<f64>,
    /// Reaction fire.
    pub overwatch: bool,
}

/// Percent chance to hit, clamped to the configured floor and ceiling.
#[must_use]
pub fn hit_chance(ctx: &HitContext, config: &RulesConfig) -> i32 {
    let arc_bonus = match ctx.arc {
        AttackArc::Front => 0,
        AttackArc::Side => config.side_arc_bonus,
        AttackArc::Rear => config.rear_arc_bonus,
    };
    let stacks = ctx.aim_stacks.min(config.max_aim_stacks);
    let aim_bonus = config.aim_bonus * i32::try_from(stacks).unwrap_or(0);
    let range_penalty = ctx.ranged_range.map_or(0, |range| {
        let excess = (ctx.distance - range / 2.0).max(0.0).floor();
        let units = excess.min(f64::from(i32::MAX)) as i32;
        units.saturating_mul(config.range_penalty_per_unit)
    });
    let reaction = if ctx.overwatch {
        config.overwatch_penalty
    } else {
        0
    };

    (ctx.skill - ctx.wound_penalty - ctx.morale.skill_penalty() + arc_bonus + aim_bonus
        - range_penalty
        - reaction)
        .clamp(config.min_hit_chance, config.max_hit_chance)
}

/// True if a defender in `stance` may roll against this attack.
#[must_use]
pub fn can_defend(
    stance: DefensiveStance,
    defender_morale: MoraleStatus,
    arc: AttackArc,
    attack_type: AttackType,
    defender_weapon: Option<&Weapon>,
) -> bool {
    if defender_morale == MoraleStatus::Routed || arc == AttackArc::Rear {
        return false;
    }
    match stance {
        DefensiveStance::Parry => {
            attack_type == AttackType::Melee
                && defender_weapon.is_some_and(|w| w.attack_type() == AttackType::Melee)
        }
        DefensiveStance::Block | DefensiveStance::Dodge => true,
    }
}

/// Percent chance that the defender stops a connecting blow.
#[must_use]
pub fn defense_chance(defender: &Entity, stance: DefensiveStance, config: &RulesConfig) -> i32 {
    let skill = defender.skills.unwrap_or_default().defense(stance);
    let wounds = defender
        .wound_effects
        .as_ref()
        .map_or(0, |w| w.skill_penalty());
    let morale = defender
        .morale
        .as_ref()
        .map_or(0, |m| m.status.skill_penalty());
    (skill - wounds - morale).clamp(config.min_defense_chance, config.max_defense_chance)
}

/// Hit-location weights in table order.
#[must_use]
pub fn location_weights(
    armor: Option<&Armor>,
    aimed: Option<BodyLocation>,
    config: &RulesConfig,
) -> [(BodyLocation, u32); 4] {
    BodyLocation::ALL.map(|location| {
        let mut weight = location.base_hit_weight();
        if aimed == Some(location) {
            weight += config.aimed_location_weight;
        }
        if armor.map_or(0, |a| a.at(location)) <= 0 {
            weight += config.unarmored_location_weight;
        }
        (location, weight)
    })
}

/// Location for a roll in `[1, total weight]`.
#[must_use]
pub fn pick_location(weights: &[(BodyLocation, u32); 4], roll: u32) -> BodyLocation {
    let mut remaining = roll;
    for &(location, weight) in weights {
        if remaining <= weight {
            return location;
        }
        remaining -= weight;
    }
    BodyLocation::Legs
}

/// `(armor that counted, damage taken)` for a blow of `raw` points.
#[must_use]
pub fn mitigated_damage(raw: i32, armor: i32, piercing: i32, config: &RulesConfig) -> (i32, i32) {
    let effective = (armor - piercing).max(0);
    (effective, (raw - effective).max(config.min_damage))
}

/// True if `watcher`'s overwatch covers `point`: inside weapon reach and,
/// when a direction or arc was given, inside the arc. A missing direction
/// means the watcher's facing; a missing arc means a quarter turn.
#[must_use]
pub fn overwatch_covers(watcher: &Entity, point: Vec2, config: &RulesConfig) -> bool {
    let (Some(watch), Some(position)) = (watcher.overwatch, watcher.position) else {
        return false;
    };
    if position.value.distance(point) > attack_reach(watcher.weapon.as_ref(), config) + 1e-9 {
        return false;
    }
    if watch.direction.is_none() && watch.arc.is_none() {
        return true;
    }
    let Some(bearing) = facing_towards(position.value, point) else {
        return true;
    };
    let centre = watch.direction.unwrap_or(position.facing);
    let arc = watch.arc.unwrap_or(FRAC_PI_2);
    angle_between(centre, bearing) <= arc / 2.0 + 1e-9
}

/// Distance along `path` at which `watcher` first covers the mover, or
/// `None` if no point of the route enters its watch. Each leg is sampled
/// at points no more than `approach_step` apart, waypoints included.
#[must_use]
pub fn first_covered_along(watcher: &Entity, path: &[Vec2], config: &RulesConfig) -> Option<f64> {
    let &start = path.first()?;
    if overwatch_covers(watcher, start, config) {
        return Some(0.0);
    }
    let step = config.approach_step.max(MIN_SEGMENT_LENGTH);
    let mut walked = 0.0;
    for leg in path.windows(2) {
        let length = leg[0].distance(leg[1]);
        let samples = (length / step).ceil().clamp(1.0, f64::from(u32::MAX)) as u32;
        for i in 1..=samples {
            let t = f64::from(i) / f64::from(samples);
            if overwatch_covers(watcher, leg[0].lerp(leg[1], t), config) {
                return Some(walked + length * t);
            }
        }
        walked += length;
    }
    None
}

impl Simulation {
    /// Run one attack through the whole pipeline. Invalid attacks (dead
    /// parties, no weapon, broken morale, crippled arms, no AP) do nothing.
    pub(crate) fn resolve_attack(
        &mut self,
        attacker: EntityId,
        target: EntityId,
        aimed_location: Option<BodyLocation>,
        origin: AttackOrigin,
    ) {
        let Some(striker) = self.entities.get(attacker).filter(|e| e.is_alive_unit()) else {
            return;
        };
        let Some(defender) = self.entities.get(target).filter(|e| e.is_alive_unit()) else {
            trace!(attacker, target, "attack skipped: target down or gone");
            return;
        };
        let (Some(weapon), Some(from), Some(to)) =
            (striker.weapon.clone(), striker.position, defender.position)
        else {
            return;
        };
        let morale = striker.morale.as_ref().map_or(MoraleStatus::Steady, |m| m.status);
        if matches!(morale, MoraleStatus::Broken | MoraleStatus::Routed) {
            trace!(attacker, %morale, "attack skipped: morale");
            return;
        }
        if weapon.two_handed
            && striker
                .wound_effects
                .as_ref()
                .is_some_and(|w| w.disables_two_handed())
        {
            trace!(attacker, weapon = %weapon.name, "attack skipped: arms too badly hurt");
            return;
        }
        let attack_type = weapon.attack_type();
        let ammo = striker.ammo.clone().filter(|_| attack_type == AttackType::Ranged);
        if ammo.as_ref().is_some_and(|a| !a.has_round()) {
            self.emit(Some(attacker), Some(target), GameEventKind::OutOfAmmo);
            return;
        }
        if origin == AttackOrigin::Command && !self.spend_ap(attacker, weapon.ap_cost) {
            trace!(attacker, cost = weapon.ap_cost, "attack skipped: not enough AP");
            return;
        }

        self.emit(
            Some(attacker),
            Some(target),
            GameEventKind::AttackDeclared {
                weapon: weapon.name.clone(),
                attack_type,
                overwatch: origin == AttackOrigin::Overwatch,
            },
        );

        let distance = from.value.distance(to.value);
        let reach = attack_reach(Some(&weapon), &self.config);
        if distance > reach + 1e-9 {
            self.emit(
                Some(attacker),
                Some(target),
                GameEventKind::AttackOutOfRange {
                    distance,
                    range: reach,
                },
            );
            return;
        }

        let (mut piercing, mut damage_bonus) = (0, 0);
        if let Some(loaded) = ammo.and_then(|a| a.spent_one()) {
            let (ammo_type, remaining) = match loaded.current() {
                Some(slot) => {
                    piercing = slot.armor_piercing;
                    damage_bonus = slot.damage_bonus;
                    (slot.ammo_type.clone(), slot.quantity)
                }
                None => (String::new(), 0),
            };
            if let Some(entity) = self.entities.get_mut(attacker) {
                entity.ammo = Some(loaded);
            }
            self.emit(
                Some(attacker),
                Some(target),
                GameEventKind::AmmoSpent {
                    ammo_type,
                    remaining,
                },
            );
        }

        // aim is used up by the attack whether or not it connects
        let aim = self
            .entities
            .get_mut(attacker)
            .and_then(|e| e.aim.take())
            .unwrap_or_default();
        let aimed = aimed_location.or(aim.location);
        let arc = attack_arc(to.value, to.facing, from.value);
        let ctx = HitContext {
            skill: self
                .entities
                .get(attacker)
                .map_or(0, |e| e.skills.unwrap_or_default().attack(attack_type)),
            wound_penalty: self
                .entities
                .get(attacker)
                .and_then(|e| e.wound_effects.as_ref())
                .map_or(0, |w| w.skill_penalty()),
            morale,
            arc,
            aim_stacks: aim.stacks,
            distance,
            ranged_range: weapon.is_ranged().then_some(weapon.range),
            overwatch: origin == AttackOrigin::Overwatch,
        };
        let target_number = hit_chance(&ctx, &self.config);
        let roll = self.rng.percentile();
        let hit = i64::from(roll) <= i64::from(target_number);
        self.emit(
            Some(attacker),
            Some(target),
            GameEventKind::AttackRolled {
                roll,
                target_number,
                arc,
                hit,
            },
        );
        if !hit {
            return;
        }

        if self.defends(target, arc, attack_type, attacker) {
            return;
        }

        let Some(defender) = self.entities.get(target) else {
            return;
        };
        let armor = defender.armor.unwrap_or_default();
        let weights = location_weights(Some(&armor), aimed, &self.config);
        let total: u32 = weights.iter().map(|(_, w)| w).sum();
        let location_roll = u32::try_from(self.rng.dice(1, total, 0)).unwrap_or(1);
        let location = pick_location(&weights, location_roll);
        self.emit(
            Some(attacker),
            Some(target),
            GameEventKind::HitLocationRolled { location, aimed },
        );

        let formula = weapon.damage;
        let raw = self.rng.dice(formula.dice, formula.sides, formula.bonus) + damage_bonus;
        let (effective_armor, damage) =
            mitigated_damage(raw, armor.at(location), piercing, &self.config);
        let wound = (damage >= self.config.wound_effect_threshold && effective_armor < damage)
            .then(|| WoundEffect::for_hit(location, WoundSeverity::from_damage(damage)));
        self.apply_damage(
            target,
            Some(attacker),
            damage,
            |remaining| GameEventKind::DamageDealt {
                location,
                raw,
                armor: effective_armor,
                damage,
                remaining,
            },
            wound,
        );
    }

    /// Roll the defender's stance against a connecting blow. True if the
    /// blow is stopped.
    fn defends(
        &mut self,
        defender: EntityId,
        arc: AttackArc,
        attack_type: AttackType,
        attacker: EntityId,
    ) -> bool {
        let Some(entity) = self.entities.get(defender) else {
            return false;
        };
        let Some(stance) = entity.defensive_stance else {
            return false;
        };
        let morale = entity.morale.as_ref().map_or(MoraleStatus::Steady, |m| m.status);
        if !can_defend(stance, morale, arc, attack_type, entity.weapon.as_ref()) {
            return false;
        }
        let target_number = defense_chance(entity, stance, &self.config);
        let roll = self.rng.percentile();
        let success = i64::from(roll) <= i64::from(target_number);
        self.emit(
            Some(defender),
            Some(attacker),
            GameEventKind::DefenseRolled {
                stance,
                roll,
                target_number,
                success,
            },
        );
        success
    }

    /// Take `damage` off `unit`, log it with `event`, record `wound`, then
    /// emit the wound-state consequences.
    fn apply_damage<E>(
        &mut self,
        unit: EntityId,
        source: Option<EntityId>,
        damage: i32,
        event: E,
        wound: Option<WoundEffect>,
    ) where
        E: FnOnce(i32) -> GameEventKind,
    {
        let Some(entity) = self.entities.get_mut(unit) else {
            return;
        };
        let Some(before) = entity.health else {
            return;
        };
        let after = before.damaged(damage);
        entity.health = Some(after);
        let (actor, target) = match source {
            Some(attacker) => (Some(attacker), Some(unit)),
            None => (Some(unit), None),
        };
        self.emit(actor, target, event(after.current()));

        if let Some(effect) = wound {
            if let Some(entity) = self.entities.get_mut(unit) {
                let effects = entity.wound_effects.clone().unwrap_or_default();
                entity.wound_effects = Some(effects.with_effect(effect.clone()));
            }
            self.emit(
                Some(unit),
                source,
                GameEventKind::WoundEffectApplied { effect },
            );
        }

        self.wound_consequences(unit, before.wound_state(), after.wound_state());
    }

    /// `UnitDown` plus nearby allies' morale, or `UnitWounded` plus the
    /// unit's own morale when its state got worse.
    fn wound_consequences(&mut self, unit: EntityId, before: WoundState, after: WoundState) {
        if after == WoundState::Down {
            if let Some(entity) = self.entities.get_mut(unit) {
                entity.defensive_stance = None;
                entity.overwatch = None;
                entity.aim = None;
            }
            self.emit(Some(unit), None, GameEventKind::UnitDown);
            let modifier = self.config.ally_down_morale_modifier;
            for ally in self.allies_near(unit, self.config.morale_radius) {
                self.check_morale(ally, "ally_down", modifier);
            }
        } else if after > before {
            self.emit(
                Some(unit),
                None,
                GameEventKind::UnitWounded { wound_state: after },
            );
            let modifier = self.config.wounded_morale_modifier;
            self.check_morale(unit, "wounded", modifier);
        }
    }

    /// Live allies of `unit` within `radius`, ascending id.
    pub(crate) fn allies_near(&self, unit: EntityId, radius: f64) -> Vec<EntityId> {
        let Some(entity) = self.entities.get(unit) else {
            return Vec::new();
        };
        let (Some(faction), Some(position)) = (entity.faction, entity.position) else {
            return Vec::new();
        };
        self.entities
            .iter()
            .filter(|(&id, other)| {
                id != unit
                    && other.is_alive_unit()
                    && other.faction == Some(faction)
                    && other
                        .position
                        .is_some_and(|p| p.value.distance(position.value) <= radius)
            })
            .map(|(&id, _)| id)
            .collect()
    }

    /// Every live bleeding unit loses its summed bleed.
    pub(crate) fn apply_bleeding(&mut self) {
        for unit in self.entities.live_unit_ids() {
            let bleed = self
                .entities
                .get(unit)
                .and_then(|e| e.wound_effects.as_ref())
                .map_or(0, |w| w.bleed_per_turn());
            if bleed <= 0 {
                continue;
            }
            self.apply_damage(
                unit,
                None,
                bleed,
                |remaining| GameEventKind::BleedDamage {
                    amount: bleed,
                    remaining,
                },
                None,
            );
        }
    }

    /// Hostile watchers fire at `mover` as it travels `path`, each at most
    /// once per turn, in the order the route enters their watch. Each shot
    /// is taken with the mover where that watcher first saw it.
    pub(crate) fn trigger_overwatch(&mut self, mover: EntityId, path: &[Vec2]) {
        let Some(entity) = self.entities.get(mover).filter(|e| e.is_alive_unit()) else {
            return;
        };
        let (Some(faction), Some(settled)) = (entity.faction, entity.position) else {
            return;
        };
        let route = if path.is_empty() {
            vec![settled.value]
        } else {
            path.to_vec()
        };
        let mut watchers: Vec<(f64, EntityId)> = self
            .entities
            .iter()
            .filter(|(_, w)| {
                w.is_alive_unit()
                    && w.faction.is_some_and(|f| f.is_hostile_to(faction))
                    && w.overwatch.is_some_and(|o| !o.triggered)
                    && w.morale.as_ref().map_or(true, |m| {
                        !matches!(m.status, MoraleStatus::Broken | MoraleStatus::Routed)
                    })
            })
            .filter_map(|(&id, w)| Some((first_covered_along(w, &route, &self.config)?, id)))
            .collect();
        watchers.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (along, watcher) in watchers {
            if !self.entities.get(mover).is_some_and(Entity::is_alive_unit) {
                break;
            }
            let watch = self
                .entities
                .get_mut(watcher)
                .and_then(|w| w.overwatch.as_mut());
            if let Some(overwatch) = watch {
                overwatch.triggered = true;
                overwatch.reserved_ap = 0;
            }
            self.emit(Some(watcher), Some(mover), GameEventKind::OverwatchTriggered);

            let seen_at = position_along_path(&route, along).unwrap_or(settled.value);
            self.place(mover, settled.moved_to(seen_at));
            self.resolve_attack(watcher, mover, None, AttackOrigin::Overwatch);
            self.place(mover, settled);
        }
    }

    fn place(&mut self, unit: EntityId, position: Position) {
        if let Some(entity) = self.entities.get_mut(unit) {
            entity.position = Some(position);
        }
    }
}
