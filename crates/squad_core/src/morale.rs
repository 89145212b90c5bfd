//! Morale checks.
//!
//! A check is a percentile roll against a target built from the base
//! morale, the unit's standing modifiers, nearby friends and its wounds.
//! Failing worsens morale one step; passing while not steady recovers one.

use crate::components::{EntityId, MoraleStatus};
use crate::config::RulesConfig;
use crate::events::GameEventKind;
use crate::simulation::Simulation;
use crate::world::EntityStorage;

/// Target number for `unit`'s next morale check.
#[must_use]
pub fn morale_target_number(world: &EntityStorage, unit: EntityId, config: &RulesConfig) -> i32 {
    let Some(entity) = world.get(unit) else {
        return config.base_morale;
    };
    let modifiers = entity.morale.as_ref().map_or(0, |m| m.total_modifier());
    let wounds = entity
        .health
        .map_or(0, |h| h.wound_state().morale_penalty());
    let support = match (entity.faction, entity.position) {
        (Some(faction), Some(position)) => world
            .iter()
            .filter(|(&id, other)| {
                id != unit
                    && other.is_alive_unit()
                    && other.faction == Some(faction)
                    && other.position.is_some_and(|p| {
                        p.value.distance(position.value) <= config.morale_support_radius
                    })
            })
            .count(),
        _ => 0,
    };
    let support = i32::try_from(support).unwrap_or(i32::MAX / 2);
    config.base_morale + modifiers + config.morale_support_bonus.saturating_mul(support) - wounds
}

impl Simulation {
    /// Record a `source` modifier on `unit` and roll a morale check.
    /// Units without morale, and units that are down, never check.
    pub(crate) fn check_morale(&mut self, unit: EntityId, source: &str, modifier: i32) {
        let Some(morale) = self
            .entities
            .get(unit)
            .filter(|e| e.is_alive_unit())
            .and_then(|e| e.morale.as_ref())
            .map(|m| m.with_modifier(source, modifier))
        else {
            return;
        };
        if let Some(entity) = self.entities.get_mut(unit) {
            entity.morale = Some(morale.clone());
        }

        let target_number = morale_target_number(&self.entities, unit, &self.config);
        let roll = self.rng.percentile();
        let passed = i64::from(roll) <= i64::from(target_number);
        self.emit(
            Some(unit),
            None,
            GameEventKind::MoraleChecked {
                roll,
                target_number,
                passed,
            },
        );

        let status = if passed {
            morale.status.improved()
        } else {
            morale.status.worsened()
        };
        if status == morale.status {
            return;
        }
        if let Some(entity) = self.entities.get_mut(unit) {
            entity.morale = Some(morale.with_status(status));
        }
        let kind = match status {
            _ if passed => GameEventKind::UnitRallied { status },
            MoraleStatus::Steady => return,
            MoraleStatus::Shaken => GameEventKind::UnitShaken,
            MoraleStatus::Broken => GameEventKind::UnitBroken,
            MoraleStatus::Routed => GameEventKind::UnitRouted,
        };
        self.emit(Some(unit), None, kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Health, Morale, Position};
    use crate::data::ContentRegistry;
    use crate::events::GameEventType;
    use crate::factions::Faction;
    use crate::math::Vec2;

    fn squad(config: RulesConfig) -> (Simulation, EntityId) {
        let registry = ContentRegistry::builtin();
        let mut sim = Simulation::with_config(4, config);
        let unit = sim
            .spawn_unit(&registry, "spearman", Faction::Player, Position::new(Vec2::ZERO), 0)
            .unwrap();
        (sim, unit)
    }

    fn set_status(sim: &mut Simulation, unit: EntityId, status: MoraleStatus) {
        if let Some(entity) = sim.entities.get_mut(unit) {
            entity.morale = Some(Morale::default().with_status(status));
        }
    }

    #[test]
    fn test_target_number_components() {
        let config = RulesConfig::default();
        let registry = ContentRegistry::builtin();
        let (mut sim, unit) = squad(config.clone());
        assert_eq!(morale_target_number(&sim.entities, unit, &config), 50);

        for x in [1.5, -1.5, 5.0] {
            sim.spawn_unit(
                &registry,
                "swordsman",
                Faction::Player,
                Position::new(Vec2::new(x, 0.0)),
                0,
            )
            .unwrap();
        }
        // two friends close enough to steady the unit
        assert_eq!(morale_target_number(&sim.entities, unit, &config), 60);

        if let Some(entity) = sim.entities.get_mut(unit) {
            entity.health = Some(Health::with_values(5, 22));
            entity.morale = entity.morale.as_ref().map(|m| m.with_modifier("wounded", -10));
        }
        // critical: -20, modifier -10
        assert_eq!(morale_target_number(&sim.entities, unit, &config), 30);
    }

    #[test]
    fn test_failed_check_worsens() {
        let config = RulesConfig {
            base_morale: -100,
            ..RulesConfig::default()
        };
        let (mut sim, unit) = squad(config);
        sim.check_morale(unit, "test", 0);
        assert_eq!(
            sim.entity(unit).unwrap().morale.as_ref().unwrap().status,
            MoraleStatus::Shaken
        );
        sim.check_morale(unit, "test", 0);
        sim.check_morale(unit, "test", 0);
        let kinds: Vec<GameEventType> = sim.log().events().iter().map(|e| e.event_type()).collect();
        assert_eq!(
            kinds,
            vec![
                GameEventType::MoraleChecked,
                GameEventType::UnitShaken,
                GameEventType::MoraleChecked,
                GameEventType::UnitBroken,
                GameEventType::MoraleChecked,
                GameEventType::UnitRouted,
            ]
        );

        // already routed: nothing further to report
        sim.check_morale(unit, "test", 0);
        assert_eq!(sim.log().len(), 7);
    }

    #[test]
    fn test_passed_check_rallies() {
        let config = RulesConfig {
            base_morale: 200,
            ..RulesConfig::default()
        };
        let (mut sim, unit) = squad(config);
        set_status(&mut sim, unit, MoraleStatus::Broken);
        sim.check_morale(unit, "test", 0);
        let morale = sim.entity(unit).unwrap().morale.clone().unwrap();
        assert_eq!(morale.status, MoraleStatus::Shaken);
        assert_eq!(morale.modifiers.len(), 1);
        assert!(matches!(
            sim.log().events().last().map(|e| &e.kind),
            Some(GameEventKind::UnitRallied {
                status: MoraleStatus::Shaken
            })
        ));

        // steady units pass quietly
        set_status(&mut sim, unit, MoraleStatus::Steady);
        let before = sim.log().len();
        sim.check_morale(unit, "test", 0);
        assert_eq!(sim.log().len(), before + 1);
    }
}
