//! Unit orders and per-unit command queues.
//!
//! Orders are a closed sum type: the scheduler and the resolver match on
//! [`CommandKind`] exhaustively, so a new order cannot slip past either.

use serde::{Deserialize, Serialize};

use crate::components::{BodyLocation, DefensiveStance, EntityId, MovementMode};
use crate::math::Vec2;

/// AP for taking a defensive stance.
pub const DEFEND_AP_COST: u32 = 1;
/// AP per aim action.
pub const AIM_AP_COST: u32 = 1;
/// AP for loading a new ammunition slot.
pub const RELOAD_AP_COST: u32 = 2;

/// What a unit has been told to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Move towards a point.
    Move {
        /// Requested destination.
        target: Vec2,
        /// Movement mode.
        mode: MovementMode,
    },
    /// Close to melee distance of another unit.
    MoveAdjacent {
        /// Unit to approach.
        target: EntityId,
        /// Movement mode.
        mode: MovementMode,
    },
    /// Attack a unit with the wielded weapon.
    Attack {
        /// Defender.
        target: EntityId,
        /// Called shot, if any.
        #[serde(default)]
        aimed_location: Option<BodyLocation>,
    },
    /// Take a defensive stance for the rest of the turn.
    Defend {
        /// Stance to take.
        stance: DefensiveStance,
    },
    /// Steady the next attack.
    Aim {
        /// Location to aim at, if any.
        #[serde(default)]
        location: Option<BodyLocation>,
    },
    /// Hold action points back for reaction fire.
    Overwatch {
        /// Centre of the watched arc; `None` watches all around.
        #[serde(default)]
        direction: Option<f64>,
        /// Full width of the arc in radians.
        #[serde(default)]
        arc: Option<f64>,
    },
    /// Face a new direction.
    Turn {
        /// New facing in radians.
        facing: f64,
    },
    /// Load the next ammunition slot with rounds in it.
    Reload,
}

impl CommandKind {
    /// Short lowercase label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::MoveAdjacent { .. } => "move_adjacent",
            Self::Attack { .. } => "attack",
            Self::Defend { .. } => "defend",
            Self::Aim { .. } => "aim",
            Self::Overwatch { .. } => "overwatch",
            Self::Turn { .. } => "turn",
            Self::Reload => "reload",
        }
    }

    /// Scheduling priority when the command does not override it. Attacks
    /// strike at the wielded weapon's speed, but never ahead of a move the
    /// same unit queued before them (see [`CommandQueue::movement_priority`]).
    #[must_use]
    pub fn default_priority(&self, weapon_speed: Option<i32>) -> i32 {
        match self {
            Self::Defend { .. } | Self::Overwatch { .. } => 0,
            Self::Turn { .. } => 1,
            Self::Aim { .. } => 2,
            Self::Move { .. } | Self::MoveAdjacent { .. } => 5,
            Self::Attack { .. } => weapon_speed.unwrap_or(5),
            Self::Reload => 8,
        }
    }

    /// Unit the order refers to, if any.
    #[must_use]
    pub const fn target_unit(&self) -> Option<EntityId> {
        match self {
            Self::MoveAdjacent { target, .. } | Self::Attack { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// True for orders whose outcome depends on where the unit stands, so
    /// they wait for its earlier moves.
    #[must_use]
    pub const fn follows_movement(&self) -> bool {
        matches!(self, Self::Attack { .. })
    }

    /// True for orders that only relocate the unit. Routed units still
    /// carry these out.
    #[must_use]
    pub const fn is_movement(&self) -> bool {
        matches!(self, Self::Move { .. } | Self::MoveAdjacent { .. })
    }
}

/// Runtime condition checked just before a command executes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    /// The target is within weapon reach.
    InRange {
        /// Unit to measure to.
        target: EntityId,
    },
    /// The target is down or gone.
    TargetDead {
        /// Unit to check.
        target: EntityId,
    },
    /// A hostile unit is within `within` units.
    EnemyApproaches {
        /// Trigger distance.
        within: f64,
    },
    /// The unit's health is below `percent` of max.
    HpBelow {
        /// Threshold percentage.
        percent: i32,
    },
}

/// An order as submitted by the player or the AI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// The order.
    pub kind: CommandKind,
    /// Condition re-checked at execution time.
    #[serde(default)]
    pub precondition: Option<Precondition>,
    /// Replaces the default priority for this order.
    #[serde(default)]
    pub priority: Option<i32>,
}

impl Command {
    /// Unconditional command with the default priority.
    #[must_use]
    pub const fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            precondition: None,
            priority: None,
        }
    }

    /// Shorthand for [`CommandKind::Move`].
    #[must_use]
    pub const fn move_to(target: Vec2, mode: MovementMode) -> Self {
        Self::new(CommandKind::Move { target, mode })
    }

    /// Shorthand for an unaimed [`CommandKind::Attack`].
    #[must_use]
    pub const fn attack(target: EntityId) -> Self {
        Self::new(CommandKind::Attack {
            target,
            aimed_location: None,
        })
    }

    /// Attach a precondition.
    #[must_use]
    pub fn when(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }

    /// Override the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// A command accepted into a queue, with its cost and position in the
/// global order fixed at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCommand {
    /// The submitted command.
    pub command: Command,
    /// Action points charged if it executes.
    pub ap_cost: u32,
    /// Scheduling priority (lower first).
    pub priority: i32,
    /// Declaration order across all units; breaks priority ties.
    pub sequence: u64,
}

/// A unit's orders for the coming resolution pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandQueue {
    /// Commands in declaration order.
    pub commands: Vec<QueuedCommand>,
}

impl CommandQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Summed AP cost of everything queued.
    #[must_use]
    pub fn total_ap(&self) -> u32 {
        self.commands.iter().map(|c| c.ap_cost).sum()
    }

    /// Latest-resolving priority among the queued moves.
    #[must_use]
    pub fn movement_priority(&self) -> Option<i32> {
        self.commands
            .iter()
            .filter(|c| c.command.kind.is_movement())
            .map(|c| c.priority)
            .max()
    }

    /// Queue with `command` appended.
    #[must_use]
    pub fn with_command(&self, command: QueuedCommand) -> Self {
        let mut commands = self.commands.clone();
        commands.push(command);
        Self { commands }
    }

    /// Queue without the command at `index`, or `None` if out of range.
    #[must_use]
    pub fn without(&self, index: usize) -> Option<Self> {
        if index >= self.commands.len() {
            return None;
        }
        let mut commands = self.commands.clone();
        commands.remove(index);
        Some(Self { commands })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(ap_cost: u32, sequence: u64) -> QueuedCommand {
        QueuedCommand {
            command: Command::new(CommandKind::Reload),
            ap_cost,
            priority: 8,
            sequence,
        }
    }

    #[test]
    fn test_queue_totals() {
        let queue = CommandQueue::new()
            .with_command(queued(2, 0))
            .with_command(queued(3, 1));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.total_ap(), 5);
    }

    #[test]
    fn test_movement_priority() {
        let step = QueuedCommand {
            command: Command::move_to(Vec2::new(1.0, 0.0), MovementMode::Walk),
            ap_cost: 1,
            priority: 5,
            sequence: 2,
        };
        let queue = CommandQueue::new().with_command(queued(1, 0));
        assert_eq!(queue.movement_priority(), None);
        assert_eq!(queue.with_command(step).movement_priority(), Some(5));
        assert!(CommandKind::Attack {
            target: 3,
            aimed_location: None
        }
        .follows_movement());
        assert!(!CommandKind::Reload.follows_movement());
    }

    #[test]
    fn test_queue_without() {
        let queue = CommandQueue::new()
            .with_command(queued(2, 0))
            .with_command(queued(3, 1));
        let trimmed = queue.without(0).unwrap();
        assert_eq!(trimmed.commands[0].sequence, 1);
        assert!(queue.without(5).is_none());
    }

    #[test]
    fn test_builders() {
        let cmd = Command::attack(4)
            .when(Precondition::InRange { target: 4 })
            .with_priority(1);
        assert_eq!(cmd.priority, Some(1));
        assert!(matches!(
            cmd.precondition,
            Some(Precondition::InRange { target: 4 })
        ));
        assert_eq!(cmd.kind.label(), "attack");
        assert!(!cmd.kind.is_movement());
        assert_eq!(cmd.kind.target_unit(), Some(4));
    }

    #[test]
    fn test_default_priorities() {
        let defend = CommandKind::Defend {
            stance: DefensiveStance::Block,
        };
        assert_eq!(defend.default_priority(None), 0);
        assert_eq!(CommandKind::Reload.default_priority(Some(1)), 8);
        assert_eq!(Command::attack(2).kind.default_priority(Some(3)), 3);
        let step = Command::move_to(Vec2::ZERO, MovementMode::Walk);
        assert_eq!(step.kind.default_priority(Some(1)), 5);
    }

    #[test]
    fn test_command_json_shape() {
        let cmd = Command::move_to(Vec2::new(3.0, 0.0), MovementMode::Advance);
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.starts_with("{\"kind\":{\"move\":"));
        assert!(json.contains("\"mode\":\"advance\""));
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }
}
