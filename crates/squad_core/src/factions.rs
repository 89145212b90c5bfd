//! Faction identifiers.

use serde::{Deserialize, Serialize};

/// Side a unit fights for. Immutable after creation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Faction {
    /// The human-controlled side.
    Player,
    /// The opposing side.
    Enemy,
}

impl Faction {
    /// Every faction, in roster order.
    pub const ALL: [Self; 2] = [Self::Player, Self::Enemy];

    /// True if units of `self` fight units of `other`.
    #[must_use]
    pub const fn is_hostile_to(self, other: Self) -> bool {
        !matches!(
            (self, other),
            (Self::Player, Self::Player) | (Self::Enemy, Self::Enemy)
        )
    }

    /// The opposing side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Player => Self::Enemy,
            Self::Enemy => Self::Player,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostility() {
        assert!(Faction::Player.is_hostile_to(Faction::Enemy));
        assert!(!Faction::Enemy.is_hostile_to(Faction::Enemy));
        assert_eq!(Faction::Player.opponent(), Faction::Enemy);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("ENEMY".parse::<Faction>().unwrap(), Faction::Enemy);
        assert_eq!(Faction::Player.to_string(), "player");
    }
}
