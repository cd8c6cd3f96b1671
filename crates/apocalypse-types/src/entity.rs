//! The entity model: Humans, Infected carriers and Zombies.
//!
//! An empty cell is the absence of an [`Entity`], so the enum only has the
//! three occupied states. Transitions are one-directional:
//! Human -> Infected -> Zombie -> removed, and living entities may be removed
//! directly by death.

use serde::{Deserialize, Serialize};

use crate::bearing::Bearing;
use crate::tick::Tick;

/// Biological sex of a living entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male.
    Male,
    /// Female. Only females carry pregnancies.
    Female,
}

/// Discriminant of an [`Entity`], used to index per-kind tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A healthy human.
    Human,
    /// An infected carrier that will eventually turn.
    Infected,
    /// A zombie.
    Zombie,
}

impl EntityKind {
    /// All kinds, in table order.
    pub const ALL: [Self; 3] = [Self::Human, Self::Infected, Self::Zombie];

    /// Position of this kind in per-kind tables.
    pub const fn index(self) -> usize {
        match self {
            Self::Human => 0,
            Self::Infected => 1,
            Self::Zombie => 2,
        }
    }

    /// Single-letter code used in world dumps.
    pub const fn symbol(self) -> char {
        match self {
            Self::Human => 'H',
            Self::Infected => 'I',
            Self::Zombie => 'Z',
        }
    }
}

/// Demographic fields shared by Humans and Infected.
///
/// Fertility bounds are relative to `origin`; `children_due` is an absolute
/// tick and is only meaningful while `pending_children > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Living {
    /// Sex of the entity.
    pub gender: Gender,
    /// Tick of birth.
    pub origin: Tick,
    /// Age (in ticks) at which the entity becomes fertile.
    pub fertility_start: Tick,
    /// Age (in ticks) at which the entity stops being fertile.
    pub fertility_end: Tick,
    /// Unborn children currently carried (0 to 3).
    pub pending_children: u8,
    /// Tick at which the pending children are due.
    pub children_due: Tick,
}

impl Living {
    /// Age in ticks at `now`.
    pub const fn age(&self, now: Tick) -> Tick {
        now.saturating_sub(self.origin)
    }

    /// Whether `now` falls inside the fertility window.
    pub const fn is_fertile(&self, now: Tick) -> bool {
        let age = self.age(now);
        age >= self.fertility_start && age < self.fertility_end
    }

    /// Whether unborn children are being carried.
    pub const fn is_pregnant(&self) -> bool {
        self.pending_children > 0
    }

    /// Whether the pregnancy has reached its due tick.
    pub const fn is_due(&self, now: Tick) -> bool {
        self.is_pregnant() && self.children_due <= now
    }

    /// Whether this is a female.
    pub fn is_female(&self) -> bool {
        self.gender == Gender::Female
    }
}

/// An occupant of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    /// A healthy human.
    Human {
        /// Demographic state.
        living: Living,
        /// Movement preference.
        bearing: Bearing,
    },
    /// An infected carrier. Keeps living, ageing and reproducing until it
    /// turns.
    Infected {
        /// Demographic state carried over from the human.
        living: Living,
        /// Tick of infection.
        infected_since: Tick,
        /// Movement preference.
        bearing: Bearing,
    },
    /// A zombie.
    Zombie {
        /// Tick at which the entity turned (or was seeded).
        became_zombie: Tick,
        /// Movement preference.
        bearing: Bearing,
    },
}

impl Entity {
    /// The kind discriminant.
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Human { .. } => EntityKind::Human,
            Self::Infected { .. } => EntityKind::Infected,
            Self::Zombie { .. } => EntityKind::Zombie,
        }
    }

    /// Whether this is a Human or an Infected.
    pub const fn is_living(&self) -> bool {
        !self.is_zombie()
    }

    /// Whether this is a Zombie.
    pub const fn is_zombie(&self) -> bool {
        matches!(self, Self::Zombie { .. })
    }

    /// Demographic state, if living.
    pub const fn living(&self) -> Option<&Living> {
        match self {
            Self::Human { living, .. } | Self::Infected { living, .. } => Some(living),
            Self::Zombie { .. } => None,
        }
    }

    /// Mutable demographic state, if living.
    pub const fn living_mut(&mut self) -> Option<&mut Living> {
        match self {
            Self::Human { living, .. } | Self::Infected { living, .. } => Some(living),
            Self::Zombie { .. } => None,
        }
    }

    /// Gender of a living entity. Zombies have none.
    pub fn gender(&self) -> Option<Gender> {
        self.living().map(|living| living.gender)
    }

    /// Current movement preference.
    pub const fn bearing(&self) -> Bearing {
        match self {
            Self::Human { bearing, .. }
            | Self::Infected { bearing, .. }
            | Self::Zombie { bearing, .. } => *bearing,
        }
    }

    /// Replace the movement preference.
    pub const fn set_bearing(&mut self, value: Bearing) {
        match self {
            Self::Human { bearing, .. }
            | Self::Infected { bearing, .. }
            | Self::Zombie { bearing, .. } => *bearing = value,
        }
    }

    /// Age at `now`: time since birth for the living, time since turning for
    /// zombies.
    pub const fn age(&self, now: Tick) -> Tick {
        match self {
            Self::Human { living, .. } | Self::Infected { living, .. } => living.age(now),
            Self::Zombie { became_zombie, .. } => now.saturating_sub(*became_zombie),
        }
    }

    /// Turn a Human into an Infected, keeping its demographic state.
    ///
    /// Any other kind is returned unchanged.
    pub const fn infect(self, now: Tick, bearing: Bearing) -> Self {
        match self {
            Self::Human { living, .. } => Self::Infected {
                living,
                infected_since: now,
                bearing,
            },
            other => other,
        }
    }

    /// Turn an Infected into a Zombie.
    ///
    /// Any other kind is returned unchanged.
    pub const fn zombify(self, now: Tick, bearing: Bearing) -> Self {
        match self {
            Self::Infected { .. } => Self::Zombie {
                became_zombie: now,
                bearing,
            },
            other => other,
        }
    }

    /// Gender code used in world dumps: `M`, `F`, `f` for a pregnant female,
    /// `_` for zombies.
    pub fn gender_symbol(&self) -> char {
        match self.living() {
            None => '_',
            Some(living) => match living.gender {
                Gender::Male => 'M',
                Gender::Female if living.is_pregnant() => 'f',
                Gender::Female => 'F',
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn female(origin: Tick) -> Living {
        Living {
            gender: Gender::Female,
            origin,
            fertility_start: 15,
            fertility_end: 45,
            pending_children: 0,
            children_due: 0,
        }
    }

    #[test]
    fn fertility_window_is_half_open() {
        let living = female(0);
        assert!(!living.is_fertile(14));
        assert!(living.is_fertile(15));
        assert!(living.is_fertile(44));
        assert!(!living.is_fertile(45));
    }

    #[test]
    fn due_requires_pregnancy() {
        let mut living = female(0);
        living.children_due = 10;
        assert!(!living.is_due(20));
        living.pending_children = 2;
        assert!(!living.is_due(9));
        assert!(living.is_due(10));
    }

    #[test]
    fn infection_keeps_demographics() {
        let human = Entity::Human {
            living: female(-100),
            bearing: Bearing::ZERO,
        };
        let infected = human.infect(7, Bearing::new(0.5, 0.0));
        assert_eq!(infected.kind(), EntityKind::Infected);
        assert_eq!(infected.living(), human.living());
        assert_eq!(infected.age(7), 107);
    }

    #[test]
    fn transitions_only_move_forward() {
        let zombie = Entity::Zombie {
            became_zombie: 3,
            bearing: Bearing::ZERO,
        };
        assert_eq!(zombie.infect(5, Bearing::ZERO), zombie);
        assert_eq!(zombie.zombify(5, Bearing::ZERO), zombie);

        let human = Entity::Human {
            living: female(0),
            bearing: Bearing::ZERO,
        };
        assert_eq!(human.zombify(5, Bearing::ZERO), human);
    }

    #[test]
    fn zombie_age_counts_from_turning() {
        let infected = Entity::Infected {
            living: female(-1000),
            infected_since: 0,
            bearing: Bearing::ZERO,
        };
        let zombie = infected.zombify(20, Bearing::ZERO);
        assert!(zombie.is_zombie());
        assert_eq!(zombie.age(25), 5);
        assert_eq!(zombie.gender(), None);
        assert_eq!(zombie.gender_symbol(), '_');
    }

    #[test]
    fn pregnant_female_is_lowercase() {
        let mut living = female(0);
        living.pending_children = 1;
        let entity = Entity::Human {
            living,
            bearing: Bearing::ZERO,
        };
        assert_eq!(entity.gender_symbol(), 'f');
    }

    #[test]
    fn serde_roundtrip_preserves_variant() {
        let entity = Entity::Infected {
            living: female(4),
            infected_since: 9,
            bearing: Bearing::new(0.25, -0.5),
        };
        let json = serde_json::to_string(&entity).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entity);
    }
}
