//! Age bands and the per-tick rates that depend on them.
//!
//! Living entities pass through four age bands, zombies through two. Death
//! and decomposition probabilities and the probability of taking a step
//! are piecewise constant over those bands.

use apocalypse_types::{Entity, Gender, Living, MONTH, Tick, YEAR};

use crate::config::{LifecycleConfig, SpeedTable};

/// Age at which a child becomes a young adult.
pub const CHILD_YOUNG_BORDER: Tick = 15 * YEAR;

/// Age at which a young adult becomes middle-aged.
pub const YOUNG_MIDDLE_AGE_BORDER: Tick = CHILD_YOUNG_BORDER + 22 * YEAR + 6 * MONTH;

/// Age at which a middle-aged adult becomes elderly.
pub const MIDDLE_AGE_ELDERLY_BORDER: Tick = YOUNG_MIDDLE_AGE_BORDER + 27 * YEAR + 6 * MONTH;

/// Span of ages over which the elderly are seeded.
pub const ELDERLY_PERIOD: Tick = 45 * YEAR;

/// Age (as a zombie) at which a zombie counts as old.
pub const ZOMBIE_YOUNG_OLD_BORDER: Tick = 18 * MONTH;

/// Age band of a living entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeBand {
    /// Younger than 15 years.
    Child,
    /// 15 to 37.5 years.
    Young,
    /// 37.5 to 65 years.
    MiddleAge,
    /// 65 years and older.
    Elderly,
}

impl AgeBand {
    /// The band of an entity aged `age` ticks.
    pub const fn of(age: Tick) -> Self {
        if age < CHILD_YOUNG_BORDER {
            Self::Child
        } else if age < YOUNG_MIDDLE_AGE_BORDER {
            Self::Young
        } else if age < MIDDLE_AGE_ELDERLY_BORDER {
            Self::MiddleAge
        } else {
            Self::Elderly
        }
    }
}

/// Per-tick death probability of a living entity at `now`.
pub fn death_rate(living: &Living, now: Tick, config: &LifecycleConfig) -> f64 {
    let base = match AgeBand::of(living.age(now)) {
        AgeBand::Child => config.death_child,
        AgeBand::Young => config.death_young,
        AgeBand::MiddleAge => config.death_middle_age,
        AgeBand::Elderly => config.death_elderly,
    };
    match living.gender {
        Gender::Male => base * config.gender_death_ratio,
        Gender::Female => base / config.gender_death_ratio,
    }
}

/// Per-tick decomposition probability of a zombie that turned at
/// `became_zombie`.
pub fn decomposition_rate(became_zombie: Tick, now: Tick, config: &LifecycleConfig) -> f64 {
    if now.saturating_sub(became_zombie) < ZOMBIE_YOUNG_OLD_BORDER {
        config.decomposition_young
    } else {
        config.decomposition_old
    }
}

/// Probability that `entity` actually takes the step it chose at `now`.
pub fn max_speed(entity: &Entity, now: Tick, speeds: &SpeedTable) -> f64 {
    let Some(living) = entity.living() else {
        return if entity.age(now) < ZOMBIE_YOUNG_OLD_BORDER {
            speeds.zombie_young
        } else {
            speeds.zombie_old
        };
    };
    let male = match AgeBand::of(living.age(now)) {
        AgeBand::Child => speeds.male_child,
        AgeBand::Young => speeds.male_young,
        AgeBand::MiddleAge => speeds.male_middle_age,
        AgeBand::Elderly => speeds.male_elderly,
    };
    match living.gender {
        Gender::Male => male,
        Gender::Female => male * speeds.female_ratio,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::arithmetic_side_effects)]
mod tests {
    use apocalypse_types::Bearing;

    use super::*;
    use crate::config::MovementConfig;

    fn living(gender: Gender, origin: Tick) -> Living {
        Living {
            gender,
            origin,
            fertility_start: 0,
            fertility_end: 0,
            pending_children: 0,
            children_due: 0,
        }
    }

    #[test]
    fn band_borders() {
        assert_eq!(YOUNG_MIDDLE_AGE_BORDER, 13_685);
        assert_eq!(MIDDLE_AGE_ELDERLY_BORDER, 23_720);
        assert_eq!(AgeBand::of(0), AgeBand::Child);
        assert_eq!(AgeBand::of(CHILD_YOUNG_BORDER - 1), AgeBand::Child);
        assert_eq!(AgeBand::of(CHILD_YOUNG_BORDER), AgeBand::Young);
        assert_eq!(AgeBand::of(YOUNG_MIDDLE_AGE_BORDER), AgeBand::MiddleAge);
        assert_eq!(AgeBand::of(MIDDLE_AGE_ELDERLY_BORDER), AgeBand::Elderly);
    }

    #[test]
    fn males_die_sooner_than_females() {
        let cfg = LifecycleConfig::default();
        let now = 30 * YEAR;
        let male = death_rate(&living(Gender::Male, 0), now, &cfg);
        let female = death_rate(&living(Gender::Female, 0), now, &cfg);
        assert!((male - 0.000_001_2 * cfg.gender_death_ratio).abs() < 1e-15);
        assert!(male > female);
        let elderly = death_rate(&living(Gender::Female, 0), 70 * YEAR, &cfg);
        assert!(elderly > female);
    }

    #[test]
    fn zombie_rates_depend_on_time_since_turning() {
        let cfg = LifecycleConfig {
            decomposition_old: 0.5,
            ..LifecycleConfig::default()
        };
        assert_eq!(decomposition_rate(100, 100 + 539, &cfg), cfg.decomposition_young);
        assert_eq!(decomposition_rate(100, 100 + 540, &cfg), 0.5);

        let speeds = MovementConfig::default().speeds;
        let fresh = Entity::Zombie {
            became_zombie: 0,
            bearing: Bearing::ZERO,
        };
        assert_eq!(max_speed(&fresh, 10, &speeds), 0.4);
        assert_eq!(max_speed(&fresh, 600, &speeds), 0.32);
    }

    #[test]
    fn women_walk_slower() {
        let speeds = MovementConfig::default().speeds;
        let man = Entity::Human {
            living: living(Gender::Male, 0),
            bearing: Bearing::ZERO,
        };
        let woman = Entity::Human {
            living: living(Gender::Female, 0),
            bearing: Bearing::ZERO,
        };
        let now = 20 * YEAR;
        assert_eq!(max_speed(&man, now, &speeds), 0.8);
        assert!((max_speed(&woman, now, &speeds) - 0.8 * 0.857_143_110_76).abs() < 1e-12);
    }
}
