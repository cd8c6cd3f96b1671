//! Tunable parameters of the lifecycle rules and of steering.
//!
//! The defaults are the calibrated values of the model: one tick is one
//! day, rates are per-tick probabilities. [`LifecycleConfig`] and
//! [`MovementConfig`] deserialize from the `lifecycle` and `movement`
//! sections of `apocalypse-config.yaml`; any missing key keeps its default.

use apocalypse_types::{DAY, MONTH, WEEK, YEAR};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// How the probability of conception is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BirthPolicy {
    /// A constant probability per mating.
    Uncontrolled,
    /// Replace the dead: deaths and zombifications so far divided by
    /// matings so far.
    EqualReplacement,
    /// Base probability scaled by `target density / current density`.
    DensityLinear,
    /// Base probability scaled by `ratio ^ (ratio * awareness)` where
    /// `ratio = target density / current density`.
    #[default]
    DensityPower,
}

/// Normal distribution of the age (in ticks) at which fertility starts and
/// ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FertilityWindow {
    /// Mean age at which fertility starts.
    pub start_mean: f64,
    /// Standard deviation of the start.
    pub start_std_dev: f64,
    /// Mean age at which fertility ends.
    pub end_mean: f64,
    /// Standard deviation of the end.
    pub end_std_dev: f64,
}

#[allow(clippy::cast_precision_loss)]
impl FertilityWindow {
    /// Female fertility: 15 +- 2 years to 45 +- 5 years.
    pub const FEMALE: Self = Self {
        start_mean: (15 * YEAR) as f64,
        start_std_dev: (2 * YEAR) as f64,
        end_mean: (45 * YEAR) as f64,
        end_std_dev: (5 * YEAR) as f64,
    };

    /// Male fertility: 15 +- 2 years to 80 +- 10 years.
    pub const MALE: Self = Self {
        start_mean: (15 * YEAR) as f64,
        start_std_dev: (2 * YEAR) as f64,
        end_mean: (80 * YEAR) as f64,
        end_std_dev: (10 * YEAR) as f64,
    };
}

/// Configuration of death, infection, zombification and reproduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Per-tick death probability of a child, before the gender adjustment
    /// (default: 6e-7).
    #[serde(default = "default_death_child")]
    pub death_child: f64,

    /// Per-tick death probability of a young adult (default: 1.2e-6).
    #[serde(default = "default_death_young")]
    pub death_young: f64,

    /// Per-tick death probability in middle age (default: 9.6e-6).
    #[serde(default = "default_death_middle_age")]
    pub death_middle_age: f64,

    /// Per-tick death probability of the elderly (default: 9.6e-5).
    #[serde(default = "default_death_elderly")]
    pub death_elderly: f64,

    /// Male death rates are multiplied and female rates divided by this
    /// factor (default: `sqrt(82.4 / 78.5)`).
    #[serde(default = "default_gender_death_ratio")]
    pub gender_death_ratio: f64,

    /// Per-tick decomposition probability of a zombie younger than 18
    /// months (default: one over three years).
    #[serde(default = "default_decomposition")]
    pub decomposition_young: f64,

    /// Per-tick decomposition probability of an older zombie (default: one
    /// over three years).
    #[serde(default = "default_decomposition")]
    pub decomposition_old: f64,

    /// Per-tick probability that an Infected turns (default: 1/14).
    #[serde(default = "default_p_become_zombie")]
    pub p_become_zombie: f64,

    /// Infection probability per adjacent zombie (default: 0.0075).
    #[serde(default = "default_p_infection")]
    pub p_infection: f64,

    /// Base conception probability per mating (default: 0.00073).
    #[serde(default = "default_p_fertilization")]
    pub p_fertilization: f64,

    /// Conception policy (default: `density_power`).
    #[serde(default)]
    pub birth_policy: BirthPolicy,

    /// Living entities per cell the density policies steer towards; also
    /// the initial density of a seeded world (default: 0.085).
    #[serde(default = "default_target_density")]
    pub target_density: f64,

    /// Exponent coefficient of the density power law (default: 2.5).
    #[serde(default = "default_situation_awareness")]
    pub situation_awareness: f64,

    /// Probability that a newborn is female (default: 0.4854).
    #[serde(default = "default_female_ratio_at_birth")]
    pub female_ratio_at_birth: f64,

    /// Probability that a seeded human is female (default: 0.498).
    #[serde(default = "default_female_ratio_initial")]
    pub female_ratio_initial: f64,

    /// Children per female over a lifetime, used to seed pregnancies
    /// (default: 1.77).
    #[serde(default = "default_children_per_female")]
    pub children_per_female: f64,

    /// Probability of twins (default: 0.011).
    #[serde(default = "default_p_twins")]
    pub p_twins: f64,

    /// Probability of triplets (default: 0.00013).
    #[serde(default = "default_p_triplets")]
    pub p_triplets: f64,

    /// Mean pregnancy duration in ticks (default: 9 months).
    #[serde(default = "default_gestation_mean")]
    pub gestation_mean: f64,

    /// Standard deviation of the pregnancy duration (default: 2 weeks).
    #[serde(default = "default_gestation_std_dev")]
    pub gestation_std_dev: f64,

    /// Female fertility window.
    #[serde(default = "default_female_fertility")]
    pub female_fertility: FertilityWindow,

    /// Male fertility window.
    #[serde(default = "default_male_fertility")]
    pub male_fertility: FertilityWindow,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            death_child: default_death_child(),
            death_young: default_death_young(),
            death_middle_age: default_death_middle_age(),
            death_elderly: default_death_elderly(),
            gender_death_ratio: default_gender_death_ratio(),
            decomposition_young: default_decomposition(),
            decomposition_old: default_decomposition(),
            p_become_zombie: default_p_become_zombie(),
            p_infection: default_p_infection(),
            p_fertilization: default_p_fertilization(),
            birth_policy: BirthPolicy::default(),
            target_density: default_target_density(),
            situation_awareness: default_situation_awareness(),
            female_ratio_at_birth: default_female_ratio_at_birth(),
            female_ratio_initial: default_female_ratio_initial(),
            children_per_female: default_children_per_female(),
            p_twins: default_p_twins(),
            p_triplets: default_p_triplets(),
            gestation_mean: default_gestation_mean(),
            gestation_std_dev: default_gestation_std_dev(),
            female_fertility: default_female_fertility(),
            male_fertility: default_male_fertility(),
        }
    }
}

impl LifecycleConfig {
    /// A configuration in which nothing ever happens by chance: nobody
    /// dies, turns, gets infected or conceives. Tests switch single rules
    /// back on from here.
    pub fn inert() -> Self {
        Self {
            death_child: 0.0,
            death_young: 0.0,
            death_middle_age: 0.0,
            death_elderly: 0.0,
            decomposition_young: 0.0,
            decomposition_old: 0.0,
            p_become_zombie: 0.0,
            p_infection: 0.0,
            p_fertilization: 0.0,
            birth_policy: BirthPolicy::Uncontrolled,
            ..Self::default()
        }
    }

    /// Probability that a seeded fertile female is already pregnant:
    /// lifetime children spread over the fertile span, times the gestation.
    pub fn initial_pregnancy_probability(&self) -> f64 {
        let span = self.female_fertility.end_mean - self.female_fertility.start_mean;
        if span <= 0.0 {
            return 0.0;
        }
        self.children_per_female * self.gestation_mean / span
    }

    /// Check every rate and fraction.
    ///
    /// # Errors
    ///
    /// Returns the first offending parameter.
    pub fn validate(&self) -> Result<(), AgentError> {
        let rates = [
            ("lifecycle.death_child", self.death_child),
            ("lifecycle.death_young", self.death_young),
            ("lifecycle.death_middle_age", self.death_middle_age),
            ("lifecycle.death_elderly", self.death_elderly),
            ("lifecycle.gender_death_ratio", self.gender_death_ratio),
            ("lifecycle.decomposition_young", self.decomposition_young),
            ("lifecycle.decomposition_old", self.decomposition_old),
            ("lifecycle.p_become_zombie", self.p_become_zombie),
            ("lifecycle.p_infection", self.p_infection),
            ("lifecycle.p_fertilization", self.p_fertilization),
            ("lifecycle.target_density", self.target_density),
            ("lifecycle.situation_awareness", self.situation_awareness),
            ("lifecycle.children_per_female", self.children_per_female),
            ("lifecycle.gestation_mean", self.gestation_mean),
            ("lifecycle.gestation_std_dev", self.gestation_std_dev),
        ];
        for (name, value) in rates {
            check_rate(name, value)?;
        }
        let fractions = [
            ("lifecycle.female_ratio_at_birth", self.female_ratio_at_birth),
            ("lifecycle.female_ratio_initial", self.female_ratio_initial),
            ("lifecycle.p_twins", self.p_twins),
            ("lifecycle.p_triplets", self.p_triplets),
        ];
        for (name, value) in fractions {
            check_fraction(name, value)?;
        }
        check_fraction("lifecycle.p_twins + p_triplets", self.p_twins + self.p_triplets)
    }
}

/// Steering weights of a living entity, per neighbour content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LivingWeights {
    /// A living entity of the same gender.
    pub same_sex: f32,
    /// A living entity of the other gender.
    pub opposite_sex: f32,
    /// A zombie.
    pub zombie: f32,
    /// An empty cell.
    pub empty: f32,
    /// A cell beyond the edge of a bounded world.
    pub wall: f32,
}

/// Steering weights of a zombie, per neighbour content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZombieWeights {
    /// A Human or Infected.
    pub living: f32,
    /// Another zombie.
    pub zombie: f32,
    /// An empty cell.
    pub empty: f32,
    /// A cell beyond the edge of a bounded world.
    pub wall: f32,
}

/// Probability of actually taking a step, by age band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedTable {
    /// Male child.
    pub male_child: f64,
    /// Young adult male.
    pub male_young: f64,
    /// Middle-aged male.
    pub male_middle_age: f64,
    /// Elderly male.
    pub male_elderly: f64,
    /// Female speed relative to the male speed of the same band.
    pub female_ratio: f64,
    /// Zombie in its first 18 months.
    pub zombie_young: f64,
    /// Older zombie.
    pub zombie_old: f64,
}

/// Configuration of steering and movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    /// Living entity, neighbours at distance one.
    #[serde(default = "default_living_near")]
    pub living_near: LivingWeights,

    /// Living entity, neighbours at distance two.
    #[serde(default = "default_living_far")]
    pub living_far: LivingWeights,

    /// Zombie, neighbours at distance one.
    #[serde(default = "default_zombie_near")]
    pub zombie_near: ZombieWeights,

    /// Zombie, neighbours at distance two.
    #[serde(default = "default_zombie_far")]
    pub zombie_far: ZombieWeights,

    /// Weight of the random perturbation added to the steering vector
    /// (default: 0.35).
    #[serde(default = "default_fluctuation")]
    pub fluctuation: f32,

    /// Magnitude of a random bearing (default: 0.5).
    #[serde(default = "default_random_bearing_magnitude")]
    pub random_bearing_magnitude: f32,

    /// Mean of the factor applied to a normalised bearing (default: 1).
    #[serde(default = "default_quotient_mean")]
    pub quotient_mean: f32,

    /// Spread of that factor around its mean (default: 0.25).
    #[serde(default = "default_quotient_variance")]
    pub quotient_variance: f32,

    /// Probability of turning 90 degrees either way instead of following
    /// the chosen direction (default: 0.1 each way).
    #[serde(default = "default_direction_missed")]
    pub direction_missed: f64,

    /// Probability of following the chosen direction (default: 0.65). The
    /// remainder stays put.
    #[serde(default = "default_direction_follow")]
    pub direction_follow: f64,

    /// Step probabilities.
    #[serde(default = "default_speeds")]
    pub speeds: SpeedTable,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            living_near: default_living_near(),
            living_far: default_living_far(),
            zombie_near: default_zombie_near(),
            zombie_far: default_zombie_far(),
            fluctuation: default_fluctuation(),
            random_bearing_magnitude: default_random_bearing_magnitude(),
            quotient_mean: default_quotient_mean(),
            quotient_variance: default_quotient_variance(),
            direction_missed: default_direction_missed(),
            direction_follow: default_direction_follow(),
            speeds: default_speeds(),
        }
    }
}

impl MovementConfig {
    /// A configuration in which nobody ever moves: no steering, no random
    /// push, no speed.
    pub fn still() -> Self {
        let living = LivingWeights {
            same_sex: 0.0,
            opposite_sex: 0.0,
            zombie: 0.0,
            empty: 0.0,
            wall: 0.0,
        };
        let zombie = ZombieWeights {
            living: 0.0,
            zombie: 0.0,
            empty: 0.0,
            wall: 0.0,
        };
        Self {
            living_near: living,
            living_far: living,
            zombie_near: zombie,
            zombie_far: zombie,
            fluctuation: 0.0,
            random_bearing_magnitude: 0.0,
            speeds: SpeedTable {
                male_child: 0.0,
                male_young: 0.0,
                male_middle_age: 0.0,
                male_elderly: 0.0,
                female_ratio: 0.0,
                zombie_young: 0.0,
                zombie_old: 0.0,
            },
            ..Self::default()
        }
    }

    /// Check the probabilities of the movement model.
    ///
    /// # Errors
    ///
    /// Returns the first offending parameter.
    pub fn validate(&self) -> Result<(), AgentError> {
        check_fraction("movement.direction_missed", self.direction_missed)?;
        check_fraction("movement.direction_follow", self.direction_follow)?;
        check_fraction(
            "movement.direction_missed * 2 + direction_follow",
            self.direction_missed * 2.0 + self.direction_follow,
        )?;
        check_rate("movement.fluctuation", f64::from(self.fluctuation))?;
        check_rate(
            "movement.random_bearing_magnitude",
            f64::from(self.random_bearing_magnitude),
        )?;
        let speeds = [
            ("movement.speeds.male_child", self.speeds.male_child),
            ("movement.speeds.male_young", self.speeds.male_young),
            ("movement.speeds.male_middle_age", self.speeds.male_middle_age),
            ("movement.speeds.male_elderly", self.speeds.male_elderly),
            ("movement.speeds.female_ratio", self.speeds.female_ratio),
            ("movement.speeds.zombie_young", self.speeds.zombie_young),
            ("movement.speeds.zombie_old", self.speeds.zombie_old),
        ];
        for (name, value) in speeds {
            check_rate(name, value)?;
        }
        Ok(())
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<(), AgentError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AgentError::InvalidRate { name, value })
    }
}

fn check_fraction(name: &'static str, value: f64) -> Result<(), AgentError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AgentError::InvalidFraction { name, value })
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_death_child() -> f64 {
    0.000_000_6
}

const fn default_death_young() -> f64 {
    0.000_001_2
}

const fn default_death_middle_age() -> f64 {
    0.000_009_6
}

const fn default_death_elderly() -> f64 {
    0.000_096
}

const fn default_gender_death_ratio() -> f64 {
    1.024_539_666_710_089
}

#[allow(clippy::cast_precision_loss)]
fn default_decomposition() -> f64 {
    1.0 / (3 * YEAR) as f64
}

#[allow(clippy::cast_precision_loss)]
fn default_p_become_zombie() -> f64 {
    1.0 / (14 * DAY) as f64
}

const fn default_p_infection() -> f64 {
    0.0075
}

const fn default_p_fertilization() -> f64 {
    0.000_73
}

const fn default_target_density() -> f64 {
    0.085
}

const fn default_situation_awareness() -> f64 {
    2.5
}

const fn default_female_ratio_at_birth() -> f64 {
    0.4854
}

const fn default_female_ratio_initial() -> f64 {
    0.498
}

const fn default_children_per_female() -> f64 {
    1.77
}

const fn default_p_twins() -> f64 {
    0.011
}

const fn default_p_triplets() -> f64 {
    0.000_13
}

#[allow(clippy::cast_precision_loss)]
fn default_gestation_mean() -> f64 {
    (9 * MONTH) as f64
}

#[allow(clippy::cast_precision_loss)]
fn default_gestation_std_dev() -> f64 {
    (2 * WEEK) as f64
}

const fn default_female_fertility() -> FertilityWindow {
    FertilityWindow::FEMALE
}

const fn default_male_fertility() -> FertilityWindow {
    FertilityWindow::MALE
}

const fn default_living_near() -> LivingWeights {
    LivingWeights {
        same_sex: 1.0,
        opposite_sex: 6.0,
        zombie: -4.0,
        empty: 1.0,
        wall: -2.0,
    }
}

const fn default_living_far() -> LivingWeights {
    LivingWeights {
        same_sex: 0.2,
        opposite_sex: 4.0,
        zombie: -3.0,
        empty: 1.0,
        wall: -1.0,
    }
}

const fn default_zombie_near() -> ZombieWeights {
    ZombieWeights {
        living: 5.0,
        zombie: 1.0,
        empty: 1.5,
        wall: -2.0,
    }
}

const fn default_zombie_far() -> ZombieWeights {
    ZombieWeights {
        living: 4.0,
        zombie: 1.0,
        empty: 1.5,
        wall: -1.0,
    }
}

const fn default_fluctuation() -> f32 {
    0.35
}

const fn default_random_bearing_magnitude() -> f32 {
    0.5
}

const fn default_quotient_mean() -> f32 {
    1.0
}

const fn default_quotient_variance() -> f32 {
    0.25
}

const fn default_direction_missed() -> f64 {
    0.1
}

const fn default_direction_follow() -> f64 {
    0.65
}

const fn default_speeds() -> SpeedTable {
    SpeedTable {
        male_child: 0.64,
        male_young: 0.8,
        male_middle_age: 0.48,
        male_elderly: 0.4,
        female_ratio: 0.857_143_110_76,
        zombie_young: 0.4,
        zombie_old: 0.32,
    }
}
