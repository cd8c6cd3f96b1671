//! Life-stage transitions of a single entity.
//!
//! Everything here is a pure function of an entity, its neighbourhood in
//! the current generation, and a [`RandomSource`]. The step engine decides
//! where results are written and records the statistics.
//!
//! The per-tick order is fixed:
//! 1. death of a Human or Infected,
//! 2. decomposition of a Zombie,
//! 3. an Infected turning,
//! 4. a Human getting infected by adjacent zombies,
//! 5. a due mother giving birth,
//! 6. a fertile female mating with an adjacent fertile male.
//!
//! Rules 1 to 3 form [`natural_fate`]; 4 to 6 run during movement.

use apocalypse_types::{
    Bearing, CARDINAL, CARDINAL_PERMUTATIONS, Entity, EntityKind, Gender, Living, Stats, Tick,
};
use apocalypse_world::{Cell, GridView};

use crate::config::{BirthPolicy, FertilityWindow, LifecycleConfig};
use crate::random::{RandomSource, pick, random_bearing};
use crate::rates::{
    CHILD_YOUNG_BORDER, ELDERLY_PERIOD, MIDDLE_AGE_ELDERLY_BORDER, YOUNG_MIDDLE_AGE_BORDER,
    death_rate, decomposition_rate,
};

/// Share of the seeded population in each age band.
const CHILD_SHARE: f64 = 0.182;
const YOUNG_SHARE: f64 = 0.318;
const MIDDLE_AGE_SHARE: f64 = 0.356;

const YOUNG_PERIOD: Tick = YOUNG_MIDDLE_AGE_BORDER - CHILD_YOUNG_BORDER;
const MIDDLE_AGE_PERIOD: Tick = MIDDLE_AGE_ELDERLY_BORDER - YOUNG_MIDDLE_AGE_BORDER;

/// Truncate a drawn duration to whole ticks.
#[allow(clippy::cast_possible_truncation)]
const fn to_ticks(value: f64) -> Tick {
    value as Tick
}

#[allow(clippy::cast_precision_loss)]
const fn as_f64(ticks: Tick) -> f64 {
    ticks as f64
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Draw a fertility window: start at least one tick, end no earlier than
/// the start.
fn draw_fertility<R: RandomSource + ?Sized>(
    rng: &mut R,
    window: &FertilityWindow,
) -> (Tick, Tick) {
    let start = to_ticks(rng.gaussian(window.start_mean, window.start_std_dev)).max(1);
    let end = to_ticks(rng.gaussian(window.end_mean, window.end_std_dev)).max(start);
    (start, end)
}

/// A Human for the initial population, with an age drawn from the
/// population pyramid and possibly already pregnant.
pub fn new_human<R: RandomSource + ?Sized>(
    rng: &mut R,
    now: Tick,
    config: &LifecycleConfig,
    bearing_magnitude: f32,
) -> Entity {
    let band = rng.uniform();
    let within = rng.uniform();
    let (border, period) = if band < CHILD_SHARE {
        (0, CHILD_YOUNG_BORDER)
    } else if band < CHILD_SHARE + YOUNG_SHARE {
        (CHILD_YOUNG_BORDER, YOUNG_PERIOD)
    } else if band < CHILD_SHARE + YOUNG_SHARE + MIDDLE_AGE_SHARE {
        (YOUNG_MIDDLE_AGE_BORDER, MIDDLE_AGE_PERIOD)
    } else {
        (MIDDLE_AGE_ELDERLY_BORDER, ELDERLY_PERIOD)
    };
    let age = border.saturating_add(to_ticks(within * as_f64(period)));
    let origin = now.saturating_sub(age);

    let gender = if rng.uniform() < config.female_ratio_initial {
        Gender::Female
    } else {
        Gender::Male
    };
    let window = match gender {
        Gender::Female => &config.female_fertility,
        Gender::Male => &config.male_fertility,
    };
    let (fertility_start, fertility_end) = draw_fertility(rng, window);

    let mut living = Living {
        gender,
        origin,
        fertility_start,
        fertility_end,
        pending_children: 0,
        children_due: 0,
    };
    if living.is_female()
        && living.is_fertile(now)
        && rng.uniform() < config.initial_pregnancy_probability()
    {
        let count = child_count(rng, config);
        let gestation = rng.gaussian(config.gestation_mean, config.gestation_std_dev);
        // Somewhere between conception and delivery.
        let remaining = (1.0 - rng.uniform()) * gestation;
        living.pending_children = count;
        living.children_due = now.saturating_add(to_ticks(remaining).max(1));
    }

    Entity::Human {
        living,
        bearing: random_bearing(rng, bearing_magnitude),
    }
}

/// A Zombie that turned at `now`.
pub fn new_zombie<R: RandomSource + ?Sized>(
    rng: &mut R,
    now: Tick,
    bearing_magnitude: f32,
) -> Entity {
    Entity::Zombie {
        became_zombie: now,
        bearing: random_bearing(rng, bearing_magnitude),
    }
}

// ---------------------------------------------------------------------------
// Pass one: death, decomposition, turning
// ---------------------------------------------------------------------------

/// Outcome of [`natural_fate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    /// Nothing happened.
    Unchanged,
    /// A Human or Infected died and must be removed.
    Died,
    /// A Zombie decomposed and must be removed.
    Decomposed,
    /// An Infected turned; the entity is now a Zombie.
    Turned(Gender),
}

/// Apply death, decomposition and turning to `entity`, in that order.
///
/// On [`Fate::Turned`] the entity has already been replaced by a Zombie
/// with a fresh bearing.
pub fn natural_fate<R: RandomSource + ?Sized>(
    rng: &mut R,
    entity: &mut Entity,
    now: Tick,
    config: &LifecycleConfig,
    bearing_magnitude: f32,
) -> Fate {
    match entity {
        Entity::Zombie { became_zombie, .. } => {
            if rng.uniform() < decomposition_rate(*became_zombie, now, config) {
                Fate::Decomposed
            } else {
                Fate::Unchanged
            }
        }
        Entity::Human { living, .. } | Entity::Infected { living, .. } => {
            if rng.uniform() < death_rate(living, now, config) {
                return Fate::Died;
            }
            let gender = living.gender;
            if entity.kind() == EntityKind::Infected && rng.uniform() < config.p_become_zombie {
                let bearing = random_bearing(rng, bearing_magnitude);
                *entity = entity.zombify(now, bearing);
                return Fate::Turned(gender);
            }
            Fate::Unchanged
        }
    }
}

// ---------------------------------------------------------------------------
// Pass two: infection, birth, mating
// ---------------------------------------------------------------------------

/// Zombies among the four cardinal neighbours of `(x, y)`.
pub fn adjacent_zombies(view: &GridView<'_>, x: usize, y: usize) -> u32 {
    let mut zombies = 0_u32;
    for direction in CARDINAL {
        let is_zombie = view
            .toward(x, y, direction)
            .and_then(Cell::entity)
            .is_some_and(Entity::is_zombie);
        if is_zombie {
            zombies = zombies.saturating_add(1);
        }
    }
    zombies
}

/// Infect a Human with probability `zombies * p_infection`.
///
/// Returns the gender of the newly infected, or `None` if nothing
/// changed. Non-humans are left alone and draw nothing.
pub fn try_infect<R: RandomSource + ?Sized>(
    rng: &mut R,
    entity: &mut Entity,
    zombies: u32,
    now: Tick,
    config: &LifecycleConfig,
    bearing_magnitude: f32,
) -> Option<Gender> {
    let Entity::Human { living, .. } = entity else {
        return None;
    };
    let gender = living.gender;
    let chance = f64::from(zombies) * config.p_infection;
    if rng.uniform() < chance {
        let bearing = random_bearing(rng, bearing_magnitude);
        *entity = entity.infect(now, bearing);
        Some(gender)
    } else {
        None
    }
}

/// Deliver one child of a pregnant mother, decrementing her pending count.
///
/// Children of Infected mothers are Infected. Returns `None` if the mother
/// carries nothing.
pub fn give_birth<R: RandomSource + ?Sized>(
    rng: &mut R,
    mother: &mut Entity,
    now: Tick,
    config: &LifecycleConfig,
) -> Option<Entity> {
    let kind = mother.kind();
    let living = mother.living_mut()?;
    if living.pending_children == 0 {
        return None;
    }
    living.pending_children = living.pending_children.saturating_sub(1);

    let gender = if rng.uniform() < config.female_ratio_at_birth {
        Gender::Female
    } else {
        Gender::Male
    };
    let window = match gender {
        Gender::Female => &config.female_fertility,
        Gender::Male => &config.male_fertility,
    };
    let (fertility_start, fertility_end) = draw_fertility(rng, window);
    let child = Living {
        gender,
        origin: now,
        fertility_start,
        fertility_end,
        pending_children: 0,
        children_due: 0,
    };
    Some(match kind {
        EntityKind::Infected => Entity::Infected {
            living: child,
            infected_since: now,
            bearing: Bearing::ZERO,
        },
        EntityKind::Human | EntityKind::Zombie => Entity::Human {
            living: child,
            bearing: Bearing::ZERO,
        },
    })
}

/// Number of children of one conception: twins and triplets with their
/// configured probabilities, otherwise one.
pub fn child_count<R: RandomSource + ?Sized>(rng: &mut R, config: &LifecycleConfig) -> u8 {
    let single = 1.0 - config.p_twins - config.p_triplets;
    let u = rng.uniform();
    if u < single {
        1
    } else if u < single + config.p_twins {
        2
    } else {
        3
    }
}

/// Start a pregnancy: draw the number of children and the due tick.
/// Returns the number conceived.
pub fn conceive<R: RandomSource + ?Sized>(
    rng: &mut R,
    mother: &mut Living,
    now: Tick,
    config: &LifecycleConfig,
) -> u8 {
    let count = child_count(rng, config);
    let gestation = to_ticks(rng.gaussian(config.gestation_mean, config.gestation_std_dev));
    mother.pending_children = count;
    mother.children_due = now.saturating_add(gestation.max(1));
    count
}

/// Probability that a mating conceives, under the configured policy.
///
/// `history` holds the latest global population and the events
/// accumulated over the run; `area` is the global number of cells.
#[allow(clippy::cast_precision_loss)]
pub fn conception_probability(config: &LifecycleConfig, history: &Stats, area: usize) -> f64 {
    let density_ratio = || {
        let living = history.living().max(1) as f64;
        let density = living / (area.max(1) as f64);
        config.target_density / density
    };
    let probability = match config.birth_policy {
        BirthPolicy::Uncontrolled => config.p_fertilization,
        BirthPolicy::EqualReplacement => {
            let couples = history.couples_making_love;
            if couples == 0 {
                1.0
            } else {
                let lost = history.deaths().saturating_add(history.zombifications());
                lost as f64 / couples as f64
            }
        }
        BirthPolicy::DensityLinear => config.p_fertilization * density_ratio(),
        BirthPolicy::DensityPower => {
            let ratio = density_ratio();
            config.p_fertilization * ratio.powf(ratio * config.situation_awareness)
        }
    };
    tracing::debug!(
        policy = ?config.birth_policy,
        living = history.living(),
        probability,
        "conception probability"
    );
    probability
}

/// Whether a cardinal neighbour of `(x, y)` is a fertile male. Neighbours
/// are visited in a random order.
pub fn has_fertile_partner<R: RandomSource + ?Sized>(
    rng: &mut R,
    view: &GridView<'_>,
    x: usize,
    y: usize,
    now: Tick,
) -> bool {
    let Some(order) = CARDINAL_PERMUTATIONS.get(pick(rng, CARDINAL_PERMUTATIONS.len())) else {
        return false;
    };
    order.iter().any(|&direction| {
        view.toward(x, y, direction)
            .and_then(Cell::entity)
            .and_then(Entity::living)
            .is_some_and(|living| living.gender == Gender::Male && living.is_fertile(now))
    })
}

/// Whether `entity` is a fertile, non-pregnant female that may look for a
/// partner.
pub fn can_conceive(entity: &Entity, now: Tick) -> bool {
    entity
        .living()
        .is_some_and(|living| living.is_female() && !living.is_pregnant() && living.is_fertile(now))
}

/// Mate with probability `probability`. Returns the number of children
/// conceived, zero when the mating is unsuccessful.
pub fn mate<R: RandomSource + ?Sized>(
    rng: &mut R,
    mother: &mut Entity,
    now: Tick,
    probability: f64,
    config: &LifecycleConfig,
) -> u8 {
    let Some(living) = mother.living_mut() else {
        return 0;
    };
    if rng.uniform() < probability {
        conceive(rng, living, now, config)
    } else {
        0
    }
}
