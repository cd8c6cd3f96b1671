//! Demographic counters.
//!
//! [`Stats`] holds two families of fields:
//!
//! - **Gauges** (`human_females` .. `infected_females_pregnant`) describe the
//!   population seen during one tick.
//! - **Event counters** (deaths, births, infections, ...) count what happened
//!   during one tick.
//!
//! Per-column deltas are combined with [`Stats::merge`]; a run-long history
//! is kept with [`Stats::advance`], which replaces gauges and accumulates
//! events.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind, Gender};

/// Per-tick demographic statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    // --- gauges ---
    /// Living human females.
    pub human_females: u64,
    /// Living human males.
    pub human_males: u64,
    /// Living infected females.
    pub infected_females: u64,
    /// Living infected males.
    pub infected_males: u64,
    /// Zombies.
    pub zombies: u64,
    /// Human females carrying unborn children.
    pub human_females_pregnant: u64,
    /// Infected females carrying unborn children.
    pub infected_females_pregnant: u64,

    // --- events ---
    /// Human females that died.
    pub human_females_died: u64,
    /// Human males that died.
    pub human_males_died: u64,
    /// Infected females that died.
    pub infected_females_died: u64,
    /// Infected males that died.
    pub infected_males_died: u64,
    /// Zombies that decomposed.
    pub zombies_decomposed: u64,
    /// Human girls born.
    pub human_females_born: u64,
    /// Human boys born.
    pub human_males_born: u64,
    /// Infected girls born.
    pub infected_females_born: u64,
    /// Infected boys born.
    pub infected_males_born: u64,
    /// Human mothers that gave birth.
    pub human_females_giving_birth: u64,
    /// Infected mothers that gave birth.
    pub infected_females_giving_birth: u64,
    /// Couples that mated.
    pub couples_making_love: u64,
    /// Children conceived.
    pub children_conceived: u64,
    /// Human females that became infected.
    pub human_females_became_infected: u64,
    /// Human males that became infected.
    pub human_males_became_infected: u64,
    /// Infected females that turned into zombies.
    pub infected_females_became_zombies: u64,
    /// Infected males that turned into zombies.
    pub infected_males_became_zombies: u64,
    /// Entities dropped because their ghost cell merged into an occupied
    /// interior cell.
    pub lost_in_transit: u64,
}

/// Increment a counter without overflowing.
fn bump(counter: &mut u64) {
    *counter = counter.saturating_add(1);
}

impl Stats {
    /// Field-wise sum of `other` into `self`, gauges included.
    pub fn merge(&mut self, other: &Self) {
        self.merge_gauges(other);
        self.merge_events(other);
    }

    /// Fold one tick of global stats into a run history: gauges are replaced
    /// by the tick's values, events are accumulated.
    pub fn advance(&mut self, tick: &Self) {
        self.human_females = tick.human_females;
        self.human_males = tick.human_males;
        self.infected_females = tick.infected_females;
        self.infected_males = tick.infected_males;
        self.zombies = tick.zombies;
        self.human_females_pregnant = tick.human_females_pregnant;
        self.infected_females_pregnant = tick.infected_females_pregnant;
        self.merge_events(tick);
    }

    fn merge_gauges(&mut self, o: &Self) {
        self.human_females = self.human_females.saturating_add(o.human_females);
        self.human_males = self.human_males.saturating_add(o.human_males);
        self.infected_females = self.infected_females.saturating_add(o.infected_females);
        self.infected_males = self.infected_males.saturating_add(o.infected_males);
        self.zombies = self.zombies.saturating_add(o.zombies);
        self.human_females_pregnant = self
            .human_females_pregnant
            .saturating_add(o.human_females_pregnant);
        self.infected_females_pregnant = self
            .infected_females_pregnant
            .saturating_add(o.infected_females_pregnant);
    }

    fn merge_events(&mut self, o: &Self) {
        self.human_females_died = self.human_females_died.saturating_add(o.human_females_died);
        self.human_males_died = self.human_males_died.saturating_add(o.human_males_died);
        self.infected_females_died = self
            .infected_females_died
            .saturating_add(o.infected_females_died);
        self.infected_males_died = self.infected_males_died.saturating_add(o.infected_males_died);
        self.zombies_decomposed = self.zombies_decomposed.saturating_add(o.zombies_decomposed);
        self.human_females_born = self.human_females_born.saturating_add(o.human_females_born);
        self.human_males_born = self.human_males_born.saturating_add(o.human_males_born);
        self.infected_females_born = self
            .infected_females_born
            .saturating_add(o.infected_females_born);
        self.infected_males_born = self.infected_males_born.saturating_add(o.infected_males_born);
        self.human_females_giving_birth = self
            .human_females_giving_birth
            .saturating_add(o.human_females_giving_birth);
        self.infected_females_giving_birth = self
            .infected_females_giving_birth
            .saturating_add(o.infected_females_giving_birth);
        self.couples_making_love = self.couples_making_love.saturating_add(o.couples_making_love);
        self.children_conceived = self.children_conceived.saturating_add(o.children_conceived);
        self.human_females_became_infected = self
            .human_females_became_infected
            .saturating_add(o.human_females_became_infected);
        self.human_males_became_infected = self
            .human_males_became_infected
            .saturating_add(o.human_males_became_infected);
        self.infected_females_became_zombies = self
            .infected_females_became_zombies
            .saturating_add(o.infected_females_became_zombies);
        self.infected_males_became_zombies = self
            .infected_males_became_zombies
            .saturating_add(o.infected_males_became_zombies);
        self.lost_in_transit = self.lost_in_transit.saturating_add(o.lost_in_transit);
    }

    // -----------------------------------------------------------------------
    // Aggregates
    // -----------------------------------------------------------------------

    /// Living humans.
    pub const fn humans(&self) -> u64 {
        self.human_females.saturating_add(self.human_males)
    }

    /// Living infected.
    pub const fn infected(&self) -> u64 {
        self.infected_females.saturating_add(self.infected_males)
    }

    /// Humans plus infected.
    pub const fn living(&self) -> u64 {
        self.humans().saturating_add(self.infected())
    }

    /// Every entity counted by the gauges.
    pub const fn population(&self) -> u64 {
        self.living().saturating_add(self.zombies)
    }

    /// Living entities that died.
    pub const fn deaths(&self) -> u64 {
        self.human_females_died
            .saturating_add(self.human_males_died)
            .saturating_add(self.infected_females_died)
            .saturating_add(self.infected_males_died)
    }

    /// Children born, of any kind.
    pub const fn births(&self) -> u64 {
        self.human_females_born
            .saturating_add(self.human_males_born)
            .saturating_add(self.infected_females_born)
            .saturating_add(self.infected_males_born)
    }

    /// Humans that became infected.
    pub const fn infections(&self) -> u64 {
        self.human_females_became_infected
            .saturating_add(self.human_males_became_infected)
    }

    /// Infected that turned into zombies.
    pub const fn zombifications(&self) -> u64 {
        self.infected_females_became_zombies
            .saturating_add(self.infected_males_became_zombies)
    }

    // -----------------------------------------------------------------------
    // Recording helpers
    // -----------------------------------------------------------------------

    /// Count an entity in the population gauges.
    pub fn count(&mut self, entity: &Entity) {
        match (entity.kind(), entity.gender()) {
            (EntityKind::Human, Some(Gender::Female)) => bump(&mut self.human_females),
            (EntityKind::Human, _) => bump(&mut self.human_males),
            (EntityKind::Infected, Some(Gender::Female)) => bump(&mut self.infected_females),
            (EntityKind::Infected, _) => bump(&mut self.infected_males),
            (EntityKind::Zombie, _) => bump(&mut self.zombies),
        }
    }

    /// Count the death of a living entity.
    pub fn record_death(&mut self, entity: &Entity) {
        match (entity.kind(), entity.gender()) {
            (EntityKind::Human, Some(Gender::Female)) => bump(&mut self.human_females_died),
            (EntityKind::Human, _) => bump(&mut self.human_males_died),
            (EntityKind::Infected, Some(Gender::Female)) => bump(&mut self.infected_females_died),
            (EntityKind::Infected, _) => bump(&mut self.infected_males_died),
            (EntityKind::Zombie, _) => bump(&mut self.zombies_decomposed),
        }
    }

    /// Count a decomposed zombie.
    pub fn record_decomposition(&mut self) {
        bump(&mut self.zombies_decomposed);
    }

    /// Count an Infected turning into a Zombie.
    pub fn record_zombification(&mut self, gender: Gender) {
        match gender {
            Gender::Female => bump(&mut self.infected_females_became_zombies),
            Gender::Male => bump(&mut self.infected_males_became_zombies),
        }
    }

    /// Count a Human becoming Infected.
    pub fn record_infection(&mut self, gender: Gender) {
        match gender {
            Gender::Female => bump(&mut self.human_females_became_infected),
            Gender::Male => bump(&mut self.human_males_became_infected),
        }
    }

    /// Count a newborn.
    pub fn record_birth(&mut self, child: &Entity) {
        match (child.kind(), child.gender()) {
            (EntityKind::Human, Some(Gender::Female)) => bump(&mut self.human_females_born),
            (EntityKind::Human, _) => bump(&mut self.human_males_born),
            (EntityKind::Infected, Some(Gender::Female)) => bump(&mut self.infected_females_born),
            (EntityKind::Infected | EntityKind::Zombie, _) => bump(&mut self.infected_males_born),
        }
    }

    /// Count a mother whose children are due this tick.
    pub fn record_giving_birth(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Human => bump(&mut self.human_females_giving_birth),
            EntityKind::Infected | EntityKind::Zombie => {
                bump(&mut self.infected_females_giving_birth);
            }
        }
    }

    /// Count a pregnant female that is not yet due.
    pub fn record_pregnant(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Human => bump(&mut self.human_females_pregnant),
            EntityKind::Infected | EntityKind::Zombie => bump(&mut self.infected_females_pregnant),
        }
    }

    /// Count a mating and the children it conceived.
    pub fn record_mating(&mut self, conceived: u8) {
        bump(&mut self.couples_making_love);
        self.children_conceived = self.children_conceived.saturating_add(u64::from(conceived));
    }

    /// Count an entity dropped by a ghost merge.
    pub fn record_lost(&mut self) {
        bump(&mut self.lost_in_transit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bearing::Bearing;
    use crate::entity::Living;

    fn human(gender: Gender) -> Entity {
        Entity::Human {
            living: Living {
                gender,
                origin: 0,
                fertility_start: 1,
                fertility_end: 2,
                pending_children: 0,
                children_due: 0,
            },
            bearing: Bearing::ZERO,
        }
    }

    #[test]
    fn merge_adds_every_field() {
        let mut a = Stats {
            human_females: 2,
            zombies: 1,
            human_males_died: 3,
            lost_in_transit: 1,
            ..Stats::default()
        };
        let b = Stats {
            human_females: 5,
            zombies: 4,
            human_males_died: 1,
            lost_in_transit: 2,
            ..Stats::default()
        };
        a.merge(&b);
        assert_eq!(a.human_females, 7);
        assert_eq!(a.zombies, 5);
        assert_eq!(a.human_males_died, 4);
        assert_eq!(a.lost_in_transit, 3);
    }

    #[test]
    fn advance_replaces_gauges_and_accumulates_events() {
        let mut history = Stats {
            human_females: 100,
            zombies_decomposed: 3,
            ..Stats::default()
        };
        let tick = Stats {
            human_females: 90,
            zombies_decomposed: 2,
            ..Stats::default()
        };
        history.advance(&tick);
        assert_eq!(history.human_females, 90);
        assert_eq!(history.zombies_decomposed, 5);
    }

    #[test]
    fn counting_by_kind_and_gender() {
        let mut stats = Stats::default();
        stats.count(&human(Gender::Female));
        stats.count(&human(Gender::Male));
        stats.count(&human(Gender::Male).infect(0, Bearing::ZERO));
        stats.count(&Entity::Zombie {
            became_zombie: 0,
            bearing: Bearing::ZERO,
        });
        assert_eq!(stats.humans(), 2);
        assert_eq!(stats.infected(), 1);
        assert_eq!(stats.living(), 3);
        assert_eq!(stats.population(), 4);
    }

    #[test]
    fn event_aggregates() {
        let mut stats = Stats::default();
        stats.record_death(&human(Gender::Female));
        stats.record_death(&human(Gender::Male).infect(0, Bearing::ZERO));
        stats.record_birth(&human(Gender::Female));
        stats.record_infection(Gender::Male);
        stats.record_zombification(Gender::Female);
        stats.record_mating(2);
        assert_eq!(stats.deaths(), 2);
        assert_eq!(stats.births(), 1);
        assert_eq!(stats.infections(), 1);
        assert_eq!(stats.zombifications(), 1);
        assert_eq!(stats.couples_making_love, 1);
        assert_eq!(stats.children_conceived, 2);
    }
}
