//! Simulation time.
//!
//! One tick is one day. Ticks are signed because the initial population is
//! seeded with birth ticks in the past (before tick 0).

/// A point in simulation time, measured in days.
pub type Tick = i64;

/// Ticks in one day.
pub const DAY: Tick = 1;

/// Ticks in one week.
pub const WEEK: Tick = 7 * DAY;

/// Ticks in one (30-day) month.
pub const MONTH: Tick = 30 * DAY;

/// Ticks in one (365-day) year.
pub const YEAR: Tick = 365 * DAY;
