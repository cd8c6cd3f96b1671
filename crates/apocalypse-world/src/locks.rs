//! Column-window locking for concurrent writes into the next generation.
//!
//! Each grid column sits behind its own mutex. A worker processing column
//! `x` only ever writes into columns `x - 1 ..= x + 1` (movement and births
//! reach one cell), so it locks exactly that window. A tile that wraps onto
//! itself horizontally also writes into the interior column on the far
//! side, which then joins the window. Locks are always taken in ascending
//! column order, which rules out deadlock between workers, and released
//! together when the [`ColumnWindow`] guard is dropped.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cell::Cell;

/// One column of cells, top to bottom.
pub type Column = Vec<Cell>;

/// Lock a single column, recovering the data of a poisoned lock.
pub(crate) fn lock(column: &Mutex<Column>) -> MutexGuard<'_, Column> {
    column.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive access to a set of columns, usually `center - 1 ..= center + 1`.
#[derive(Debug)]
pub struct ColumnWindow<'a> {
    guards: Vec<(usize, MutexGuard<'a, Column>)>,
}

impl<'a> ColumnWindow<'a> {
    /// Lock the window around `center`, left to right.
    ///
    /// Returns `None` if the window does not fit inside `columns`.
    pub fn acquire(columns: &'a [Mutex<Column>], center: usize) -> Option<Self> {
        let first = center.checked_sub(1)?;
        let last = center.checked_add(1)?;
        Self::acquire_all(columns, first..=last)
    }

    /// Lock every column in `indices`, in ascending order whatever order
    /// they are given in. Duplicates are locked once.
    ///
    /// Returns `None` if an index lies outside `columns`.
    pub fn acquire_all(
        columns: &'a [Mutex<Column>],
        indices: impl IntoIterator<Item = usize>,
    ) -> Option<Self> {
        let mut indices: Vec<usize> = indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        if indices.iter().any(|&x| x >= columns.len()) {
            return None;
        }
        let guards = indices
            .into_iter()
            .filter_map(|x| columns.get(x).map(|column| (x, lock(column))))
            .collect();
        Some(Self { guards })
    }

    /// Leftmost locked column.
    pub fn first(&self) -> Option<usize> {
        self.guards.first().map(|(x, _)| *x)
    }

    /// Indices of the locked columns, ascending.
    pub fn columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.guards.iter().map(|(x, _)| *x)
    }

    /// The column at absolute index `x`, if it is inside the window.
    pub fn column(&self, x: usize) -> Option<&Column> {
        self.guards
            .iter()
            .find(|(index, _)| *index == x)
            .map(|(_, guard)| &**guard)
    }

    /// Shared access to the cell at `(x, y)`.
    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.column(x)?.get(y)
    }

    /// Exclusive access to the cell at `(x, y)`.
    pub fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        self.guards
            .iter_mut()
            .find(|(index, _)| *index == x)?
            .1
            .get_mut(y)
    }

    /// Whether `(x, y)` is inside the window and unoccupied.
    pub fn is_empty(&self, x: usize, y: usize) -> bool {
        self.cell(x, y).is_some_and(Cell::is_empty)
    }
}
