use tracing::{error, warn};

use crate::aggregation::{compute_total, sorted_for_display};
use crate::error::TrackerError;
use crate::period::Period;
use crate::schemas::{Expense, SortKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    pub period: Period,
    sequence: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Stale,
    Failed,
}

// Only the newest fetch ticket gets applied
#[derive(Clone, Debug)]
pub struct WorkingSet {
    period: Period,
    sort: SortKey,
    expenses: Vec<Expense>,
    latest: u64,
}

impl WorkingSet {
    pub fn new(period: Period) -> WorkingSet {
        WorkingSet {
            period,
            sort: SortKey::default(),
            expenses: Vec::new(),
            latest: 0,
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
    }

    pub fn refresh(&mut self) -> FetchTicket {
        self.latest += 1;
        FetchTicket {
            period: self.period,
            sequence: self.latest,
        }
    }

    /// `None` leaves the period unchanged when it would run past the supported years.
    pub fn navigate(&mut self, delta: i32) -> Option<FetchTicket> {
        let Some(period) = self.period.advance(delta) else {
            warn!("Cannot move {} month(s) from {}/{}", delta, self.period.month + 1, self.period.year);
            return None;
        };
        self.period = period;
        Some(self.refresh())
    }

    pub fn apply(&mut self, ticket: FetchTicket, result: Result<Vec<Expense>, TrackerError>) -> ApplyOutcome {
        if ticket.sequence != self.latest {
            warn!(
                "Discarding stale expenses for {}/{}",
                ticket.period.month + 1,
                ticket.period.year
            );
            return ApplyOutcome::Stale;
        }
        match result {
            Ok(expenses) => {
                self.expenses = expenses;
                ApplyOutcome::Applied
            }
            Err(err) => {
                error!("Error fetching expenses: {}", err);
                ApplyOutcome::Failed
            }
        }
    }

    /// Adds freshly created records that fall in the month on display.
    pub fn absorb_created(&mut self, created: &[Expense]) {
        let period = self.period;
        self.expenses
            .extend(created.iter().filter(|expense| expense.belongs_to(period)).cloned());
    }

    pub fn replace(&mut self, updated: Expense) {
        if let Some(slot) = self.expenses.iter_mut().find(|expense| expense.id == updated.id) {
            *slot = updated;
        }
    }

    pub fn remove_cohort(&mut self, group_id: &str) {
        self.expenses.retain(|expense| expense.group_id != group_id);
    }

    pub fn total(&self) -> f64 {
        compute_total(&self.expenses)
    }

    pub fn sorted(&self) -> Vec<Expense> {
        sorted_for_display(&self.expenses, self.sort)
    }
}
