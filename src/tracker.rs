use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::TrackerError;
use crate::installments::expand_submission;
use crate::period::Period;
use crate::schemas::{Expense, ExpenseChanges, Submission};
use crate::store::ExpenseStore;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DeletedCohort {
    pub group_id: String,
    pub deleted: u64,
}

/// Expense operations on behalf of an explicit owner.
pub struct ExpenseTracker<S> {
    store: S,
}

impl<S: ExpenseStore> ExpenseTracker<S> {
    pub fn new(store: S) -> ExpenseTracker<S> {
        ExpenseTracker { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists every installment of the submission, or none of them.
    pub async fn add_expense(&self, owner: &str, submission: &Submission) -> Result<Vec<Expense>, TrackerError> {
        let records = expand_submission(owner, submission, Utc::now()).map_err(|err| {
            warn!("Rejected expense from {}: {}", owner, err);
            err
        })?;
        let group_id = records[0].group_id.clone();

        match self.store.insert_many(&records).await {
            Ok(created) => {
                info!("Created {} installment(s) in group {} for {}", created.len(), group_id, owner);
                Ok(created)
            }
            Err(err) => {
                error!("Error adding expense group {}: {}", group_id, err);
                // Undo whatever part of the batch made it in
                if let Err(cleanup) = self.store.delete_cohort(owner, &group_id).await {
                    error!("Could not remove partial group {}: {}", group_id, cleanup);
                }
                Err(err.into())
            }
        }
    }

    pub async fn fetch_period(&self, owner: &str, period: Period) -> Result<Vec<Expense>, TrackerError> {
        self.store.find_period(owner, period).await.map_err(|err| {
            error!("Error fetching expenses for {} in {}/{}: {}", owner, period.month + 1, period.year, err);
            err.into()
        })
    }

    /// Edits a single installment. Siblings in the group are left alone.
    pub async fn update_record(
        &self,
        owner: &str,
        id: &str,
        changes: &ExpenseChanges,
    ) -> Result<Expense, TrackerError> {
        validate_changes(changes)?;
        self.resolve_owned(owner, id).await?;

        let updated = self.store.update(id, changes).await.map_err(|err| {
            error!("Error updating expense {}: {}", id, err);
            TrackerError::from(err)
        })?;
        updated.ok_or_else(|| TrackerError::NotFound(id.to_string()))
    }

    /// Deletes the record at `id` together with every installment of its group.
    pub async fn delete_cohort(&self, owner: &str, id: &str) -> Result<DeletedCohort, TrackerError> {
        let expense = self.resolve_owned(owner, id).await?;
        let deleted = self
            .store
            .delete_cohort(&expense.owner, &expense.group_id)
            .await
            .map_err(|err| {
                error!("Error removing expense group {}: {}", expense.group_id, err);
                TrackerError::from(err)
            })?;
        info!("Removed {} record(s) of group {} for {}", deleted, expense.group_id, owner);
        Ok(DeletedCohort {
            group_id: expense.group_id,
            deleted,
        })
    }

    async fn resolve_owned(&self, owner: &str, id: &str) -> Result<Expense, TrackerError> {
        let expense = self
            .store
            .find_by_id(id)
            .await
            .map_err(|err| {
                error!("Error resolving expense {}: {}", id, err);
                TrackerError::from(err)
            })?
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
        if expense.owner != owner {
            warn!("{} tried to modify expense {} owned by someone else", owner, id);
            return Err(TrackerError::Unauthorized);
        }
        Ok(expense)
    }
}

fn validate_changes(changes: &ExpenseChanges) -> Result<(), TrackerError> {
    if changes.amount.is_none() && changes.description.is_none() {
        return Err(TrackerError::Validation("nothing to update".to_string()));
    }
    if changes.amount.is_some_and(|amount| !amount.is_finite()) {
        return Err(TrackerError::Validation("amount must be a number".to_string()));
    }
    if changes
        .description
        .as_deref()
        .is_some_and(|description| description.trim().is_empty())
    {
        return Err(TrackerError::Validation("description cannot be empty".to_string()));
    }
    Ok(())
}
