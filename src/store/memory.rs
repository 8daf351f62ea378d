use std::sync::{Mutex, MutexGuard};

use bson::oid::ObjectId;

use super::ExpenseStore;
use crate::error::StoreError;
use crate::period::Period;
use crate::schemas::{Expense, ExpenseChanges, NewExpense};

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<Expense>,
    // Inserts succeed this many more times before the batch is cut short
    inserts_before_failure: Option<usize>,
    unavailable: bool,
}

/// Process-local store. Behaves like an ordered batch insert: a failure part
/// way through leaves the records written so far in place.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    #[cfg(test)]
    pub(crate) fn fail_inserts_after(&self, successful_inserts: usize) {
        self.lock().inserts_before_failure = Some(successful_inserts);
    }

    #[cfg(test)]
    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records_in_group(&self, group_id: &str) -> Vec<Expense> {
        self.lock()
            .records
            .iter()
            .filter(|record| record.group_id == group_id)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave a record half written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn available(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        let state = self.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(state)
    }
}

impl ExpenseStore for MemoryStore {
    async fn insert_many(&self, records: &[NewExpense]) -> Result<Vec<Expense>, StoreError> {
        let mut state = self.available()?;
        let mut inserted = Vec::with_capacity(records.len());
        for record in records {
            if let Some(remaining) = state.inserts_before_failure.as_mut() {
                if *remaining == 0 {
                    return Err(StoreError::Unavailable(format!(
                        "insert interrupted after {} of {} records",
                        inserted.len(),
                        records.len()
                    )));
                }
                *remaining -= 1;
            }
            let expense = record.clone().with_id(ObjectId::new().to_hex());
            state.records.push(expense.clone());
            inserted.push(expense);
        }
        Ok(inserted)
    }

    async fn find_period(&self, owner: &str, period: Period) -> Result<Vec<Expense>, StoreError> {
        let state = self.available()?;
        Ok(state
            .records
            .iter()
            .filter(|record| record.owner == owner && record.belongs_to(period))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Expense>, StoreError> {
        let state = self.available()?;
        Ok(state.records.iter().find(|record| record.id == id).cloned())
    }

    async fn update(&self, id: &str, changes: &ExpenseChanges) -> Result<Option<Expense>, StoreError> {
        let mut state = self.available()?;
        Ok(state
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .map(|record| {
                changes.apply_to(record);
                record.clone()
            }))
    }

    async fn delete_cohort(&self, owner: &str, group_id: &str) -> Result<u64, StoreError> {
        let mut state = self.available()?;
        let before = state.records.len();
        state
            .records
            .retain(|record| !(record.owner == owner && record.group_id == group_id));
        Ok((before - state.records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installments::split_into_installments;
    use chrono::Utc;

    fn rent(owner: &str) -> Vec<NewExpense> {
        split_into_installments(owner, 300.0, "Rent", 3, Period::new(11, 2024).unwrap(), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn finds_only_the_owners_records_for_the_period() {
        let store = MemoryStore::new();
        store.insert_many(&rent("ana")).await.unwrap();
        store.insert_many(&rent("bruno")).await.unwrap();

        let january = store.find_period("ana", Period::new(0, 2025).unwrap()).await.unwrap();
        assert_eq!(january.len(), 1);
        assert_eq!(january[0].owner, "ana");
        assert_eq!(january[0].description, "Rent - Parcela 2/3");
    }

    #[tokio::test]
    async fn interrupted_batch_keeps_what_was_written() {
        let store = MemoryStore::new();
        store.fail_inserts_after(2);
        let records = rent("ana");
        assert!(store.insert_many(&records).await.is_err());
        assert_eq!(store.records_in_group(&records[0].group_id).len(), 2);
    }

    #[tokio::test]
    async fn cohort_delete_spares_other_owners() {
        let store = MemoryStore::new();
        let mut records = rent("ana");
        let mut shared = records[0].clone();
        shared.owner = "bruno".to_string();
        records.push(shared);
        store.insert_many(&records).await.unwrap();

        let deleted = store.delete_cohort("ana", &records[0].group_id).await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let result = store.find_period("ana", Period::new(0, 2025).unwrap()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
