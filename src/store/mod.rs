use crate::error::StoreError;
use crate::period::Period;
use crate::schemas::{Expense, ExpenseChanges, NewExpense};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[allow(async_fn_in_trait)]
pub trait ExpenseStore {
    /// Creates every record in one batch, returning them with their ids in
    /// input order.
    async fn insert_many(&self, records: &[NewExpense]) -> Result<Vec<Expense>, StoreError>;

    async fn find_period(&self, owner: &str, period: Period) -> Result<Vec<Expense>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Expense>, StoreError>;

    /// Returns the updated record, or `None` if `id` is unknown.
    async fn update(&self, id: &str, changes: &ExpenseChanges) -> Result<Option<Expense>, StoreError>;

    /// Deletes every record of `owner` tagged with `group_id`.
    async fn delete_cohort(&self, owner: &str, group_id: &str) -> Result<u64, StoreError>;
}
