use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Client, Collection, IndexModel,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ExpenseStore;
use crate::error::StoreError;
use crate::period::Period;
use crate::schemas::{Expense, ExpenseChanges, NewExpense};

const COLLECTION: &str = "Expenses";

#[derive(Clone, Debug, Deserialize, Serialize)]
struct ExpenseDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    owner: String,
    amount: f64,
    description: String,
    month: i32,
    year: i32,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    group_id: String,
}

impl ExpenseDocument {
    fn from_new(id: ObjectId, record: &NewExpense) -> ExpenseDocument {
        ExpenseDocument {
            id,
            owner: record.owner.clone(),
            amount: record.amount,
            description: record.description.clone(),
            month: record.month as i32,
            year: record.year,
            created_at: record.created_at,
            group_id: record.group_id.clone(),
        }
    }
}

impl From<ExpenseDocument> for Expense {
    fn from(document: ExpenseDocument) -> Expense {
        Expense {
            id: document.id.to_hex(),
            owner: document.owner,
            amount: document.amount,
            description: document.description,
            month: document.month as u32,
            year: document.year,
            created_at: document.created_at,
            group_id: document.group_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MongoStore {
    expenses: Collection<ExpenseDocument>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<MongoStore, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let store = MongoStore {
            expenses: client.database(database).collection(COLLECTION),
        };
        store.ensure_indexes().await?;
        info!("Connected to database {}", database);
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "owner": 1, "year": 1, "month": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "owner": 1, "group_id": 1 })
                .build(),
        ];
        self.expenses.create_indexes(indexes, None).await?;
        Ok(())
    }
}

impl ExpenseStore for MongoStore {
    async fn insert_many(&self, records: &[NewExpense]) -> Result<Vec<Expense>, StoreError> {
        let documents: Vec<ExpenseDocument> = records
            .iter()
            .map(|record| ExpenseDocument::from_new(ObjectId::new(), record))
            .collect();
        self.expenses.insert_many(&documents, None).await?;
        Ok(documents.into_iter().map(Expense::from).collect())
    }

    async fn find_period(&self, owner: &str, period: Period) -> Result<Vec<Expense>, StoreError> {
        let month = period.month as i32;
        let year = period.year;
        let cursor = self
            .expenses
            .find(doc! { "owner": owner, "month": month, "year": year }, None)
            .await?;
        let documents: Vec<ExpenseDocument> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(Expense::from).collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Expense>, StoreError> {
        let Ok(id) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        let document = self.expenses.find_one(doc! { "_id": id }, None).await?;
        Ok(document.map(Expense::from))
    }

    async fn update(&self, id: &str, changes: &ExpenseChanges) -> Result<Option<Expense>, StoreError> {
        let Ok(object_id) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        let mut set = Document::new();
        if let Some(amount) = changes.amount {
            set.insert("amount", amount);
        }
        if let Some(description) = &changes.description {
            set.insert("description", description.as_str());
        }
        if set.is_empty() {
            return self.find_by_id(id).await;
        }
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let document = self
            .expenses
            .find_one_and_update(doc! { "_id": object_id }, doc! { "$set": set }, options)
            .await?;
        Ok(document.map(Expense::from))
    }

    async fn delete_cohort(&self, owner: &str, group_id: &str) -> Result<u64, StoreError> {
        let result = self
            .expenses
            .delete_many(doc! { "owner": owner, "group_id": group_id }, None)
            .await?;
        Ok(result.deleted_count)
    }
}
