use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::period::Period;

pub type Owner = String;

/// A persisted expense. Installments of one submission share `group_id`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    pub id: String,
    pub owner: Owner,
    pub amount: f64,
    pub description: String,
    pub month: u32,
    pub year: i32,
    pub created_at: DateTime<Utc>,
    pub group_id: String,
}

/// An expense that has not been given an id by the store yet.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NewExpense {
    pub owner: Owner,
    pub amount: f64,
    pub description: String,
    pub month: u32,
    pub year: i32,
    pub created_at: DateTime<Utc>,
    pub group_id: String,
}

impl NewExpense {
    pub fn with_id(self, id: String) -> Expense {
        Expense {
            id,
            owner: self.owner,
            amount: self.amount,
            description: self.description,
            month: self.month,
            year: self.year,
            created_at: self.created_at,
            group_id: self.group_id,
        }
    }
}

impl Expense {
    pub fn belongs_to(&self, period: Period) -> bool {
        self.month == period.month && self.year == period.year
    }
}

/// Form input for a new expense, possibly paid in installments.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Submission {
    pub amount: f64,
    pub description: String,
    #[serde(default = "default_installments")]
    pub installments: u32,
    pub month: u32,
    pub year: i32,
}

fn default_installments() -> u32 {
    1
}

/// Partial replacement of an expense's editable fields.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ExpenseChanges {
    pub amount: Option<f64>,
    pub description: Option<String>,
}

impl ExpenseChanges {
    pub fn apply_to(&self, expense: &mut Expense) {
        if let Some(amount) = self.amount {
            expense.amount = amount;
        }
        if let Some(description) = &self.description {
            expense.description = description.clone();
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Value,
    Date,
}
