use crate::schemas::{Expense, SortKey};

pub fn compute_total(expenses: &[Expense]) -> f64 {
    expenses.iter().map(|expense| expense.amount).sum()
}

// Largest amount or most recent first
pub fn sort_for_display(expenses: &mut [Expense], key: SortKey) {
    match key {
        SortKey::Value => expenses.sort_by(|a, b| b.amount.total_cmp(&a.amount)),
        SortKey::Date => expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}

pub fn sorted_for_display(expenses: &[Expense], key: SortKey) -> Vec<Expense> {
    let mut sorted = expenses.to_vec();
    sort_for_display(&mut sorted, key);
    sorted
}
