use bson::oid::ObjectId;
use chrono::{DateTime, Utc};

use crate::error::TrackerError;
use crate::period::Period;
use crate::schemas::{NewExpense, Submission};

/// Ten years of monthly payments.
pub const MAX_INSTALLMENTS: u32 = 120;

pub fn validate_submission(submission: &Submission) -> Result<Period, TrackerError> {
    let start = Period::new(submission.month, submission.year)
        .ok_or_else(|| TrackerError::Validation("month must be between 0 and 11".to_string()))?;
    check_installments(
        submission.amount,
        &submission.description,
        submission.installments,
        start,
    )?;
    Ok(start)
}

fn check_installments(
    amount: f64,
    description: &str,
    installment_count: u32,
    start: Period,
) -> Result<(), TrackerError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(TrackerError::Validation(
            "amount must be a positive number".to_string(),
        ));
    }
    if description.trim().is_empty() {
        return Err(TrackerError::Validation(
            "description cannot be empty".to_string(),
        ));
    }
    if installment_count == 0 || installment_count > MAX_INSTALLMENTS {
        return Err(TrackerError::Validation(format!(
            "installments must be between 1 and {}",
            MAX_INSTALLMENTS
        )));
    }
    // The last installment must still have a representable year
    if start.advance(installment_count as i32 - 1).is_none() {
        return Err(TrackerError::Validation(
            "installments run past the last supported year".to_string(),
        ));
    }
    Ok(())
}

/// Fresh cohort identifier. ObjectIds embed a per-process random value and
/// a counter, so two submissions in the same second still differ.
pub fn new_group_id() -> String {
    ObjectId::new().to_hex()
}

pub fn split_into_installments(
    owner: &str,
    amount: f64,
    description: &str,
    installment_count: u32,
    start: Period,
    created_at: DateTime<Utc>,
) -> Result<Vec<NewExpense>, TrackerError> {
    check_installments(amount, description, installment_count, start)?;
    let group_id = new_group_id();
    let installment_amount = amount / installment_count as f64;

    let mut records = Vec::with_capacity(installment_count as usize);
    let mut period = start;
    for i in 0..installment_count {
        if i > 0 {
            period = period.next().ok_or_else(|| {
                TrackerError::Validation("installments run past the last supported year".to_string())
            })?;
        }
        records.push(NewExpense {
            owner: owner.to_string(),
            amount: installment_amount,
            description: format!("{} - Parcela {}/{}", description, i + 1, installment_count),
            month: period.month,
            year: period.year,
            created_at,
            group_id: group_id.clone(),
        });
    }
    Ok(records)
}

/// Validates the form input and expands it into its installments.
pub fn expand_submission(
    owner: &str,
    submission: &Submission,
    created_at: DateTime<Utc>,
) -> Result<Vec<NewExpense>, TrackerError> {
    let start = validate_submission(submission)?;
    split_into_installments(
        owner,
        submission.amount,
        submission.description.trim(),
        submission.installments,
        start,
        created_at,
    )
}
