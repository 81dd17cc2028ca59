//! Driver duty eligibility.
//!
//! A driver may take an order only when every rule below holds. Rules are
//! evaluated independently and in a fixed order, so the caller always gets
//! the complete list of blocking reasons from one call.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::driver::{BackgroundCheckStatus, Driver};
use crate::models::order::DeliveryOrder;

/// A single rule that failed for a driver/order pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFailure {
    DocumentsNotVerified,
    AccountNotVerified,
    NotAvailable,
    AccountNotActive,
    BackgroundCheck(BackgroundCheckStatus),
    WarehouseMismatch,
}

impl RuleFailure {
    /// Stable label used for metrics.
    pub fn rule(&self) -> &'static str {
        match self {
            RuleFailure::DocumentsNotVerified => "documents_verified",
            RuleFailure::AccountNotVerified => "account_verified",
            RuleFailure::NotAvailable => "available",
            RuleFailure::AccountNotActive => "active",
            RuleFailure::BackgroundCheck(_) => "background_check",
            RuleFailure::WarehouseMismatch => "same_warehouse",
        }
    }
}

impl fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleFailure::DocumentsNotVerified => f.write_str("Documents not verified"),
            RuleFailure::AccountNotVerified => f.write_str("Account not verified"),
            RuleFailure::NotAvailable => f.write_str("Not available"),
            RuleFailure::AccountNotActive => f.write_str("Account not active"),
            RuleFailure::BackgroundCheck(status) => {
                write!(f, "Background check {status} (must be approved)")
            }
            RuleFailure::WarehouseMismatch => {
                f.write_str("Can't get this order (driver & order must be same where house)")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl From<&[RuleFailure]> for EligibilityResult {
    fn from(failures: &[RuleFailure]) -> Self {
        Self {
            is_valid: failures.is_empty(),
            errors: failures.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EligibilityError {
    #[error("driver is required to evaluate eligibility")]
    MissingDriver,

    #[error("order is required to evaluate eligibility")]
    MissingOrder,
}

/// Returns every failed rule, in evaluation order.
pub fn check(driver: &Driver, order: &DeliveryOrder) -> Vec<RuleFailure> {
    let mut failures = Vec::new();

    if !driver.is_document_verified {
        failures.push(RuleFailure::DocumentsNotVerified);
    }
    if !driver.is_account_verified {
        failures.push(RuleFailure::AccountNotVerified);
    }
    if !driver.is_available {
        failures.push(RuleFailure::NotAvailable);
    }
    if !driver.is_active {
        failures.push(RuleFailure::AccountNotActive);
    }
    if driver.background_check_status != BackgroundCheckStatus::Approved {
        failures.push(RuleFailure::BackgroundCheck(driver.background_check_status));
    }
    if driver.warehouse_id != order.warehouse_id {
        failures.push(RuleFailure::WarehouseMismatch);
    }

    failures
}

pub fn evaluate(driver: &Driver, order: &DeliveryOrder) -> EligibilityResult {
    EligibilityResult::from(check(driver, order).as_slice())
}

/// Like [`check`], but for lookups that may have come back empty.
pub fn check_records(
    driver: Option<&Driver>,
    order: Option<&DeliveryOrder>,
) -> Result<Vec<RuleFailure>, EligibilityError> {
    let driver = driver.ok_or(EligibilityError::MissingDriver)?;
    let order = order.ok_or(EligibilityError::MissingOrder)?;
    Ok(check(driver, order))
}

pub fn evaluate_records(
    driver: Option<&Driver>,
    order: Option<&DeliveryOrder>,
) -> Result<EligibilityResult, EligibilityError> {
    check_records(driver, order).map(|failures| EligibilityResult::from(failures.as_slice()))
}
