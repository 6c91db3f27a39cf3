//! Validation and reconciliation of extraction results
//!
//! Model output is untrusted. `validate` enforces the structural rules that
//! make a result usable and rejects anything that breaks them:
//!
//! 1. `currency` is exactly three characters
//! 2. a result carrying `errorText` has no items
//! 3. every additional cost has a non-blank name and a non-negative amount
//!
//! followed by item- and total-level sanity (non-blank names, positive
//! quantities, non-negative finite prices and totals).
//!
//! Arithmetic reconciliation is advisory only. Receipts routinely contain
//! rounding and charges that don't decompose into line items, so a total that
//! disagrees with the itemized sum produces a [`Diagnostic`] and a log line,
//! never a rejection.

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{ExtractionResult, PROCESSING_ERROR};

/// Allowed drift between the itemized total and the reported total
pub const TOTAL_TOLERANCE: f64 = 0.01;

/// A structural rule the extraction result broke
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("invalid currency format: {value:?}")]
    InvalidCurrency { value: String },

    #[error("items present alongside error ({count} items)")]
    ItemsWithError { count: usize },

    #[error("invalid additional cost at index {index} ({name:?}): {reason}")]
    InvalidAdditionalCost {
        index: usize,
        name: String,
        reason: String,
    },

    #[error("invalid item at index {index} ({name:?}): {reason}")]
    InvalidItem {
        index: usize,
        name: String,
        reason: String,
    },

    #[error("invalid total price: {value}")]
    InvalidTotal { value: f64 },
}

/// Non-fatal observation about an accepted result
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Itemized total and reported total differ by more than a cent
    TotalMismatch {
        calculated: f64,
        reported: f64,
        difference: f64,
        /// Costs charged on top of the items, which often explain the drift
        excluded_extras: f64,
    },
    /// Extraction succeeded but found no items
    NoItems,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::TotalMismatch {
                calculated,
                reported,
                difference,
                excluded_extras,
            } => {
                write!(
                    f,
                    "calculated total {:.2} differs from reported total {:.2} by {:.2}",
                    calculated, reported, difference
                )?;
                if *excluded_extras > 0.0 {
                    write!(f, " (excluded extras {:.2})", excluded_extras)?;
                }
                Ok(())
            }
            Diagnostic::NoItems => write!(f, "no items extracted"),
        }
    }
}

/// Result of validating an extraction
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accepted(ExtractionResult),
    Rejected(SchemaViolation),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }

    /// The accepted result, or the safe default when rejected
    pub fn into_result(self) -> ExtractionResult {
        match self {
            ValidationOutcome::Accepted(result) => result,
            ValidationOutcome::Rejected(_) => ExtractionResult::safe_default(PROCESSING_ERROR),
        }
    }
}

/// Validate an extraction result
///
/// Rejects on the first broken rule. Reconciliation advisories for accepted
/// results are logged at warn level.
pub fn validate(mut result: ExtractionResult) -> ValidationOutcome {
    // A blank errorText is no error; drop it so accepted results never carry
    // both items and an errorText
    if !result.has_error() {
        result.error_text = None;
    }

    if let Some(violation) = schema_violations(&result).into_iter().next() {
        warn!(%violation, "Extraction result rejected");
        return ValidationOutcome::Rejected(violation);
    }

    for diagnostic in reconcile(&result) {
        warn!(
            items = result.items.len(),
            currency = %result.currency,
            "Extraction advisory: {}",
            diagnostic
        );
    }

    debug!(
        items = result.items.len(),
        additional_costs = result.additional_costs.len(),
        total = result.total_price,
        "Extraction result accepted"
    );
    ValidationOutcome::Accepted(result)
}

/// Validate, substituting the safe default on rejection
pub fn validate_or_default(result: ExtractionResult) -> ExtractionResult {
    validate(result).into_result()
}

/// Every structural rule the result breaks, in rule order
pub fn schema_violations(result: &ExtractionResult) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();

    if result.currency.chars().count() != 3 {
        violations.push(SchemaViolation::InvalidCurrency {
            value: result.currency.clone(),
        });
    }

    if result.has_error() && !result.items.is_empty() {
        violations.push(SchemaViolation::ItemsWithError {
            count: result.items.len(),
        });
    }

    for (index, cost) in result.additional_costs.iter().enumerate() {
        let reason = if cost.name.trim().is_empty() {
            Some("name is empty")
        } else if !cost.amount.is_finite() {
            Some("amount is not a finite number")
        } else if cost.amount < 0.0 {
            Some("amount is negative")
        } else {
            None
        };
        if let Some(reason) = reason {
            violations.push(SchemaViolation::InvalidAdditionalCost {
                index,
                name: cost.name.clone(),
                reason: reason.to_string(),
            });
        }
    }

    for (index, item) in result.items.iter().enumerate() {
        let reason = if item.name.trim().is_empty() {
            Some("name is empty")
        } else if !item.quantity.is_finite() || item.quantity <= 0.0 {
            Some("quantity must be positive")
        } else if !item.price.is_finite() || item.price < 0.0 {
            Some("price must be non-negative")
        } else {
            None
        };
        if let Some(reason) = reason {
            violations.push(SchemaViolation::InvalidItem {
                index,
                name: item.name.clone(),
                reason: reason.to_string(),
            });
        }
    }

    if !result.total_price.is_finite() || result.total_price < 0.0 {
        violations.push(SchemaViolation::InvalidTotal {
            value: result.total_price,
        });
    }

    violations
}

/// Arithmetic and emptiness advisories for a result
///
/// Results carrying `errorText` are negative answers and get no advisories.
pub fn reconcile(result: &ExtractionResult) -> Vec<Diagnostic> {
    if result.has_error() {
        return Vec::new();
    }

    if result.items.is_empty() {
        return vec![Diagnostic::NoItems];
    }

    let calculated = result.items_subtotal() + result.included_extras();
    // Round away float noise so exactly one cent of drift is tolerated
    let difference = ((calculated - result.total_price).abs() * 10_000.0).round() / 10_000.0;

    if difference > TOTAL_TOLERANCE {
        vec![Diagnostic::TotalMismatch {
            calculated,
            reported: result.total_price,
            difference,
            excluded_extras: result.excluded_extras(),
        }]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdditionalCost, ReceiptItem};

    fn receipt(items: Vec<ReceiptItem>, total: f64) -> ExtractionResult {
        ExtractionResult {
            items,
            additional_costs: Vec::new(),
            total_price: total,
            currency: "USD".into(),
            currency_symbol: Some("$".into()),
            error_text: None,
        }
    }

    fn lunch() -> Vec<ReceiptItem> {
        vec![
            ReceiptItem::new("Sandwich", 2.0, 4.50),
            ReceiptItem::new("Soup", 1.0, 8.99),
        ]
    }

    #[test]
    fn test_matching_total_accepted_without_diagnostic() {
        let result = receipt(lunch(), 17.99);
        assert!(reconcile(&result).is_empty());
        assert_eq!(validate(result.clone()), ValidationOutcome::Accepted(result));
    }

    #[test]
    fn test_mismatched_total_is_advisory_only() {
        let result = receipt(lunch(), 20.00);
        let diagnostics = reconcile(&result);
        assert_eq!(diagnostics.len(), 1);
        match &diagnostics[0] {
            Diagnostic::TotalMismatch {
                calculated,
                reported,
                difference,
                excluded_extras,
            } => {
                assert_eq!(*excluded_extras, 0.0);
                assert!((calculated - 17.99).abs() < 1e-9);
                assert_eq!(*reported, 20.00);
                assert!((difference - 2.01).abs() < 1e-9);
            }
            other => panic!("unexpected diagnostic: {:?}", other),
        }
        assert!(validate(result).is_accepted());
    }

    #[test]
    fn test_included_additional_cost_counts_toward_total() {
        let mut result = receipt(vec![ReceiptItem::new("Pasta", 1.0, 10.00)], 11.00);
        result
            .additional_costs
            .push(AdditionalCost::new("Service charge", 1.00, true));
        assert!(reconcile(&result).is_empty());
        assert!(validate(result).is_accepted());
    }

    #[test]
    fn test_excluded_additional_cost_not_added() {
        let mut result = receipt(vec![ReceiptItem::new("Pasta", 1.0, 10.00)], 12.00);
        result
            .additional_costs
            .push(AdditionalCost::new("Tip", 2.00, false));
        // Only included costs take part in reconciliation
        let diagnostics = reconcile(&result);
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            diagnostics[0],
            Diagnostic::TotalMismatch { excluded_extras, .. } if (excluded_extras - 2.00).abs() < 1e-9
        ));
        assert_eq!(
            diagnostics[0].to_string(),
            "calculated total 10.00 differs from reported total 12.00 by 2.00 (excluded extras 2.00)"
        );
    }

    #[test]
    fn test_one_cent_drift_tolerated() {
        let result = receipt(vec![ReceiptItem::new("Tea", 1.0, 10.00)], 10.01);
        assert!(reconcile(&result).is_empty());
        let result = receipt(vec![ReceiptItem::new("Tea", 1.0, 10.00)], 10.02);
        assert_eq!(reconcile(&result).len(), 1);
    }

    #[test]
    fn test_empty_items_advisory() {
        let result = receipt(Vec::new(), 0.0);
        assert_eq!(reconcile(&result), vec![Diagnostic::NoItems]);
        assert!(validate(result).is_accepted());
    }

    #[test]
    fn test_currency_length_enforced() {
        for bad in ["US", "USDOLLAR", ""] {
            let mut result = receipt(lunch(), 17.99);
            result.currency = bad.to_string();
            assert_eq!(
                validate(result),
                ValidationOutcome::Rejected(SchemaViolation::InvalidCurrency {
                    value: bad.to_string()
                })
            );
        }
    }

    #[test]
    fn test_currency_counts_characters_not_bytes() {
        let mut result = receipt(lunch(), 17.99);
        result.currency = "€UR".into();
        assert!(validate(result).is_accepted());
    }

    #[test]
    fn test_items_alongside_error_rejected() {
        let mut result = receipt(lunch(), 17.99);
        result.error_text = Some("not a receipt".into());
        assert_eq!(
            validate(result),
            ValidationOutcome::Rejected(SchemaViolation::ItemsWithError { count: 2 })
        );
    }

    #[test]
    fn test_blank_error_text_dropped_on_accept() {
        for blank in ["", "   "] {
            let mut result = receipt(lunch(), 17.99);
            result.error_text = Some(blank.into());
            match validate(result) {
                ValidationOutcome::Accepted(accepted) => {
                    assert_eq!(accepted.error_text, None);
                    assert_eq!(accepted.items.len(), 2);
                    let json = serde_json::to_value(&accepted).unwrap();
                    assert!(json.get("errorText").is_none());
                }
                other => panic!("expected acceptance, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_negative_additional_cost_rejected() {
        let mut result = receipt(lunch(), 17.99);
        result
            .additional_costs
            .push(AdditionalCost::new("Tax", 1.00, false));
        result
            .additional_costs
            .push(AdditionalCost::new("Discount", -2.00, true));
        match validate(result) {
            ValidationOutcome::Rejected(SchemaViolation::InvalidAdditionalCost {
                index,
                name,
                ..
            }) => {
                assert_eq!(index, 1);
                assert_eq!(name, "Discount");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_additional_cost_name_rejected() {
        let mut result = receipt(lunch(), 17.99);
        result
            .additional_costs
            .push(AdditionalCost::new("  ", 1.00, false));
        assert!(matches!(
            validate(result),
            ValidationOutcome::Rejected(SchemaViolation::InvalidAdditionalCost { index: 0, .. })
        ));
    }

    #[test]
    fn test_first_violation_wins() {
        let mut result = receipt(lunch(), 17.99);
        result.currency = "US".into();
        result.error_text = Some("blurry".into());
        result
            .additional_costs
            .push(AdditionalCost::new("", -1.0, false));

        let violations = schema_violations(&result);
        assert_eq!(violations.len(), 3);
        assert!(matches!(
            validate(result),
            ValidationOutcome::Rejected(SchemaViolation::InvalidCurrency { .. })
        ));
    }

    #[test]
    fn test_item_sanity() {
        let result = receipt(vec![ReceiptItem::new("Gum", 0.0, 1.0)], 0.0);
        assert!(matches!(
            validate(result),
            ValidationOutcome::Rejected(SchemaViolation::InvalidItem { index: 0, .. })
        ));

        let result = receipt(vec![ReceiptItem::new("Gum", 1.0, -1.0)], 0.0);
        assert!(!validate(result).is_accepted());

        let result = receipt(vec![ReceiptItem::new("", 1.0, 1.0)], 1.0);
        assert!(!validate(result).is_accepted());
    }

    #[test]
    fn test_negative_total_rejected() {
        let result = receipt(Vec::new(), -5.0);
        assert_eq!(
            validate(result),
            ValidationOutcome::Rejected(SchemaViolation::InvalidTotal { value: -5.0 })
        );
    }

    #[test]
    fn test_not_a_receipt_is_well_formed() {
        let mut result = ExtractionResult::safe_default("not a receipt");
        result.currency_symbol = None;
        assert!(reconcile(&result).is_empty());
        assert!(validate(result).is_accepted());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let mut result = receipt(lunch(), 20.00);
        result
            .additional_costs
            .push(AdditionalCost::new("Tax", 1.60, false));
        let first = validate(result).into_result();
        let second = validate(first.clone());
        assert_eq!(second, ValidationOutcome::Accepted(first));
    }

    #[test]
    fn test_validate_or_default_substitutes() {
        let mut result = receipt(lunch(), 17.99);
        result.currency = "USDOLLAR".into();
        let out = validate_or_default(result);
        assert_eq!(out, ExtractionResult::safe_default(PROCESSING_ERROR));
    }
}
