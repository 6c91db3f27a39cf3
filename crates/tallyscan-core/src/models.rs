//! Receipt extraction data model
//!
//! These types mirror the JSON shape the vision model is asked to produce and
//! the shape returned to API clients, so field names serialize in camelCase.

use serde::{Deserialize, Serialize};

/// `errorText` used when the model output could not be parsed
pub const PARSING_ERROR: &str = "parsing error";

/// `errorText` used when the model output parsed but failed validation
pub const PROCESSING_ERROR: &str = "processing error";

/// One line item on a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub name: String,
    pub quantity: f64,
    /// Unit price
    pub price: f64,
}

impl ReceiptItem {
    pub fn new(name: impl Into<String>, quantity: f64, price: f64) -> Self {
        Self {
            name: name.into(),
            quantity,
            price,
        }
    }

    /// Price multiplied by quantity
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity
    }
}

/// A non-item charge such as tax, tip, a service fee or a surcharge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalCost {
    pub name: String,
    pub amount: f64,
    /// `true` when the amount is already reflected in the item prices
    pub included_in_subtotal: bool,
}

impl AdditionalCost {
    pub fn new(name: impl Into<String>, amount: f64, included_in_subtotal: bool) -> Self {
        Self {
            name: name.into(),
            amount,
            included_in_subtotal,
        }
    }
}

/// Structured extraction of a single receipt image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub items: Vec<ReceiptItem>,
    #[serde(default)]
    pub additional_costs: Vec<AdditionalCost>,
    pub total_price: f64,
    /// ISO 4217 currency code (e.g. "USD")
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_symbol: Option<String>,
    /// Set when the image could not be read as a receipt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl ExtractionResult {
    /// The fallback result substituted whenever model output is unusable
    pub fn safe_default(reason: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            additional_costs: Vec::new(),
            total_price: 0.0,
            currency: "USD".to_string(),
            currency_symbol: Some("$".to_string()),
            error_text: Some(reason.into()),
        }
    }

    /// Whether `error_text` is present and non-blank
    pub fn has_error(&self) -> bool {
        self.error_text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }

    /// Sum of price × quantity over all items
    pub fn items_subtotal(&self) -> f64 {
        self.items.iter().map(ReceiptItem::line_total).sum()
    }

    /// Sum of additional costs already reflected in the item prices
    pub fn included_extras(&self) -> f64 {
        self.additional_costs
            .iter()
            .filter(|c| c.included_in_subtotal)
            .map(|c| c.amount)
            .sum()
    }

    /// Sum of additional costs charged on top of the item prices
    pub fn excluded_extras(&self) -> f64 {
        self.additional_costs
            .iter()
            .filter(|c| !c.included_in_subtotal)
            .map(|c| c.amount)
            .sum()
    }
}
