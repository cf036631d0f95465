use serde::{Deserialize, Serialize};

use procureflow_core::{DomainResult, Money};

/// Where an item is sourced from; used by the quick-assignment split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOrigin {
    Domestic,
    Overseas,
}

/// Purchase request line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Unique within the request, 1-based, never reused after removal.
    pub line_no: u32,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub manufacturer: Option<String>,
    pub origin: ItemOrigin,
}

impl LineItem {
    /// Line amount (quantity × unit price), checked.
    pub fn amount(&self) -> DomainResult<Money> {
        let amount = self
            .quantity
            .checked_mul(self.unit_price.amount)
            .ok_or_else(|| procureflow_core::DomainError::validation("line amount overflow"))?;
        Ok(Money::new(amount, self.unit_price.currency.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_is_quantity_times_unit_price() {
        let item = LineItem {
            line_no: 1,
            description: "M8 bolts".to_string(),
            quantity: 500,
            unit_price: Money::vnd(1_200),
            manufacturer: None,
            origin: ItemOrigin::Domestic,
        };
        assert_eq!(item.amount().unwrap(), Money::vnd(600_000));
    }
}
