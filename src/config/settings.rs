use serde::{Deserialize, Serialize};

use crate::ledger::PaymentMethod;

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub allocation: AllocationSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AllocationSettings {
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default)]
    pub default_method: PaymentMethod,
    /// Store purchase-side payments as negative amounts in the shared ledger
    #[serde(default = "default_true")]
    pub negate_purchase_amounts: bool,
    /// Accept payments larger than the party's total outstanding balance
    #[serde(default = "default_true")]
    pub allow_overpayment: bool,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency_symbol(),
            default_method: PaymentMethod::default(),
            negate_purchase_amounts: true,
            allow_overpayment: true,
        }
    }
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

fn default_true() -> bool {
    true
}
