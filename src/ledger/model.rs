use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::PartyRef;

/// Whether an invoice bills a customer (sales) or comes from a vendor (purchase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceDirection {
    #[default]
    Sales,
    Purchase,
}

impl fmt::Display for InvoiceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceDirection::Sales => write!(f, "sales"),
            InvoiceDirection::Purchase => write!(f, "purchase"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    /// Status as a pure function of what was paid and what is still owed in cents.
    pub fn derive(paid_amount: Decimal, remaining: Decimal) -> Self {
        if remaining <= Decimal::ZERO {
            PaymentStatus::Paid
        } else if paid_amount.is_zero() {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::Partial
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Unpaid => write!(f, "UNPAID"),
            PaymentStatus::Partial => write!(f, "PARTIAL"),
            PaymentStatus::Paid => write!(f, "PAID"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditNoteStatus {
    #[default]
    Draft,
    Approved,
    Cancelled,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreditNote {
    #[serde(default)]
    pub status: CreditNoteStatus,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Invoice {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default)]
    pub invoice_type: InvoiceDirection,
    /// customer_id for sales invoices, vendor_id for purchase invoices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub paid_amount: Decimal,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub credit_notes: Vec<CreditNote>,
}

impl Invoice {
    /// Invoice number when known, otherwise the numeric id
    pub fn label(&self) -> String {
        match &self.number {
            Some(number) => number.clone(),
            None => self.id.to_string(),
        }
    }

    /// Whether `reference` names this invoice by number or by id
    pub fn matches(&self, reference: &str) -> bool {
        self.number.as_deref() == Some(reference) || self.id.to_string() == reference
    }

    pub fn belongs_to(&self, party: PartyRef) -> bool {
        self.invoice_type == party.direction() && self.party_id == Some(party.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    #[default]
    BankTransfer,
    Check,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
            PaymentMethod::Check => write!(f, "check"),
        }
    }
}

/// One persisted payment against one invoice
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaymentRecord {
    /// Assigned by the ledger on commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub invoice_id: u64,
    pub invoice_type: InvoiceDirection,
    /// Negative for purchase-side payments when the ledger uses signed amounts
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<u64>,
}

impl PaymentRecord {
    /// Amount applied to the invoice, whatever sign convention the record was stored with.
    pub fn magnitude(&self) -> Decimal {
        self.amount.abs()
    }

    pub fn party(&self) -> Option<PartyRef> {
        match self.invoice_type {
            InvoiceDirection::Sales => self.customer_id.map(PartyRef::customer),
            InvoiceDirection::Purchase => self.vendor_id.map(PartyRef::vendor),
        }
    }
}
