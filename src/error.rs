use rust_decimal::Decimal;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::PartyKind;

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("Config directory not found at {0}. Run 'payalloc init' to create it.")]
    ConfigNotFound(PathBuf),

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write ledger {path}: {reason}")]
    LedgerWrite { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config directory already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("No customer or vendor selected")]
    NoPartySelected,

    #[error("{kind} '{key}' not found in parties.toml")]
    PartyNotFound { kind: PartyKind, key: String },

    #[error("Payment amount must be greater than zero")]
    InvalidPaymentAmount,

    #[error("Payment of {amount} exceeds total outstanding ({outstanding})")]
    AmountExceedsOutstanding {
        amount: Decimal,
        outstanding: Decimal,
    },

    #[error("Invalid allocation '{0}'. Expected 'invoice:amount' (e.g., 'INV-2024-0002:150')")]
    InvalidAllocationFormat(String),

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invoice '{0}' is not outstanding for this party")]
    InvoiceNotInSession(String),

    #[error("Nothing to submit: no amount is allocated to any invoice")]
    NothingToSubmit,

    #[error("Allocations exceed the payment by {excess}")]
    OverAllocated { excess: Decimal },

    #[error("Invoice {invoice_id} no longer has {requested} outstanding (remaining {remaining})")]
    StaleAllocation {
        invoice_id: u64,
        requested: Decimal,
        remaining: Decimal,
    },

    #[error("Invoice {0} not found in ledger")]
    InvoiceNotFound(u64),

    #[error("Invoice '{0}' not found in ledger")]
    InvoiceRefNotFound(String),

    #[error("Invoice '{0}' matches both a sales and a purchase invoice; pass --customer or --vendor")]
    AmbiguousInvoice(String),

    #[error("Payment for invoice {invoice_id} does not belong to the invoice's party")]
    PartyMismatch { invoice_id: u64 },
}

pub type Result<T> = std::result::Result<T, AllocationError>;
