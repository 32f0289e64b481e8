pub mod allocation;
pub mod config;
pub mod error;
pub mod ledger;

pub use allocation::{
    allocate, compute_remaining, outstanding_invoices, submit, Allocation, AllocationPlan,
    AllocationSession, Balance, CommonFields, OutstandingInvoice, SignConvention, SubmitOutcome,
};
pub use config::{Config, Parties, Party, PartyKind, PartyRef};
pub use error::{AllocationError, Result};
pub use ledger::{FileLedger, Invoice, InvoiceSource, Ledger, PaymentRecord, PaymentSink};
