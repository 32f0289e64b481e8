mod model;
mod store;

pub use model::{
    CreditNote, CreditNoteStatus, Invoice, InvoiceDirection, PaymentMethod, PaymentRecord,
    PaymentStatus,
};
pub use store::{FileLedger, InvoiceSource, Ledger, PaymentSink};
