mod editor;
mod fifo;
mod remaining;
mod submit;

pub use editor::{AllocationMode, AllocationSession, AllocationTotals};
pub use fifo::{
    allocate, check_overpayment, validate_payment_amount, Allocation, AllocationPlan, Balance,
};
pub use remaining::{
    approved_credit_total, compute_remaining, net_total, outstanding_invoices, payment_status,
    round_cents, total_outstanding, OutstandingInvoice,
};
pub use submit::{
    build_payments, check_submittable, submit, CommonFields, SignConvention, SubmitOutcome, View,
};
