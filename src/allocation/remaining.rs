use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::ledger::{CreditNoteStatus, Invoice, PaymentStatus};

/// Round to whole cents, halves away from zero.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Sum of the credit notes that count against the invoice. Drafts and cancelled notes don't.
pub fn approved_credit_total(invoice: &Invoice) -> Decimal {
    invoice
        .credit_notes
        .iter()
        .filter(|cn| cn.status == CreditNoteStatus::Approved)
        .map(|cn| cn.total_amount)
        .sum()
}

/// Collectible total: invoice total less approved credit notes
pub fn net_total(invoice: &Invoice) -> Decimal {
    invoice.total_amount - approved_credit_total(invoice)
}

/// What is still owed on the invoice, in whole cents. Never negative.
///
/// Sub-cent fractions are dropped rather than rounded up so that paying the full
/// remaining balance can never push `paid_amount` past the net total.
pub fn compute_remaining(invoice: &Invoice) -> Decimal {
    let remaining = net_total(invoice) - invoice.paid_amount;
    remaining
        .max(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Status derived from the same cent balance used for allocation: nothing left is paid.
pub fn payment_status(invoice: &Invoice) -> PaymentStatus {
    PaymentStatus::derive(invoice.paid_amount, compute_remaining(invoice))
}

/// An invoice annotated with its outstanding balance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutstandingInvoice {
    pub invoice_id: u64,
    pub label: String,
    pub invoice_date: Option<NaiveDate>,
    pub total_amount: Decimal,
    pub credit_total: Decimal,
    pub paid_amount: Decimal,
    pub remaining: Decimal,
    pub payment_status: PaymentStatus,
}

impl OutstandingInvoice {
    pub fn from_invoice(invoice: &Invoice) -> Self {
        Self {
            invoice_id: invoice.id,
            label: invoice.label(),
            invoice_date: invoice.invoice_date,
            total_amount: invoice.total_amount,
            credit_total: approved_credit_total(invoice),
            paid_amount: invoice.paid_amount,
            remaining: compute_remaining(invoice),
            payment_status: payment_status(invoice),
        }
    }

    /// Whether `reference` names this invoice by number or by id
    pub fn matches(&self, reference: &str) -> bool {
        self.label == reference || self.invoice_id.to_string() == reference
    }

    /// FIFO key: oldest first, undated invoices as 1970-01-01, ties by id
    pub(crate) fn age_key(&self) -> (NaiveDate, u64) {
        (self.invoice_date.unwrap_or_default(), self.invoice_id)
    }
}

/// The allocatable set: invoices with something left to pay, oldest first.
pub fn outstanding_invoices(invoices: &[Invoice]) -> Vec<OutstandingInvoice> {
    let mut outstanding: Vec<OutstandingInvoice> = invoices
        .iter()
        .map(OutstandingInvoice::from_invoice)
        .filter(|inv| inv.remaining > Decimal::ZERO)
        .collect();
    outstanding.sort_by_key(OutstandingInvoice::age_key);
    outstanding
}

pub fn total_outstanding(invoices: &[OutstandingInvoice]) -> Decimal {
    invoices.iter().map(|inv| inv.remaining).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CreditNote, InvoiceDirection};
    use rust_decimal_macros::dec;

    fn credit(status: CreditNoteStatus, amount: Decimal) -> CreditNote {
        CreditNote {
            status,
            total_amount: amount,
            invoice_id: None,
        }
    }

    fn invoice(id: u64, total: Decimal, paid: Decimal, notes: Vec<CreditNote>) -> Invoice {
        Invoice {
            id,
            number: None,
            invoice_type: InvoiceDirection::Sales,
            party_id: Some(1),
            invoice_date: None,
            total_amount: total,
            paid_amount: paid,
            payment_status: PaymentStatus::Unpaid,
            credit_notes: notes,
        }
    }

    #[test]
    fn only_approved_credit_notes_count() {
        let inv = invoice(
            1,
            dec!(1000),
            dec!(200),
            vec![
                credit(CreditNoteStatus::Approved, dec!(150)),
                credit(CreditNoteStatus::Draft, dec!(400)),
                credit(CreditNoteStatus::Cancelled, dec!(300)),
                credit(CreditNoteStatus::Approved, dec!(50)),
            ],
        );
        assert_eq!(approved_credit_total(&inv), dec!(200));
        assert_eq!(compute_remaining(&inv), dec!(600));
    }

    #[test]
    fn over_credited_invoice_has_nothing_remaining() {
        let inv = invoice(
            1,
            dec!(100),
            dec!(20),
            vec![credit(CreditNoteStatus::Approved, dec!(90))],
        );
        assert_eq!(compute_remaining(&inv), Decimal::ZERO);
    }

    #[test]
    fn overpaid_invoice_is_not_negative() {
        let inv = invoice(1, dec!(100), dec!(130), Vec::new());
        assert_eq!(compute_remaining(&inv), Decimal::ZERO);
    }

    #[test]
    fn sub_cent_fractions_are_dropped() {
        let inv = invoice(1, dec!(100.005), dec!(0), Vec::new());
        assert_eq!(compute_remaining(&inv), dec!(100.00));

        let inv = invoice(1, dec!(100.004), dec!(100), Vec::new());
        assert_eq!(compute_remaining(&inv), Decimal::ZERO);
        assert_eq!(payment_status(&inv), PaymentStatus::Paid);
        assert!(outstanding_invoices(&[inv]).is_empty());
    }

    #[test]
    fn settled_invoices_leave_the_allocatable_set() {
        let mut newer = invoice(3, dec!(500), dec!(0), Vec::new());
        newer.invoice_date = NaiveDate::from_ymd_opt(2024, 3, 1);
        let mut settled = invoice(1, dec!(500), dec!(500), Vec::new());
        settled.invoice_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        let undated = invoice(2, dec!(80), dec!(0), Vec::new());

        let outstanding = outstanding_invoices(&[newer, settled, undated]);
        let ids: Vec<u64> = outstanding.iter().map(|inv| inv.invoice_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(total_outstanding(&outstanding), dec!(580));
    }

    #[test]
    fn calculation_does_not_mutate_input() {
        let inv = invoice(
            1,
            dec!(300),
            dec!(100),
            vec![credit(CreditNoteStatus::Approved, dec!(25))],
        );
        let first = compute_remaining(&inv);
        let second = compute_remaining(&inv);
        assert_eq!(first, second);
        assert_eq!(inv.paid_amount, dec!(100));
    }
}
