use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use payalloc::allocation::{
    allocate, compute_remaining, AllocationSession, Balance, OutstandingInvoice,
};
use payalloc::ledger::{
    CreditNote, CreditNoteStatus, Invoice, InvoiceDirection, PaymentStatus,
};

fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

fn outstanding_strategy() -> impl Strategy<Value = Vec<OutstandingInvoice>> {
    prop::collection::vec((prop::option::of(1u32..=28), 1i64..=100_000), 0..8).prop_map(
        |entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(idx, (day, remaining))| OutstandingInvoice {
                    invoice_id: idx as u64 + 1,
                    label: format!("INV-{}", idx + 1),
                    invoice_date: day.and_then(|d| NaiveDate::from_ymd_opt(2024, 1, d)),
                    total_amount: cents(remaining),
                    credit_total: Decimal::ZERO,
                    paid_amount: Decimal::ZERO,
                    remaining: cents(remaining),
                    payment_status: PaymentStatus::Unpaid,
                })
                .collect()
        },
    )
}

fn fifo_order(invoices: &[OutstandingInvoice]) -> Vec<&OutstandingInvoice> {
    let mut ordered: Vec<&OutstandingInvoice> = invoices.iter().collect();
    ordered.sort_by_key(|inv| (inv.invoice_date.unwrap_or_default(), inv.invoice_id));
    ordered
}

fn credit_status() -> impl Strategy<Value = CreditNoteStatus> {
    prop_oneof![
        Just(CreditNoteStatus::Draft),
        Just(CreditNoteStatus::Approved),
        Just(CreditNoteStatus::Cancelled),
    ]
}

proptest! {
    #[test]
    fn payment_is_conserved(invoices in outstanding_strategy(), payment in 1i64..=500_000) {
        let payment = cents(payment);
        let plan = allocate(payment, &invoices).unwrap();

        let allocated: Decimal = plan.allocations.iter().map(|a| a.amount).sum();
        prop_assert_eq!(allocated + plan.unallocated, payment);
        prop_assert!(plan.unallocated >= Decimal::ZERO);
    }

    #[test]
    fn allocations_never_exceed_remaining(invoices in outstanding_strategy(), payment in 1i64..=500_000) {
        let plan = allocate(cents(payment), &invoices).unwrap();

        for allocation in &plan.allocations {
            let invoice = invoices
                .iter()
                .find(|inv| inv.invoice_id == allocation.invoice_id)
                .unwrap();
            prop_assert!(allocation.amount > Decimal::ZERO);
            prop_assert!(allocation.amount <= invoice.remaining);
        }
    }

    #[test]
    fn older_invoices_are_settled_first(invoices in outstanding_strategy(), payment in 1i64..=500_000) {
        let plan = allocate(cents(payment), &invoices).unwrap();
        let ordered = fifo_order(&invoices);

        // allocations follow FIFO order and only the last one may be partial
        let expected_ids: Vec<u64> = ordered
            .iter()
            .take(plan.allocations.len())
            .map(|inv| inv.invoice_id)
            .collect();
        let ids: Vec<u64> = plan.allocations.iter().map(|a| a.invoice_id).collect();
        prop_assert_eq!(ids, expected_ids);

        if let Some((_, settled)) = plan.allocations.split_last() {
            for (allocation, invoice) in settled.iter().zip(&ordered) {
                prop_assert_eq!(allocation.amount, invoice.remaining);
            }
        }
        if plan.unallocated > Decimal::ZERO {
            prop_assert_eq!(plan.allocations.len(), invoices.len());
        }
    }

    #[test]
    fn allocation_is_repeatable(invoices in outstanding_strategy(), payment in 1i64..=500_000) {
        let snapshot = invoices.clone();
        let first = allocate(cents(payment), &invoices).unwrap();
        let second = allocate(cents(payment), &invoices).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(invoices, snapshot);
    }

    #[test]
    fn manual_edits_stay_within_bounds(
        invoices in outstanding_strategy(),
        payment in 1i64..=500_000,
        proposed in -100_000i64..=300_000,
        pick in 0usize..8,
    ) {
        prop_assume!(!invoices.is_empty());
        let target = &invoices[pick % invoices.len()];
        let (invoice_id, remaining) = (target.invoice_id, target.remaining);

        let mut session = AllocationSession::new(cents(payment), invoices.clone()).unwrap();
        session.set_allocation(invoice_id, cents(proposed)).unwrap();

        let share = session.plan().amount_for(invoice_id);
        prop_assert!(share >= Decimal::ZERO && share <= remaining);
        let listed = session.allocations().iter().any(|a| a.invoice_id == invoice_id);
        prop_assert_eq!(listed, !share.is_zero());
        prop_assert!(session.allocations().iter().all(|a| a.amount > Decimal::ZERO));

        let totals = session.totals();
        let difference = session.payment_amount() - totals.allocated;
        match totals.balance {
            Balance::Unallocated(x) => prop_assert_eq!(x, difference),
            Balance::OverAllocated(x) => {
                prop_assert!(x > Decimal::ZERO);
                prop_assert_eq!(-x, difference);
            }
        }
    }

    #[test]
    fn remaining_nets_only_approved_credit_notes(
        total in 0i64..=200_000,
        paid in 0i64..=200_000,
        notes in prop::collection::vec((credit_status(), 0i64..=50_000), 0..5),
    ) {
        let invoice = Invoice {
            id: 1,
            number: None,
            invoice_type: InvoiceDirection::Sales,
            party_id: Some(1),
            invoice_date: None,
            total_amount: cents(total),
            paid_amount: cents(paid),
            payment_status: PaymentStatus::Unpaid,
            credit_notes: notes
                .iter()
                .map(|&(status, amount)| CreditNote {
                    status,
                    total_amount: cents(amount),
                    invoice_id: Some(1),
                })
                .collect(),
        };

        let approved: i64 = notes
            .iter()
            .filter(|(status, _)| *status == CreditNoteStatus::Approved)
            .map(|(_, amount)| amount)
            .sum();
        let expected = cents((total - approved - paid).max(0));

        prop_assert_eq!(compute_remaining(&invoice), expected);
        prop_assert_eq!(compute_remaining(&invoice), compute_remaining(&invoice));
    }
}
