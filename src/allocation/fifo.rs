use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use super::remaining::{round_cents, OutstandingInvoice};
use crate::error::{AllocationError, Result};

/// Part of a payment assigned to one invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub invoice_id: u64,
    pub amount: Decimal,
}

/// What is left of the payment once the allocations are taken out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum Balance {
    /// Not assigned to any invoice (zero when the payment is fully used)
    Unallocated(Decimal),
    /// Manual edits assigned more than was paid
    OverAllocated(Decimal),
}

impl Balance {
    pub fn from_difference(difference: Decimal) -> Self {
        if difference < Decimal::ZERO {
            Balance::OverAllocated(-difference)
        } else {
            Balance::Unallocated(difference)
        }
    }
}

/// A payment split across invoices, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationPlan {
    pub payment_amount: Decimal,
    pub allocations: Vec<Allocation>,
    pub allocated: Decimal,
    /// `payment_amount - allocated`; negative only for over-allocated manual plans
    pub unallocated: Decimal,
}

impl AllocationPlan {
    pub fn new(payment_amount: Decimal, allocations: Vec<Allocation>) -> Self {
        let allocated: Decimal = allocations.iter().map(|a| a.amount).sum();
        Self {
            payment_amount,
            allocations,
            allocated,
            unallocated: payment_amount - allocated,
        }
    }

    pub fn balance(&self) -> Balance {
        Balance::from_difference(self.unallocated)
    }

    pub fn amount_for(&self, invoice_id: u64) -> Decimal {
        self.allocations
            .iter()
            .find(|a| a.invoice_id == invoice_id)
            .map_or(Decimal::ZERO, |a| a.amount)
    }
}

/// Round a requested payment to cents and reject anything that isn't positive.
pub fn validate_payment_amount(amount: Decimal) -> Result<Decimal> {
    let amount = round_cents(amount);
    if amount <= Decimal::ZERO {
        return Err(AllocationError::InvalidPaymentAmount);
    }
    Ok(amount)
}

/// With overpayment disallowed, a payment may not exceed what the party owes in total.
pub fn check_overpayment(amount: Decimal, outstanding: Decimal, allow: bool) -> Result<()> {
    if !allow && amount > outstanding {
        return Err(AllocationError::AmountExceedsOutstanding {
            amount,
            outstanding,
        });
    }
    Ok(())
}

/// Spread a payment over invoices oldest first. Each invoice takes as much as it still
/// owes until the payment runs out; whatever is left over is returned as unallocated.
pub fn allocate(payment_amount: Decimal, invoices: &[OutstandingInvoice]) -> Result<AllocationPlan> {
    let payment_amount = validate_payment_amount(payment_amount)?;

    let mut ordered: Vec<&OutstandingInvoice> = invoices.iter().collect();
    ordered.sort_by_key(|inv| inv.age_key());

    let mut remaining_payment = payment_amount;
    let mut allocations = Vec::new();

    for invoice in ordered {
        if remaining_payment <= Decimal::ZERO {
            break;
        }

        let take = remaining_payment.min(invoice.remaining);
        if take > Decimal::ZERO {
            debug!(
                invoice_id = invoice.invoice_id,
                remaining = %invoice.remaining,
                %take,
                "allocating"
            );
            allocations.push(Allocation {
                invoice_id: invoice.invoice_id,
                amount: take,
            });
            remaining_payment -= take;
        }
    }

    if remaining_payment > Decimal::ZERO {
        info!(unallocated = %remaining_payment, "payment exceeds total outstanding");
    }

    Ok(AllocationPlan::new(payment_amount, allocations))
}
