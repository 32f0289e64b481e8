use rust_decimal::Decimal;
use tracing::debug;

use super::fifo::{allocate, validate_payment_amount, Allocation, AllocationPlan, Balance};
use super::remaining::{round_cents, OutstandingInvoice};
use crate::error::{AllocationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMode {
    /// Allocations follow FIFO and are redone whenever the payment amount changes
    Auto,
    /// The user has edited at least one invoice; FIFO no longer runs
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationTotals {
    pub allocated: Decimal,
    pub balance: Balance,
}

/// In-progress allocation of one payment over a snapshot of a party's outstanding
/// invoices. Nothing here is persisted; dropping the session discards it.
#[derive(Debug, Clone)]
pub struct AllocationSession {
    payment_amount: Decimal,
    invoices: Vec<OutstandingInvoice>,
    allocations: Vec<Allocation>,
    mode: AllocationMode,
}

impl AllocationSession {
    /// Start in auto mode with the FIFO allocation of `payment_amount`.
    pub fn new(payment_amount: Decimal, mut invoices: Vec<OutstandingInvoice>) -> Result<Self> {
        invoices.sort_by_key(OutstandingInvoice::age_key);
        let plan = allocate(payment_amount, &invoices)?;
        Ok(Self {
            payment_amount: plan.payment_amount,
            invoices,
            allocations: plan.allocations,
            mode: AllocationMode::Auto,
        })
    }

    pub fn mode(&self) -> AllocationMode {
        self.mode
    }

    pub fn payment_amount(&self) -> Decimal {
        self.payment_amount
    }

    pub fn invoices(&self) -> &[OutstandingInvoice] {
        &self.invoices
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    /// Change the payment. Auto mode reruns FIFO; manual allocations are left alone.
    pub fn set_payment_amount(&mut self, amount: Decimal) -> Result<()> {
        self.payment_amount = validate_payment_amount(amount)?;
        if self.mode == AllocationMode::Auto {
            self.reallocate()?;
        }
        Ok(())
    }

    /// Override one invoice's share. The amount is clamped to `[0, remaining]` and a zero
    /// share drops the invoice from the allocation list. Switches the session to manual.
    pub fn set_allocation(&mut self, invoice_id: u64, proposed: Decimal) -> Result<&[Allocation]> {
        let remaining = self
            .invoices
            .iter()
            .find(|inv| inv.invoice_id == invoice_id)
            .map(|inv| inv.remaining)
            .ok_or_else(|| AllocationError::InvoiceNotInSession(invoice_id.to_string()))?;

        self.mode = AllocationMode::Manual;
        let amount = round_cents(proposed).clamp(Decimal::ZERO, remaining);
        debug!(invoice_id, %proposed, %amount, "manual allocation");

        let existing = self.allocations.iter().position(|a| a.invoice_id == invoice_id);
        match (existing, amount.is_zero()) {
            (Some(idx), true) => {
                self.allocations.remove(idx);
            }
            (Some(idx), false) => self.allocations[idx].amount = amount,
            (None, true) => {}
            (None, false) => {
                self.allocations.push(Allocation { invoice_id, amount });
                self.sort_allocations();
            }
        }

        Ok(&self.allocations)
    }

    /// Same as [`set_allocation`](Self::set_allocation), naming the invoice by number or id.
    pub fn set_allocation_by_ref(&mut self, reference: &str, proposed: Decimal) -> Result<&[Allocation]> {
        let invoice_id = self
            .invoices
            .iter()
            .find(|inv| inv.matches(reference))
            .map(|inv| inv.invoice_id)
            .ok_or_else(|| AllocationError::InvoiceNotInSession(reference.to_string()))?;
        self.set_allocation(invoice_id, proposed)
    }

    /// Throw away manual edits and go back to FIFO.
    pub fn enable_auto(&mut self) -> Result<()> {
        self.mode = AllocationMode::Auto;
        self.reallocate()
    }

    pub fn totals(&self) -> AllocationTotals {
        let plan = self.plan();
        AllocationTotals {
            allocated: plan.allocated,
            balance: plan.balance(),
        }
    }

    /// Submit gate: something must be allocated
    pub fn can_submit(&self) -> bool {
        !self.allocations.is_empty() && self.totals().allocated > Decimal::ZERO
    }

    pub fn plan(&self) -> AllocationPlan {
        AllocationPlan::new(self.payment_amount, self.allocations.clone())
    }

    fn reallocate(&mut self) -> Result<()> {
        self.allocations = allocate(self.payment_amount, &self.invoices)?.allocations;
        Ok(())
    }

    fn sort_allocations(&mut self) {
        let invoices = &self.invoices;
        self.allocations.sort_by_key(|a| {
            invoices
                .iter()
                .position(|inv| inv.invoice_id == a.invoice_id)
                .unwrap_or(usize::MAX)
        });
    }
}
