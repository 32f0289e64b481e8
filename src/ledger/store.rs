use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::allocation::{compute_remaining, payment_status};
use crate::config::PartyRef;
use crate::error::{AllocationError, Result};
use crate::ledger::{Invoice, PaymentRecord};

/// Reads a party's invoices from wherever the invoicing backend keeps them.
pub trait InvoiceSource {
    fn invoices_for(&self, party: PartyRef) -> Result<Vec<Invoice>>;
}

/// Persists a batch of payment records. A batch is committed entirely or not at all.
pub trait PaymentSink {
    fn commit(&mut self, batch: &[PaymentRecord]) -> Result<Vec<PaymentRecord>>;
}

/// Invoices and the payments recorded against them
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Ledger {
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
}

impl Ledger {
    /// Recorded payments, optionally restricted to one party, oldest first
    pub fn payments_for(&self, party: Option<PartyRef>) -> Vec<&PaymentRecord> {
        self.payments
            .iter()
            .filter(|p| party.map_or(true, |party| p.party() == Some(party)))
            .collect()
    }

    /// The one invoice `reference` names by number or id, optionally within one party.
    /// Sales and purchase ids may collide, so a bare reference can be ambiguous.
    pub fn invoice_by_ref(&self, reference: &str, party: Option<PartyRef>) -> Result<&Invoice> {
        let mut found = self
            .invoices
            .iter()
            .filter(|inv| inv.matches(reference))
            .filter(|inv| party.map_or(true, |party| inv.belongs_to(party)));

        match (found.next(), found.next()) {
            (Some(invoice), None) => Ok(invoice),
            (Some(_), Some(_)) => Err(AllocationError::AmbiguousInvoice(reference.to_string())),
            (None, _) => Err(AllocationError::InvoiceRefNotFound(reference.to_string())),
        }
    }

    /// Allocation history of one invoice, oldest first
    pub fn payments_for_invoice(&self, invoice: &Invoice) -> Vec<&PaymentRecord> {
        self.payments
            .iter()
            .filter(|p| p.invoice_id == invoice.id && p.invoice_type == invoice.invoice_type)
            .collect()
    }

    fn find_invoice(&self, record: &PaymentRecord) -> Option<&Invoice> {
        self.invoices
            .iter()
            .find(|inv| inv.id == record.invoice_id && inv.invoice_type == record.invoice_type)
    }

    /// Check every record against the invoice balances as they are now, before touching
    /// anything. Several records against one invoice are checked as a sum.
    fn validate_batch(&self, batch: &[PaymentRecord]) -> Result<()> {
        let mut requested: BTreeMap<u64, (Decimal, &Invoice)> = BTreeMap::new();

        for record in batch {
            let invoice = self
                .find_invoice(record)
                .ok_or(AllocationError::InvoiceNotFound(record.invoice_id))?;

            let owned = record
                .party()
                .is_some_and(|party| invoice.belongs_to(party));
            if !owned {
                return Err(AllocationError::PartyMismatch {
                    invoice_id: invoice.id,
                });
            }

            let entry = requested
                .entry(invoice.id)
                .or_insert((Decimal::ZERO, invoice));
            entry.0 += record.magnitude();
        }

        for (invoice_id, (amount, invoice)) in requested {
            let remaining = compute_remaining(invoice);
            if amount > remaining {
                warn!(invoice_id, %amount, %remaining, "rejecting stale allocation");
                return Err(AllocationError::StaleAllocation {
                    invoice_id,
                    requested: amount,
                    remaining,
                });
            }
        }

        Ok(())
    }

    /// Validate, then record the batch and move each invoice's paid amount and status.
    pub fn apply_batch(&mut self, batch: &[PaymentRecord]) -> Result<Vec<PaymentRecord>> {
        self.validate_batch(batch)?;

        let mut next_id = self.payments.iter().filter_map(|p| p.id).max().unwrap_or(0) + 1;
        let mut committed = Vec::with_capacity(batch.len());

        for record in batch {
            let invoice = self
                .invoices
                .iter_mut()
                .find(|inv| inv.id == record.invoice_id && inv.invoice_type == record.invoice_type)
                .ok_or(AllocationError::InvoiceNotFound(record.invoice_id))?;

            invoice.paid_amount += record.magnitude();
            invoice.payment_status = payment_status(invoice);
            debug!(
                invoice_id = invoice.id,
                paid = %invoice.paid_amount,
                status = %invoice.payment_status,
                "invoice updated"
            );

            let mut stored = record.clone();
            stored.id = Some(next_id);
            next_id += 1;
            self.payments.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }
}

impl InvoiceSource for Ledger {
    fn invoices_for(&self, party: PartyRef) -> Result<Vec<Invoice>> {
        let invoices: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|inv| inv.belongs_to(party))
            .cloned()
            .collect();

        for inv in &invoices {
            let derived = payment_status(inv);
            if derived != inv.payment_status {
                debug!(
                    invoice_id = inv.id,
                    stored = %inv.payment_status,
                    %derived,
                    "stored payment status disagrees with balances"
                );
            }
        }

        Ok(invoices)
    }
}

impl PaymentSink for Ledger {
    fn commit(&mut self, batch: &[PaymentRecord]) -> Result<Vec<PaymentRecord>> {
        self.apply_batch(batch)
    }
}

/// A ledger kept in a TOML file. Every commit re-reads the file so balances are checked
/// against what is stored at commit time rather than when the session started.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the ledger (empty if the file does not exist yet)
    pub fn load(&self) -> Result<Ledger> {
        if !self.path.exists() {
            return Ok(Ledger::default());
        }
        let content = fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| AllocationError::ConfigParse {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Write through a sibling temp file so a failed write never leaves a half ledger.
    pub fn save(&self, ledger: &Ledger) -> Result<()> {
        let content =
            toml::to_string_pretty(ledger).map_err(|e| AllocationError::LedgerWrite {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl InvoiceSource for FileLedger {
    fn invoices_for(&self, party: PartyRef) -> Result<Vec<Invoice>> {
        self.load()?.invoices_for(party)
    }
}

impl PaymentSink for FileLedger {
    fn commit(&mut self, batch: &[PaymentRecord]) -> Result<Vec<PaymentRecord>> {
        debug!(path = %self.path.display(), "reloading ledger for commit");
        let mut ledger = self.load()?;
        let committed = ledger.apply_batch(batch)?;
        self.save(&ledger)?;
        info!(
            path = %self.path.display(),
            payments = committed.len(),
            "payment batch committed"
        );
        Ok(committed)
    }
}
