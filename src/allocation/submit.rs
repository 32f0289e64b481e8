use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::info;

use super::fifo::AllocationPlan;
use crate::config::{PartyKind, PartyRef};
use crate::error::{AllocationError, Result};
use crate::ledger::{PaymentMethod, PaymentRecord, PaymentSink};

/// Fields shared by every payment created from one allocation
#[derive(Debug, Clone)]
pub struct CommonFields {
    pub party: PartyRef,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

/// How purchase-side amounts are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignConvention {
    /// Purchase payments are negative so sales and purchases share one ledger
    Signed,
    /// All amounts positive; `invoice_type` alone carries the direction
    Unsigned,
}

impl SignConvention {
    pub fn from_settings(negate_purchase_amounts: bool) -> Self {
        if negate_purchase_amounts {
            SignConvention::Signed
        } else {
            SignConvention::Unsigned
        }
    }
}

/// Cached views made stale by a committed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Invoices,
    Payments,
    Outstanding { kind: &'static str, party_id: u64 },
}

impl View {
    fn outstanding(party: PartyRef) -> Self {
        let kind = match party.kind {
            PartyKind::Customer => "customer",
            PartyKind::Vendor => "vendor",
        };
        View::Outstanding {
            kind,
            party_id: party.id,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Invoices => write!(f, "invoices"),
            View::Payments => write!(f, "payments"),
            View::Outstanding { kind, party_id } => write!(f, "outstanding({kind}:{party_id})"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub payments: Vec<PaymentRecord>,
    pub invalidated: Vec<View>,
}

/// Submit gate: at least one allocation, a positive total, and no more than was paid.
pub fn check_submittable(plan: &AllocationPlan) -> Result<()> {
    if plan.allocations.is_empty() || plan.allocated <= Decimal::ZERO {
        return Err(AllocationError::NothingToSubmit);
    }
    if plan.unallocated < Decimal::ZERO {
        return Err(AllocationError::OverAllocated {
            excess: -plan.unallocated,
        });
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// One payment record per allocation entry.
pub fn build_payments(
    plan: &AllocationPlan,
    common: &CommonFields,
    convention: SignConvention,
) -> Result<Vec<PaymentRecord>> {
    check_submittable(plan)?;

    let direction = common.party.direction();
    let (customer_id, vendor_id) = match common.party.kind {
        PartyKind::Customer => (Some(common.party.id), None),
        PartyKind::Vendor => (None, Some(common.party.id)),
    };
    let reference_number = non_empty(&common.reference_number);
    let notes = non_empty(&common.notes);

    let records = plan
        .allocations
        .iter()
        .filter(|a| a.amount > Decimal::ZERO)
        .map(|a| {
            let amount = match (common.party.kind, convention) {
                (PartyKind::Vendor, SignConvention::Signed) => -a.amount,
                _ => a.amount,
            };
            PaymentRecord {
                id: None,
                invoice_id: a.invoice_id,
                invoice_type: direction,
                amount,
                payment_method: common.payment_method,
                payment_date: common.payment_date,
                reference_number: reference_number.clone(),
                notes: notes.clone(),
                customer_id,
                vendor_id,
            }
        })
        .collect();

    Ok(records)
}

/// Persist the plan as one batch and report which views are now stale.
pub fn submit(
    plan: &AllocationPlan,
    common: &CommonFields,
    convention: SignConvention,
    sink: &mut impl PaymentSink,
) -> Result<SubmitOutcome> {
    let records = build_payments(plan, common, convention)?;
    let payments = sink.commit(&records)?;

    let invalidated = vec![
        View::Invoices,
        View::Payments,
        View::outstanding(common.party),
    ];
    let views: Vec<String> = invalidated.iter().map(ToString::to_string).collect();
    info!(
        party = %common.party,
        payments = payments.len(),
        allocated = %plan.allocated,
        invalidated = ?views,
        "allocation submitted"
    );

    Ok(SubmitOutcome {
        payments,
        invalidated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::Allocation;
    use crate::ledger::InvoiceDirection;
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct RecordingSink {
        batches: Vec<Vec<PaymentRecord>>,
        reject: bool,
    }

    impl PaymentSink for RecordingSink {
        fn commit(&mut self, batch: &[PaymentRecord]) -> Result<Vec<PaymentRecord>> {
            if self.reject {
                return Err(AllocationError::StaleAllocation {
                    invoice_id: batch[0].invoice_id,
                    requested: batch[0].magnitude(),
                    remaining: Decimal::ZERO,
                });
            }
            self.batches.push(batch.to_vec());
            Ok(batch.to_vec())
        }
    }

    fn plan(payment: Decimal, shares: &[(u64, Decimal)]) -> AllocationPlan {
        AllocationPlan::new(
            payment,
            shares
                .iter()
                .map(|&(invoice_id, amount)| Allocation { invoice_id, amount })
                .collect(),
        )
    }

    fn common(party: PartyRef) -> CommonFields {
        CommonFields {
            party,
            payment_method: PaymentMethod::Check,
            payment_date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            reference_number: Some("CHK-118".to_string()),
            notes: Some("   ".to_string()),
        }
    }

    #[test]
    fn one_record_per_allocation_with_shared_fields() {
        let records = build_payments(
            &plan(dec!(1200), &[(1, dec!(1000)), (2, dec!(200))]),
            &common(PartyRef::customer(4)),
            SignConvention::Signed,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.invoice_type, InvoiceDirection::Sales);
            assert_eq!(record.customer_id, Some(4));
            assert_eq!(record.vendor_id, None);
            assert_eq!(record.payment_method, PaymentMethod::Check);
            assert_eq!(record.reference_number.as_deref(), Some("CHK-118"));
            assert_eq!(record.notes, None);
        }
        assert_eq!(records[1].amount, dec!(200));
    }

    #[test]
    fn vendor_payments_are_negative_in_signed_ledgers() {
        let signed = build_payments(
            &plan(dec!(300), &[(8, dec!(300))]),
            &common(PartyRef::vendor(7)),
            SignConvention::Signed,
        )
        .unwrap();
        assert_eq!(signed[0].amount, dec!(-300));
        assert_eq!(signed[0].vendor_id, Some(7));
        assert_eq!(signed[0].invoice_type, InvoiceDirection::Purchase);

        let unsigned = build_payments(
            &plan(dec!(300), &[(8, dec!(300))]),
            &common(PartyRef::vendor(7)),
            SignConvention::Unsigned,
        )
        .unwrap();
        assert_eq!(unsigned[0].amount, dec!(300));
    }

    #[test]
    fn empty_or_zero_plans_are_blocked() {
        let party = common(PartyRef::customer(1));
        assert!(matches!(
            build_payments(&plan(dec!(100), &[]), &party, SignConvention::Signed),
            Err(AllocationError::NothingToSubmit)
        ));
        assert!(matches!(
            build_payments(&plan(dec!(100), &[(1, dec!(0))]), &party, SignConvention::Signed),
            Err(AllocationError::NothingToSubmit)
        ));
    }

    #[test]
    fn over_allocated_plan_is_blocked() {
        let err = check_submittable(&plan(dec!(100), &[(1, dec!(80)), (2, dec!(50))])).unwrap_err();
        assert!(matches!(err, AllocationError::OverAllocated { excess } if excess == dec!(30)));
    }

    #[test]
    fn submit_commits_one_batch_and_invalidates_views() {
        let mut sink = RecordingSink::default();
        let outcome = submit(
            &plan(dec!(1500), &[(1, dec!(1000)), (2, dec!(500))]),
            &common(PartyRef::customer(1)),
            SignConvention::Signed,
            &mut sink,
        )
        .unwrap();

        assert_eq!(sink.batches.len(), 1);
        assert_eq!(outcome.payments.len(), 2);
        assert_eq!(
            outcome.invalidated,
            vec![
                View::Invoices,
                View::Payments,
                View::Outstanding {
                    kind: "customer",
                    party_id: 1
                }
            ]
        );
    }

    #[test]
    fn rejected_batch_invalidates_nothing() {
        let mut sink = RecordingSink {
            reject: true,
            ..Default::default()
        };
        let result = submit(
            &plan(dec!(100), &[(1, dec!(100))]),
            &common(PartyRef::customer(1)),
            SignConvention::Signed,
            &mut sink,
        );
        assert!(matches!(result, Err(AllocationError::StaleAllocation { .. })));
        assert!(sink.batches.is_empty());
    }
}
