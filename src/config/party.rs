use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::ledger::InvoiceDirection;

/// Contents of parties.toml, keyed by the identifier used on the command line
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Parties {
    #[serde(default)]
    pub customers: HashMap<String, Party>,
    #[serde(default)]
    pub vendors: HashMap<String, Party>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Party {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartyKind {
    Customer,
    Vendor,
}

impl PartyKind {
    /// Customers are billed with sales invoices, vendors bill us with purchase invoices.
    pub fn direction(self) -> InvoiceDirection {
        match self {
            PartyKind::Customer => InvoiceDirection::Sales,
            PartyKind::Vendor => InvoiceDirection::Purchase,
        }
    }
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartyKind::Customer => write!(f, "Customer"),
            PartyKind::Vendor => write!(f, "Vendor"),
        }
    }
}

/// The customer or vendor a payment session is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartyRef {
    pub kind: PartyKind,
    pub id: u64,
}

impl PartyRef {
    pub fn customer(id: u64) -> Self {
        Self {
            kind: PartyKind::Customer,
            id,
        }
    }

    pub fn vendor(id: u64) -> Self {
        Self {
            kind: PartyKind::Vendor,
            id,
        }
    }

    pub fn direction(&self) -> InvoiceDirection {
        self.kind.direction()
    }
}

impl fmt::Display for PartyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind, self.id)
    }
}

impl Parties {
    /// Look up a party by its key. Exactly one of `customer`/`vendor` must be given.
    pub fn resolve(
        &self,
        customer: Option<&str>,
        vendor: Option<&str>,
    ) -> crate::Result<(PartyRef, Party)> {
        let (kind, key, table) = match (customer, vendor) {
            (Some(key), None) => (PartyKind::Customer, key, &self.customers),
            (None, Some(key)) => (PartyKind::Vendor, key, &self.vendors),
            _ => return Err(crate::AllocationError::NoPartySelected),
        };

        let party = table
            .get(key)
            .ok_or_else(|| crate::AllocationError::PartyNotFound {
                kind,
                key: key.to_string(),
            })?;

        Ok((PartyRef { kind, id: party.id }, party.clone()))
    }
}
