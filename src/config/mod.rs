mod party;
mod settings;

pub use party::{Parties, Party, PartyKind, PartyRef};
pub use settings::{AllocationSettings, Config};

use crate::error::{AllocationError, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path (~/.payalloc/)
pub fn config_dir() -> Result<PathBuf> {
    // First try XDG-style directories
    if let Some(proj_dirs) = ProjectDirs::from("", "", "payalloc") {
        return Ok(proj_dirs.config_dir().to_path_buf());
    }

    // Fallback to ~/.payalloc/
    let home = std::env::var_os("HOME").map(PathBuf::from).ok_or_else(|| {
        AllocationError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        ))
    })?;

    Ok(home.join(".payalloc"))
}

/// Path of the invoice/payment ledger inside a config directory
pub fn ledger_file(config_dir: &Path) -> PathBuf {
    config_dir.join("ledger.toml")
}

/// Load the main config.toml
pub fn load_config(config_dir: &Path) -> Result<Config> {
    let path = config_dir.join("config.toml");
    if !path.exists() {
        return Err(AllocationError::ConfigFileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| AllocationError::ConfigParse { path, source: e })
}

/// Load parties.toml (customers and vendors)
pub fn load_parties(config_dir: &Path) -> Result<Parties> {
    let path = config_dir.join("parties.toml");
    if !path.exists() {
        return Err(AllocationError::ConfigFileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| AllocationError::ConfigParse { path, source: e })
}

/// Template content for config.toml
pub const CONFIG_TEMPLATE: &str = r#"[allocation]
currency_symbol = "$"
default_method = "bank_transfer"     # cash, card, bank_transfer, check
negate_purchase_amounts = true       # store vendor payments as negative amounts
allow_overpayment = true             # keep the excess as unallocated instead of rejecting
"#;

/// Template content for parties.toml
pub const PARTIES_TEMPLATE: &str = r#"# Customers receive sales invoices, vendors send purchase invoices.
# The table name (e.g., [customers.acme]) is the identifier used on the
# command line:
#
#   payalloc allocate --customer acme --amount 1200

[customers.acme]
id = 1
name = "Acme Corporation"
email = "ap@acme.example"

[vendors.globex]
id = 7
name = "Globex Supplies"
"#;

/// Template content for ledger.toml
pub const LEDGER_TEMPLATE: &str = r#"# Invoices as exported by the invoicing backend. Only approved credit notes
# reduce what is still owed on an invoice. Amounts are quoted decimal strings
# so no digits are lost on save.

[[invoices]]
id = 1001
number = "INV-2024-0001"
invoice_type = "sales"
party_id = 1
invoice_date = "2024-01-01"
total_amount = "1000.00"
paid_amount = "0.00"
payment_status = "unpaid"

[[invoices]]
id = 1002
number = "INV-2024-0002"
invoice_type = "sales"
party_id = 1
invoice_date = "2024-02-01"
total_amount = "600.00"
paid_amount = "0.00"
payment_status = "unpaid"

[[invoices.credit_notes]]
status = "approved"
total_amount = "100.00"

[[invoices]]
id = 1003
number = "INV-2024-0003"
invoice_type = "sales"
party_id = 1
invoice_date = "2024-03-01"
total_amount = "750.00"
paid_amount = "250.00"
payment_status = "partial"

[[invoices.credit_notes]]
status = "draft"
total_amount = "200.00"

[[invoices]]
id = 2001
number = "PINV-2024-0001"
invoice_type = "purchase"
party_id = 7
invoice_date = "2024-01-15"
total_amount = "400.00"
paid_amount = "0.00"
payment_status = "unpaid"

[[invoices.credit_notes]]
status = "approved"
total_amount = "50.00"

[[invoices.credit_notes]]
status = "cancelled"
total_amount = "30.00"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ledger, PaymentMethod};
    use rust_decimal_macros::dec;

    #[test]
    fn templates_parse() {
        let config: Config = toml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.allocation.default_method, PaymentMethod::BankTransfer);

        let parties: Parties = toml::from_str(PARTIES_TEMPLATE).unwrap();
        assert_eq!(parties.customers["acme"].id, 1);

        let ledger: Ledger = toml::from_str(LEDGER_TEMPLATE).unwrap();
        assert_eq!(ledger.invoices.len(), 4);
        assert_eq!(ledger.invoices[2].paid_amount, dec!(250.00));
    }

    #[test]
    fn config_sections_are_optional() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.toml"), "").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert!(config.allocation.allow_overpayment);
        assert_eq!(config.allocation.currency_symbol, "$");

        fs::write(
            dir.path().join("config.toml"),
            "[allocation]\ncurrency_symbol = \"€\"\nallow_overpayment = false\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert!(!config.allocation.allow_overpayment);
        assert_eq!(config.allocation.currency_symbol, "€");
    }
}
