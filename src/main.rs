use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payalloc::allocation::{
    build_payments, check_overpayment, compute_remaining, net_total, outstanding_invoices,
    round_cents, submit,
    total_outstanding, validate_payment_amount, AllocationMode, AllocationSession, Balance,
    CommonFields, OutstandingInvoice, SignConvention,
};
use payalloc::config::{
    config_dir, ledger_file, load_config, load_parties, Parties, PartyKind, PartyRef,
    CONFIG_TEMPLATE, LEDGER_TEMPLATE, PARTIES_TEMPLATE,
};
use payalloc::ledger::{FileLedger, InvoiceSource, PaymentMethod, PaymentStatus};
use payalloc::{AllocationError, Result};

#[derive(Parser)]
#[command(name = "payalloc")]
#[command(version, about = "Allocate payments across outstanding invoices, oldest first", long_about = None)]
struct Cli {
    /// Path to config directory (default: ~/.payalloc or XDG config)
    #[arg(short = 'C', long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct PartyArgs {
    /// Customer identifier from parties.toml (sales invoices)
    #[arg(long)]
    customer: Option<String>,

    /// Vendor identifier from parties.toml (purchase invoices)
    #[arg(long)]
    vendor: Option<String>,
}

#[derive(Args)]
#[group(required = false, multiple = false)]
struct PartyFilter {
    /// Only payments from this customer
    #[arg(long)]
    customer: Option<String>,

    /// Only payments to this vendor
    #[arg(long)]
    vendor: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory with template files
    Init,

    /// List configured customers and vendors
    Parties,

    /// Show a party's outstanding invoices, oldest first
    Outstanding {
        #[command(flatten)]
        party: PartyArgs,
    },

    /// Allocate a payment across a party's outstanding invoices
    Allocate {
        #[command(flatten)]
        party: PartyArgs,

        /// Payment amount
        #[arg(short, long)]
        amount: Decimal,

        /// Override one invoice's share, as "invoice:amount" (number or id; can be repeated)
        #[arg(short, long = "set", value_name = "INVOICE:AMOUNT")]
        set: Vec<String>,

        /// Payment method (default from config.toml)
        #[arg(short, long, value_enum)]
        method: Option<PaymentMethod>,

        /// Payment date (default: today)
        #[arg(long)]
        date: Option<String>,

        /// Reference number shared by all created payments
        #[arg(long)]
        reference: Option<String>,

        /// Notes shared by all created payments
        #[arg(long)]
        notes: Option<String>,

        /// Show the allocation without recording anything
        #[arg(long)]
        dry_run: bool,

        /// Print the plan and payments as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recorded payments
    Payments {
        #[command(flatten)]
        party: PartyFilter,

        /// Only the allocation history of this invoice (number or id)
        #[arg(short, long, value_name = "INVOICE")]
        invoice: Option<String>,

        /// Number of payments to show, newest first (default: all)
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    // Determine config directory
    let cfg_dir = match cli.config_dir {
        Some(p) => p,
        None => config_dir()?,
    };

    match cli.command {
        Commands::Init => cmd_init(&cfg_dir),
        Commands::Parties => cmd_parties(&cfg_dir),
        Commands::Outstanding { party } => cmd_outstanding(&cfg_dir, &party),
        Commands::Allocate {
            party,
            amount,
            set,
            method,
            date,
            reference,
            notes,
            dry_run,
            json,
        } => cmd_allocate(
            &cfg_dir,
            AllocateArgs {
                party,
                amount,
                set,
                method,
                date,
                reference,
                notes,
                dry_run,
                json,
            },
        ),
        Commands::Payments {
            party,
            invoice,
            limit,
        } => cmd_payments(&cfg_dir, &party, invoice.as_deref(), limit),
    }
}

/// Initialize config directory with template files
fn cmd_init(cfg_dir: &Path) -> Result<()> {
    use std::fs;

    if cfg_dir.exists() {
        return Err(AllocationError::AlreadyInitialized(cfg_dir.to_path_buf()));
    }

    fs::create_dir_all(cfg_dir)?;
    fs::write(cfg_dir.join("config.toml"), CONFIG_TEMPLATE)?;
    fs::write(cfg_dir.join("parties.toml"), PARTIES_TEMPLATE)?;
    fs::write(ledger_file(cfg_dir), LEDGER_TEMPLATE)?;

    println!("Initialized payalloc config at: {}", cfg_dir.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Edit your settings:          $EDITOR {}/config.toml",
        cfg_dir.display()
    );
    println!(
        "  2. Add customers and vendors:   $EDITOR {}/parties.toml",
        cfg_dir.display()
    );
    println!(
        "  3. Import outstanding invoices: $EDITOR {}",
        ledger_file(cfg_dir).display()
    );
    println!();
    println!("Then allocate your first payment:");
    println!("  payalloc allocate --customer <id> --amount <amount> --dry-run");

    Ok(())
}

fn ensure_initialized(cfg_dir: &Path) -> Result<()> {
    if !cfg_dir.exists() {
        return Err(AllocationError::ConfigNotFound(cfg_dir.to_path_buf()));
    }
    Ok(())
}

// Table row structs for tabled
#[derive(Tabled)]
struct PartyRow {
    #[tabled(rename = "ROLE")]
    role: String,
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "EMAIL")]
    email: String,
}

#[derive(Tabled)]
struct OutstandingRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "INVOICE")]
    invoice: String,
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "TOTAL")]
    total: String,
    #[tabled(rename = "CREDITS")]
    credits: String,
    #[tabled(rename = "PAID")]
    paid: String,
    #[tabled(rename = "REMAINING")]
    remaining: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "INVOICE")]
    invoice: String,
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "REMAINING")]
    remaining: String,
    #[tabled(rename = "ALLOCATE")]
    allocate: String,
    #[tabled(rename = "AFTER")]
    after: String,
}

#[derive(Tabled)]
struct PaymentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "INVOICE")]
    invoice: u64,
    #[tabled(rename = "TYPE")]
    invoice_type: String,
    #[tabled(rename = "PARTY")]
    party: String,
    #[tabled(rename = "METHOD")]
    method: String,
    #[tabled(rename = "AMOUNT")]
    amount: String,
    #[tabled(rename = "REFERENCE")]
    reference: String,
}

/// Insert a comma every three digits of an unsigned digit string
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format a money amount with two decimal places and thousands separators
fn format_money(value: Decimal, currency_symbol: &str) -> String {
    let cents = round_cents(value);
    let sign = if cents.is_sign_negative() && !cents.is_zero() {
        "-"
    } else {
        ""
    };
    let rendered = format!("{:.2}", cents.abs());
    let (whole, frac) = rendered.split_once('.').unwrap_or((rendered.as_str(), "00"));

    format!("{sign}{currency_symbol}{}.{frac}", group_thousands(whole))
}

/// Right-align so the footer value column is at least `width` wide
fn pad_left(value: &str, width: usize) -> String {
    format!("{:>width$}", value)
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.to_string())
}

/// Append summary rows under a rounded table. The first `label_cols` columns merge into
/// one label cell, the next column holds the value and any later columns are closed off.
fn add_summary_footer(table: &str, label_cols: usize, rows: &[(&str, String)]) -> String {
    let lines: Vec<&str> = table.lines().collect();
    if lines.len() < 4 || rows.is_empty() {
        return table.to_string();
    }

    // Parse the top border to discover column widths
    let top = lines[0];
    let Some(inner) = top.strip_prefix('╭').and_then(|s| s.strip_suffix('╮')) else {
        return table.to_string();
    };

    let widths: Vec<usize> = inner.split('┬').map(|p| p.chars().count()).collect();
    if label_cols == 0 || widths.len() <= label_cols {
        return table.to_string();
    }

    let left_width = widths[..label_cols].iter().sum::<usize>() + label_cols - 1;
    let value_width = widths[label_cols];
    let trailing = &widths[label_cols + 1..];

    let dashes = |ws: &[usize]| -> Vec<String> { ws.iter().map(|w| "─".repeat(*w)).collect() };

    // Strip the original bottom border and start building
    let mut out = lines[..lines.len() - 1].join("\n");
    out.push('\n');

    out.push_str(&format!(
        "├{}┼{}",
        dashes(&widths[..label_cols]).join("┴"),
        "─".repeat(value_width)
    ));
    if trailing.is_empty() {
        out.push_str("┤\n");
    } else {
        out.push_str(&format!("┼{}╯\n", dashes(trailing).join("┴")));
    }

    for (idx, (label, value)) in rows.iter().enumerate() {
        out.push_str(&format!(
            "│ {:>left$} │ {:>value$} │\n",
            label,
            value,
            left = left_width - 2,
            value = value_width - 2
        ));
        if idx < rows.len() - 1 {
            out.push_str(&format!(
                "├{}┼{}┤\n",
                "─".repeat(left_width),
                "─".repeat(value_width)
            ));
        }
    }

    out.push_str(&format!(
        "╰{}┴{}╯",
        "─".repeat(left_width),
        "─".repeat(value_width)
    ));

    out
}

/// List configured customers and vendors
fn cmd_parties(cfg_dir: &Path) -> Result<()> {
    ensure_initialized(cfg_dir)?;

    let parties = load_parties(cfg_dir)?;

    if parties.customers.is_empty() && parties.vendors.is_empty() {
        println!("No parties configured.");
        println!("Add customers and vendors to: {}/parties.toml", cfg_dir.display());
        return Ok(());
    }

    let mut rows = Vec::new();
    for (role, table) in [("customer", &parties.customers), ("vendor", &parties.vendors)] {
        let mut sorted: Vec<_> = table.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        rows.extend(sorted.into_iter().map(|(key, party)| PartyRow {
            role: role.to_string(),
            key: key.clone(),
            id: party.id,
            name: party.name.clone(),
            email: party.email.clone().unwrap_or_default(),
        }));
    }

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    Ok(())
}

fn resolve_party(parties: &Parties, args: &PartyArgs) -> Result<(PartyRef, String)> {
    let (party, entry) = parties.resolve(args.customer.as_deref(), args.vendor.as_deref())?;
    Ok((party, entry.name))
}

/// Show a party's outstanding invoices
fn cmd_outstanding(cfg_dir: &Path, args: &PartyArgs) -> Result<()> {
    ensure_initialized(cfg_dir)?;

    let config = load_config(cfg_dir)?;
    let parties = load_parties(cfg_dir)?;
    let (party, name) = resolve_party(&parties, args)?;
    let symbol = &config.allocation.currency_symbol;

    let ledger = FileLedger::new(ledger_file(cfg_dir));
    let outstanding = outstanding_invoices(&ledger.invoices_for(party)?);

    if outstanding.is_empty() {
        println!("No outstanding invoices for {name}.");
        return Ok(());
    }

    let total = format_money(total_outstanding(&outstanding), symbol);
    let width = total.chars().count();

    let rows: Vec<OutstandingRow> = outstanding
        .iter()
        .enumerate()
        .map(|(idx, inv)| OutstandingRow {
            index: idx + 1,
            invoice: inv.label.clone(),
            date: format_date(inv.invoice_date),
            total: format_money(inv.total_amount, symbol),
            credits: format_money(inv.credit_total, symbol),
            paid: format_money(inv.paid_amount, symbol),
            remaining: pad_left(&format_money(inv.remaining, symbol), width),
            status: inv.payment_status.to_string(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    let table = add_summary_footer(&table, 6, &[("TOTAL OUTSTANDING", total)]);

    println!("Outstanding invoices for {name}");
    println!("{table}");

    Ok(())
}

struct AllocateArgs {
    party: PartyArgs,
    amount: Decimal,
    set: Vec<String>,
    method: Option<PaymentMethod>,
    date: Option<String>,
    reference: Option<String>,
    notes: Option<String>,
    dry_run: bool,
    json: bool,
}

/// Parse a manual override like "INV-2024-0002:150" into (invoice reference, amount)
fn parse_allocation_input(input: &str) -> Result<(&str, Decimal)> {
    let (reference, amount) = input
        .rsplit_once(':')
        .ok_or_else(|| AllocationError::InvalidAllocationFormat(input.to_string()))?;

    let reference = reference.trim();
    if reference.is_empty() {
        return Err(AllocationError::InvalidAllocationFormat(input.to_string()));
    }

    let amount: Decimal = amount
        .trim()
        .parse()
        .map_err(|_| AllocationError::InvalidAllocationFormat(input.to_string()))?;

    Ok((reference, amount))
}

fn parse_date(input: Option<&str>) -> Result<NaiveDate> {
    match input {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| AllocationError::InvalidDate(s.to_string())),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// Status an invoice would have once `allocated` is paid against it
fn status_after(inv: &OutstandingInvoice, allocated: Decimal) -> PaymentStatus {
    PaymentStatus::derive(inv.paid_amount + allocated, inv.remaining - allocated)
}

/// Allocate a payment and record it
fn cmd_allocate(cfg_dir: &Path, args: AllocateArgs) -> Result<()> {
    ensure_initialized(cfg_dir)?;

    let config = load_config(cfg_dir)?;
    let parties = load_parties(cfg_dir)?;
    let (party, name) = resolve_party(&parties, &args.party)?;
    let settings = &config.allocation;
    let symbol = &settings.currency_symbol;

    // Validate everything the user typed before touching the ledger
    let amount = validate_payment_amount(args.amount)?;
    let payment_date = parse_date(args.date.as_deref())?;
    let overrides = args
        .set
        .iter()
        .map(|s| parse_allocation_input(s))
        .collect::<Result<Vec<_>>>()?;

    let mut ledger = FileLedger::new(ledger_file(cfg_dir));
    let outstanding = outstanding_invoices(&ledger.invoices_for(party)?);
    check_overpayment(
        amount,
        total_outstanding(&outstanding),
        settings.allow_overpayment,
    )?;

    let mut session = AllocationSession::new(amount, outstanding)?;
    for (reference, value) in overrides {
        session.set_allocation_by_ref(reference, value)?;
    }
    let plan = session.plan();

    let common = CommonFields {
        party,
        payment_method: args.method.unwrap_or(settings.default_method),
        payment_date,
        reference_number: args.reference,
        notes: args.notes,
    };
    let convention = SignConvention::from_settings(settings.negate_purchase_amounts);

    if !args.json {
        print_plan(&name, &session, symbol);
    }

    if args.dry_run {
        // the preview goes through the same gate as a real submit
        let (preview, rejection) = match build_payments(&plan, &common, convention) {
            Ok(payments) => (payments, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };
        if args.json {
            print_json(&serde_json::json!({
                "party": { "kind": party_kind_name(party.kind), "id": party.id, "name": name },
                "mode": mode_name(session.mode()),
                "plan": plan,
                "balance": plan.balance(),
                "dry_run": true,
                "submittable": rejection.is_none(),
                "error": rejection,
                "payments": preview,
                "invalidated": [],
            }))?;
        } else {
            if let Some(reason) = rejection {
                println!("Would be rejected: {reason}");
            }
            println!("Dry run: nothing recorded.");
        }
        return Ok(());
    }

    let outcome = submit(&plan, &common, convention, &mut ledger)?;

    if args.json {
        print_json(&serde_json::json!({
            "party": { "kind": party_kind_name(party.kind), "id": party.id, "name": name },
            "mode": mode_name(session.mode()),
            "plan": plan,
            "balance": plan.balance(),
            "dry_run": false,
            "submittable": true,
            "error": null,
            "payments": outcome.payments,
            "invalidated": outcome.invalidated,
        }))?;
    } else {
        println!(
            "Recorded {} payment(s) for {} ({}, {})",
            outcome.payments.len(),
            name,
            common.payment_method,
            common.payment_date
        );
    }

    Ok(())
}

fn party_kind_name(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Customer => "customer",
        PartyKind::Vendor => "vendor",
    }
}

fn mode_name(mode: AllocationMode) -> &'static str {
    match mode {
        AllocationMode::Auto => "auto",
        AllocationMode::Manual => "manual",
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

fn print_plan(name: &str, session: &AllocationSession, symbol: &str) {
    let plan = session.plan();

    if session.invoices().is_empty() {
        println!("No outstanding invoices for {name}.");
    } else {
        let balance_row = match plan.balance() {
            Balance::Unallocated(x) => ("(=) UNALLOCATED", format_money(x, symbol)),
            Balance::OverAllocated(x) => ("(!) OVER-ALLOCATED", format_money(x, symbol)),
        };
        let summary = [
            ("PAYMENT", format_money(plan.payment_amount, symbol)),
            ("(-) ALLOCATED", format_money(plan.allocated, symbol)),
            balance_row,
        ];
        let width = summary
            .iter()
            .map(|(_, v)| v.chars().count())
            .max()
            .unwrap_or(0);

        let rows: Vec<PlanRow> = session
            .invoices()
            .iter()
            .enumerate()
            .map(|(idx, inv)| {
                let allocated = plan.amount_for(inv.invoice_id);
                PlanRow {
                    index: idx + 1,
                    invoice: inv.label.clone(),
                    date: format_date(inv.invoice_date),
                    remaining: format_money(inv.remaining, symbol),
                    allocate: if allocated.is_zero() {
                        pad_left("-", width)
                    } else {
                        pad_left(&format_money(allocated, symbol), width)
                    },
                    after: status_after(inv, allocated).to_string(),
                }
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        let table = add_summary_footer(&table, 4, &summary);

        println!("Allocation for {name} ({} mode)", mode_name(session.mode()));
        println!("{table}");
    }

    match plan.balance() {
        Balance::Unallocated(x) if x > Decimal::ZERO => println!(
            "Overpayment: {} exceeds the outstanding balance and is left unallocated.",
            format_money(x, symbol)
        ),
        Balance::OverAllocated(x) => println!(
            "Over-allocated by {}: reduce an invoice's share before recording.",
            format_money(x, symbol)
        ),
        _ => {}
    }
}

/// List recorded payments, or one invoice's allocation history
fn cmd_payments(
    cfg_dir: &Path,
    filter: &PartyFilter,
    invoice: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    ensure_initialized(cfg_dir)?;

    let config = load_config(cfg_dir)?;
    let parties = load_parties(cfg_dir)?;
    let symbol = &config.allocation.currency_symbol;

    let party = match (&filter.customer, &filter.vendor) {
        (None, None) => None,
        (customer, vendor) => Some(parties.resolve(customer.as_deref(), vendor.as_deref())?.0),
    };

    let ledger = FileLedger::new(ledger_file(cfg_dir)).load()?;
    let target = invoice
        .map(|reference| ledger.invoice_by_ref(reference, party))
        .transpose()?;
    let payments = match target {
        Some(inv) => ledger.payments_for_invoice(inv),
        None => ledger.payments_for(party),
    };

    if let Some(inv) = target {
        println!("Allocation history for {} ({})", inv.label(), inv.invoice_type);
    }
    if payments.is_empty() {
        println!("No payments recorded yet.");
        return Ok(());
    }

    // one invoice: close the table with its balance
    let summary: Vec<(&str, String)> = target
        .map(|inv| {
            let paid: Decimal = payments.iter().map(|p| p.magnitude()).sum();
            vec![
                ("NET TOTAL", format_money(net_total(inv), symbol)),
                ("(-) ALLOCATED", format_money(paid, symbol)),
                ("(=) REMAINING", format_money(compute_remaining(inv), symbol)),
            ]
        })
        .unwrap_or_default();
    let width = summary
        .iter()
        .map(|(_, v)| v.chars().count())
        .max()
        .unwrap_or(0);

    let party_name = |party: Option<PartyRef>| -> String {
        let Some(party) = party else {
            return "-".to_string();
        };
        let table = match party.kind {
            PartyKind::Customer => &parties.customers,
            PartyKind::Vendor => &parties.vendors,
        };
        table
            .values()
            .find(|p| p.id == party.id)
            .map_or_else(|| party.to_string(), |p| p.name.clone())
    };

    let shown: Vec<_> = payments.iter().rev().take(limit.unwrap_or(usize::MAX)).collect();
    let rows: Vec<PaymentRow> = shown
        .iter()
        .map(|p| PaymentRow {
            id: p.id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            date: p.payment_date.to_string(),
            invoice: p.invoice_id,
            invoice_type: p.invoice_type.to_string(),
            party: party_name(p.party()),
            method: p.payment_method.to_string(),
            amount: pad_left(&format_money(p.amount, symbol), width),
            reference: p.reference_number.clone().unwrap_or_default(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    let table = add_summary_footer(&table, 6, &summary);
    println!("{table}");
    println!();
    println!("Total: {} payments", payments.len());

    Ok(())
}
