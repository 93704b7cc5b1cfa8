//! # Seed Data Generator
//!
//! Populates the buffer tables with demo data for development.
//!
//! ## Usage
//! ```bash
//! # Generate 50 customers with invoices (default)
//! cargo run -p relay-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p relay-db --bin seed -- --count 500
//!
//! # Specify database path
//! cargo run -p relay-db --bin seed -- --db ./data/relay.db
//! ```
//!
//! ## Generated Data
//! - One customer per index: `C0001`, `C0002`, ...
//! - Per customer one invoice with 1 to 3 monthly installments, written to
//!   BOTH layouts (`buffer_invoices` rows and header + due-dates), so the
//!   relay can be started with either `RELAY_INVOICE_LAYOUT`.
//! - Every 7th invoice has no number yet, like ERP drafts.

use chrono::{Duration, Months, NaiveDate, Utc};
use relay_core::{
    Customer, DueDate, DueDateRow, InvoiceHeader, InvoiceLayout, Money, SyncState,
};
use relay_db::{BufferStore, Database, DbConfig};
use std::env;
use uuid::Uuid;

const COMPANIES: &[&str] = &[
    "Atlas Distribution",
    "Boreal Foods",
    "Cobalt Engineering",
    "Delta Logistics",
    "Estuaire Textiles",
    "Fjord Maritime",
    "Granit Construction",
    "Horizon Pharma",
    "Iris Optique",
    "Jasper Retail",
];

const CURRENCIES: &[&str] = &["EUR", "EUR", "EUR", "USD", "CHF"];

const RISK_LEVELS: &[&str] = &["low", "low", "medium", "high"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 50;
    let mut db_path = String::from("./relay_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("ERP Buffer Relay Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of customers to generate (default: 50)");
                println!("  -d, --db <PATH>    Database file path (default: ./relay_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 ERP Buffer Relay Seed Data Generator");
    println!("=======================================");
    println!("Database:  {}", db_path);
    println!("Customers: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let (total, applied) = relay_db::migrations::migration_status(db.pool()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied ({}/{})", applied, total);

    let existing = db.customers().count().await?;
    if existing > 0 {
        println!("⚠ Buffer already has {} customers", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating buffer data...");

    let start = std::time::Instant::now();
    let mut installments = 0;

    for seed in 0..count {
        let customer = generate_customer(seed, count);
        db.customers().upsert(&customer).await?;

        let (header, dues) = generate_invoice(&customer, seed);

        for due in &dues {
            db.invoice_rows().upsert(&as_row(&header, due)).await?;
        }

        db.normalized_invoices().upsert_header(&header).await?;
        for due in &dues {
            db.normalized_invoices().upsert_due_date(due).await?;
        }

        installments += dues.len();

        if (seed + 1) % 100 == 0 {
            println!("  Generated {} customers...", seed + 1);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Generated {} customers and {} installments in {:?}",
        count, installments, elapsed
    );

    println!();
    println!("Buffer statistics ({} layout):", InvoiceLayout::Rows);
    let stats = BufferStore::stats(&db).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    println!("  Pending amount: {}", stats.pending_amount());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single customer with realistic data.
///
/// Creation times are one minute apart, oldest first.
fn generate_customer(seed: usize, count: usize) -> Customer {
    let company = COMPANIES[seed % COMPANIES.len()];
    let id = format!("C{:04}", seed + 1);

    Customer {
        id: id.clone(),
        code: Some(format!("CLI-{:05}", seed + 1)),
        company_name: format!("{} #{}", company, seed / COMPANIES.len() + 1),
        contact_name: Some(format!("Contact {}", seed + 1)),
        email: Some(format!("accounts+{}@example.com", id.to_lowercase())),
        phone: Some(format!("+33 1 {:02} {:02} {:02} {:02}", seed % 100, 10, 20, 30)),
        address: Some(format!("{} rue du Commerce, Paris", seed % 120 + 1)),
        payment_delay_days: Some([30, 45, 60][seed % 3]),
        currency: Some(CURRENCIES[seed % CURRENCIES.len()].to_string()),
        credit_limit_cents: Some(1_000_000 + (seed as i64 % 10) * 250_000),
        max_days_overdue: Some(90),
        risk_level: Some(RISK_LEVELS[seed % RISK_LEVELS.len()].to_string()),
        notes: None,
        is_active: seed % 11 != 0,
        sync_state: SyncState::Pending,
        sync_date: None,
        created_at: Utc::now() - Duration::minutes((count - seed) as i64),
    }
}

/// Generates one invoice with its installments.
fn generate_invoice(customer: &Customer, seed: usize) -> (InvoiceHeader, Vec<DueDate>) {
    let header_id = Uuid::new_v4().to_string();
    let invoice_date = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap_or_default()
        .checked_add_days(chrono::Days::new((seed % 300) as u64))
        .unwrap_or_default();

    let installment_count = seed % 3 + 1;
    let installment_cents = 5_000 + (seed as i64 * 37) % 95_000;

    let dues: Vec<DueDate> = (0..installment_count)
        .map(|n| DueDate {
            id: format!("P{:06}-{}", seed + 1, n + 1),
            invoice_id: header_id.clone(),
            due_date: invoice_date
                .checked_add_months(Months::new(n as u32 + 1))
                .unwrap_or(invoice_date),
            amount_cents: installment_cents,
            kind: Some("FA".to_string()),
            sync_state: SyncState::Pending,
            sync_date: None,
            created_at: customer.created_at,
        })
        .collect();

    let total: Money = dues.iter().map(|d| Money::from_cents(d.amount_cents)).sum();

    // ERP drafts have no number yet and must never be exported.
    let invoice_number = if seed % 7 == 6 {
        None
    } else {
        Some(format!("FA{:07}", seed + 1))
    };

    let header = InvoiceHeader {
        id: header_id,
        invoice_number,
        customer_id: customer.id.clone(),
        reference: Some(format!("ORDER-{:06}", seed + 1)),
        invoice_date,
        currency: customer.currency.clone().unwrap_or_else(|| "EUR".to_string()),
        total_amount_cents: total.cents(),
        created_by: Some("seed".to_string()),
        notes: None,
        sync_state: SyncState::Pending,
        sync_date: None,
        created_at: customer.created_at,
    };

    (header, dues)
}

/// Projects a normalized installment onto the row-per-due-date layout.
fn as_row(header: &InvoiceHeader, due: &DueDate) -> DueDateRow {
    DueDateRow {
        id: due.id.clone(),
        invoice_number: header.invoice_number.clone(),
        customer_id: header.customer_id.clone(),
        reference: header.reference.clone(),
        invoice_date: header.invoice_date,
        due_date: due.due_date,
        currency: header.currency.clone(),
        amount_cents: due.amount_cents,
        kind: due.kind.clone(),
        created_by: header.created_by.clone(),
        notes: header.notes.clone(),
        sync_state: due.sync_state,
        sync_date: None,
        created_at: due.created_at,
    }
}
