//! # Seed Data Generator
//!
//! Populates the database with demo tickets for development.
//!
//! ## Usage
//! ```bash
//! # Generate 50 tickets (default)
//! cargo run -p ticketing-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p ticketing-db --bin seed -- --count 500
//!
//! # Specify database path (overrides TICKETING_DB_PATH)
//! cargo run -p ticketing-db --bin seed -- --db ./data/ticketing.db
//! ```
//!
//! A default company is registered when the database has none. Every run
//! appends tickets, so document numbers continue from the last one issued.
//! A JSON summary is printed at the end.

use rust_decimal::Decimal;
use serde::Serialize;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ticketing_core::{
    Amount, Company, NewCompany, NewTicket, NewTicketDetail, TaxPercentage, TicketHeader,
};
use ticketing_db::{AppConfig, Database};

/// Services and parts sold by the demo workshop: (product, unit price in cents).
const PRODUCTS: &[(&str, i64)] = &[
    ("Cambio de aceite", 2500),
    ("Filtro de aceite", 850),
    ("Filtro de aire", 1200),
    ("Aceite 20W50 (galon)", 3275),
    ("Refrigerante", 999),
    ("Alineacion", 1800),
    ("Balanceo por llanta", 350),
    ("Pastillas de freno", 4490),
    ("Lavado completo", 600),
    ("Revision electrica", 1500),
];

const CLIENTS: &[&str] = &[
    "Ana Torres",
    "Bruno Vera",
    "Carla Mendoza",
    "Diego Salazar",
    "Elena Rivas",
    "Fernando Paz",
    "Gabriela Ortiz",
    "Hector Luna",
];

const SELLERS: &[&str] = &["Luis", "Marta", "Jorge"];

#[derive(Debug, Serialize)]
struct SeedReport {
    database: String,
    company_id: i64,
    tax_percentage: TaxPercentage,
    generated: usize,
    failed: usize,
    first_document_number: Option<String>,
    last_document_number: Option<String>,
    grand_total: Amount,
    elapsed_ms: u128,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ticketing_db=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut config = AppConfig::load()?;
    let mut count: usize = 50;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse()?;
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Ticket Ledger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of tickets to generate (default: 50)");
                println!("  -d, --db <PATH>    Database file path (default: $TICKETING_DB_PATH or ./ticketing.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(
        database = %config.database_path.display(),
        count,
        "Seeding ticket ledger"
    );

    let db = Database::new(config.db_config()).await?;
    let company = ensure_company(&db).await?;

    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut failed = 0;
    let mut first_document_number = None;
    let mut last_document_number = None;
    let mut grand_total = Amount::zero();

    for seed in 0..count {
        match db.tickets().create(&generate_ticket(company.id, seed)).await {
            Ok(created) => {
                let number = created.ticket.document_number.to_string();
                first_document_number.get_or_insert_with(|| number.clone());
                last_document_number = Some(number);
                grand_total = grand_total
                    .checked_add(created.ticket.total)
                    .ok_or("grand total overflowed")?;
                generated += 1;

                if generated % 100 == 0 {
                    info!(generated, "Generating tickets...");
                }
            }
            Err(e) => {
                warn!(seed, error = %e, "Failed to create ticket");
                failed += 1;
            }
        }
    }

    let report = SeedReport {
        database: config.database_path.display().to_string(),
        company_id: company.id,
        tax_percentage: company.tax_percentage,
        generated,
        failed,
        first_document_number,
        last_document_number,
        grand_total,
        elapsed_ms: start.elapsed().as_millis(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    db.close().await;
    Ok(())
}

/// Returns the default company, registering a demo one if there is none.
async fn ensure_company(db: &Database) -> Result<Company, Box<dyn std::error::Error>> {
    if let Some(company) = db.companies().get_default().await? {
        info!(id = company.id, name = %company.name, "Using existing company");
        return Ok(company);
    }

    let company = db
        .companies()
        .create(&NewCompany {
            name: "Lubricadora El Progreso".to_string(),
            ruc: "0991234567001".to_string(),
            phone: "042345678".to_string(),
            sri_access_key: "demo-access-key".to_string(),
            address: "Av. 9 de Octubre 1200, Guayaquil".to_string(),
            tax_percentage: TaxPercentage::default(),
            client_name: None,
            client_ruc: None,
        })
        .await?;

    info!(id = company.id, "Registered demo company");
    Ok(company)
}

/// Generates a ticket with one to three line items from `seed`.
fn generate_ticket(company_id: i64, seed: usize) -> NewTicket {
    let lines = 1 + seed % 3;
    let letter = |n: usize| (b'A' + (n % 26) as u8) as char;
    let details = (0..lines)
        .map(|line| {
            let (product, cents) = PRODUCTS[(seed * 7 + line * 3) % PRODUCTS.len()];
            NewTicketDetail {
                product: product.to_string(),
                quantity: Decimal::from(1 + ((seed + line) % 4) as i64),
                unit_price: Decimal::new(cents, 2),
            }
        })
        .collect();

    NewTicket {
        company_id: Some(company_id),
        header: TicketHeader {
            seller: SELLERS[seed % SELLERS.len()].to_string(),
            client: CLIENTS[seed % CLIENTS.len()].to_string(),
            ci_ruc: format!("09{:08}", 10_000_000 + (seed * 7919) % 89_999_999),
            phone: format!("09{:08}", 80_000_000 + seed % 19_999_999),
            plate: format!("G{}{}-{:04}", letter(seed), letter(seed / 26), seed % 10_000),
        },
        details,
    }
}
