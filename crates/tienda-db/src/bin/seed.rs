//! # Seed Data Generator
//!
//! Populates a database with demo products and numbering lanes for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p tienda-db --bin seed
//!
//! # Specify database path and store
//! cargo run -p tienda-db --bin seed -- --db ./data/tienda.db --store store-1
//! ```
//!
//! Creates:
//! - demo products across beverage, snack, dairy and grocery categories,
//!   each with a unique SKU, a price and a starting stock level
//! - two numbering lanes for the store: `B001` (receipts) and `F001`
//!   (invoices), both starting at 1

use chrono::Utc;
use std::env;
use tienda_core::{Product, VoucherType};
use tienda_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Demo products per category: (sku prefix, names)
const CATALOG: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Cola 500ml",
            "Orange Soda 500ml",
            "Sparkling Water 1L",
            "Still Water 1L",
            "Energy Drink 250ml",
            "Iced Tea 500ml",
            "Orange Juice 1L",
            "Apple Juice 1L",
        ],
    ),
    (
        "SNK",
        &[
            "Potato Chips Classic",
            "Tortilla Chips",
            "Chocolate Bar",
            "Gummy Bears",
            "Salted Pretzels",
            "Cookies Pack",
            "Peanuts Roasted",
            "Popcorn Butter",
        ],
    ),
    (
        "DRY",
        &[
            "Whole Milk 1L",
            "Skim Milk 1L",
            "Greek Yogurt",
            "Cheddar Cheese 200g",
            "Butter 250g",
            "Eggs Dozen",
        ],
    ),
    (
        "GRO",
        &[
            "White Bread",
            "Spaghetti 500g",
            "White Rice 1kg",
            "Canned Beans",
            "Canned Tomatoes",
            "Sunflower Oil 1L",
            "Sugar 1kg",
            "Salt 500g",
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tienda_dev.db");
    let mut store_id = String::from("store-1");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--store" | "-s" => {
                if i + 1 < args.len() {
                    store_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tienda POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: ./tienda_dev.db)");
                println!("  -s, --store <ID>    Store to seed (default: store-1)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Tienda POS Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!("Store:    {}", store_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count(&store_id).await?;
    if existing > 0 {
        println!("⚠ Store already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Seeding products...");

    let mut generated = 0;
    for (category, names) in CATALOG {
        for (idx, name) in names.iter().enumerate() {
            let product = demo_product(&store_id, category, name, generated + idx);
            db.products().insert(&product).await?;
        }
        generated += names.len();
        println!("  {} products after {}", generated, category);
    }

    println!();
    println!("Seeding numbering lanes...");

    let vouchers = db.voucher_service();
    let receipts = vouchers
        .create_series(&store_id, VoucherType::Receipt, "B001", 1)
        .await?;
    let invoices = vouchers
        .create_series(&store_id, VoucherType::Invoice, "F001", 1)
        .await?;
    println!("  {} (next: {})", receipts.lane_key(), receipts.peek().next_formatted_number);
    println!("  {} (next: {})", invoices.lane_key(), invoices.peek().next_formatted_number);

    println!();
    println!("✓ Seed complete: {} products, 2 lanes", generated);

    Ok(())
}

/// Builds one demo product with a deterministic price and stock level.
fn demo_product(store_id: &str, category: &str, name: &str, seed: usize) -> Product {
    let now = Utc::now();

    Product {
        id: Uuid::new_v4().to_string(),
        store_id: store_id.to_string(),
        sku: format!("{}-{:03}", category, seed),
        name: name.to_string(),
        // $1.49 - $9.49, stock 5-54
        price_cents: 149 + ((seed * 37) % 801) as i64,
        current_stock: 5 + (seed % 50) as i64,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
