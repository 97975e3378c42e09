//! # Seed Data Generator
//!
//! Populates the database with catalog products for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p vesta-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p vesta-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p vesta-db --bin seed -- --db ./data/vesta.db
//! ```
//!
//! Each product gets a unique SKU (`{CATEGORY}-{NAME}-{INDEX}`), a price in
//! the $0.99-$19.99 range, and a stock level of 0-100 units.

use chrono::Utc;
use std::env;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use vesta_core::Product;
use vesta_db::{Database, DbConfig};

/// Product categories for realistic test data.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Cola", "Lemon Soda", "Ginger Ale", "Sparkling Water", "Still Water",
            "Orange Juice", "Apple Juice", "Iced Tea", "Cold Brew", "Energy Drink",
        ],
    ),
    (
        "SNK",
        &[
            "Salted Chips", "Tortilla Chips", "Pretzels", "Trail Mix", "Granola Bar",
            "Dark Chocolate", "Gummy Bears", "Sandwich Cookies", "Crackers", "Popcorn",
        ],
    ),
    (
        "GRO",
        &[
            "White Bread", "Wheat Bread", "Spaghetti", "Penne", "White Rice",
            "Brown Rice", "Canned Beans", "Canned Corn", "Peanut Butter", "Honey",
        ],
    ),
];

/// Size variants with a price addon in cents.
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Medium", 100),
    ("Large", 200),
    ("6-Pack", 300),
    ("12-Pack", 500),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./vesta_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
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
                println!("Vesta OMS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./vesta_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Vesta OMS Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("Connected to database, migrations applied");

    // Skip if the catalog already has rows, to avoid SKU collisions.
    let existing = db.products().count().await?;
    if existing > 0 {
        println!("Database already has {} products; skipping seed.", existing);
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let mut generated = 0;
    let start = std::time::Instant::now();

    'outer: for (category_idx, (category_code, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size_name, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + name_idx * 20 + size_idx;
                let product = generate_product(category_code, name, size_name, *price_addon, seed);

                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
                    continue;
                }

                generated += 1;

                if generated % 50 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("Generated {} products in {:?}", generated, elapsed);

    Ok(())
}

/// Generates a single product with deterministic pseudo-random data.
fn generate_product(
    category: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    seed: usize,
) -> Product {
    let now = Utc::now();

    let sku = format!(
        "{}-{}-{:03}",
        category,
        name.replace(' ', "")[..3].to_uppercase(),
        seed
    );

    // Base price $0.99 - $8.99 plus the size addon.
    let base_price = 99 + ((seed * 17) % 800) as i64;
    let price_cents = base_price + price_addon;

    // Stock 0-100.
    let available_qty = (seed % 101) as i64;

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        name: format!("{} {}", name, size),
        description: None,
        price_cents,
        available_qty,
        is_active: true,
        created_at: now,
        updated_at: now,
        version: 0,
    }
}
