// Command-line front end. Thin: parses arguments, opens the store, calls
// into the library, and prints results. All business logic lives in the
// library.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use std::env;
use std::path::PathBuf;

use bike_rental::{
    business_report, end_rental, format_cents, list_available_bikes, register_bike,
    register_customer, rental_history, seed_sample_bikes, setup_database, start_rental,
    BikeCategory, RateTable,
};

const DEFAULT_DB: &str = "bike_rental.db";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let mut conn = open_store()?;
    let rates = load_rates()?;

    match args[1].as_str() {
        "init" => {
            let seeded = seed_sample_bikes(&conn)?;
            if seeded > 0 {
                println!("✓ Seeded {} sample bikes", seeded);
            } else {
                println!("✓ Database already initialized");
            }
        }

        "register-customer" => {
            let [name, email, phone] = expect_args(&args, "register-customer NAME EMAIL PHONE")?;
            let customer = register_customer(&conn, name, email, phone)?;
            println!("✓ Customer registered: {} (id {})", customer.name, customer.id);
        }

        "add-bike" => {
            let [category, model] = expect_args(&args, "add-bike CATEGORY MODEL")?;
            let category = BikeCategory::parse(category)?;
            let bike = register_bike(&conn, category, model, None)?;
            println!("✓ Bike added: {} {} (id {})", bike.category, bike.model, bike.id);
        }

        "bikes" => {
            let bikes = list_available_bikes(&conn)?;
            if bikes.is_empty() {
                println!("No bikes available for rent.");
            }
            for bike in bikes {
                let policy = rates.policy(bike.category);
                let rate = policy
                    .map(|p| {
                        format!(
                            "{}/hour, {}h grace, {}/hour overtime",
                            format_cents(p.hourly_cents),
                            p.grace_hours,
                            format_cents(p.overtime_cents()),
                        )
                    })
                    .unwrap_or_else(|| "no rate on file".to_string());
                println!(
                    "  #{:<4} {:<9} {:<24} {}",
                    bike.id,
                    bike.category.as_str(),
                    bike.model,
                    rate
                );
            }
        }

        "rent" => {
            let [bike_id, customer_id] = expect_args(&args, "rent BIKE_ID CUSTOMER_ID")?;
            let bike_id = parse_id(bike_id, "BIKE_ID")?;
            let customer_id = parse_id(customer_id, "CUSTOMER_ID")?;

            let rental = start_rental(&mut conn, bike_id, customer_id, Utc::now())?;
            println!("✓ Rental #{} started at {}", rental.id, rental.start_time.to_rfc3339());
        }

        "return" => {
            let [rental_id] = expect_args(&args, "return RENTAL_ID")?;
            let rental_id = parse_id(rental_id, "RENTAL_ID")?;

            let charge = end_rental(&mut conn, rental_id, Utc::now(), &rates)?;
            println!("✓ Rental #{} closed", rental_id);
            println!("  Billed hours: {}", charge.billed_hours);
            println!("  Base:         {}", format_cents(charge.base_cents));
            if charge.overtime_cents > 0 {
                println!("  Overtime:     {}", format_cents(charge.overtime_cents));
            }
            if charge.surcharge_cents > 0 {
                println!("  Surcharge:    {}", format_cents(charge.surcharge_cents));
            }
            println!("  Total:        {}", format_cents(charge.total_cents()));
        }

        "history" => {
            let [customer_id] = expect_args(&args, "history CUSTOMER_ID")?;
            let customer_id = parse_id(customer_id, "CUSTOMER_ID")?;

            let rentals = rental_history(&conn, customer_id)?;
            if rentals.is_empty() {
                println!("No rental history found.");
            }
            for rental in rentals {
                let total = rental
                    .charge
                    .map(|c| format_cents(c.total_cents()))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  #{:<4} bike {:<4} {}  {:<9} {}",
                    rental.id,
                    rental.bike_id,
                    rental.start_time.format("%Y-%m-%d %H:%M"),
                    rental.status.as_str(),
                    total,
                );
            }
        }

        "report" => {
            let report = business_report(&conn)?;
            println!("Business report");
            println!("  Total revenue:   {}", format_cents(report.total_revenue_cents));
            println!("  Total rentals:   {}", report.total_rentals);
            println!("  Active rentals:  {}", report.active_rentals);
            println!(
                "  Most popular:    {}",
                report.most_popular_category.as_deref().unwrap_or("N/A")
            );
            println!("  Avg billed time: {:.2} hours", report.average_billed_hours);
        }

        other => {
            print_usage();
            bail!("unknown command: {}", other);
        }
    }

    Ok(())
}

fn open_store() -> Result<Connection> {
    let path = env::var("BIKE_RENTAL_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB));

    let conn = Connection::open(&path)
        .with_context(|| format!("Failed to open database: {:?}", path))?;
    setup_database(&conn)?;

    Ok(conn)
}

fn load_rates() -> Result<RateTable> {
    match env::var("BIKE_RENTAL_RATES") {
        Ok(path) => RateTable::from_file(path),
        Err(_) => Ok(RateTable::builtin()),
    }
}

fn expect_args<'a, const N: usize>(args: &'a [String], usage: &str) -> Result<[&'a str; N]> {
    if args.len() != N + 2 {
        bail!("usage: bike-rental {}", usage);
    }

    let mut out = [""; N];
    for (slot, arg) in out.iter_mut().zip(&args[2..]) {
        *slot = arg.as_str();
    }
    Ok(out)
}

fn parse_id(s: &str, what: &str) -> Result<i64> {
    s.parse()
        .with_context(|| format!("{} must be a number, got {:?}", what, s))
}

fn print_usage() {
    println!("Bike Rental Management System v{}", bike_rental::VERSION);
    println!();
    println!("Usage: bike-rental COMMAND [ARGS]");
    println!();
    println!("  init                                  create tables and seed the sample fleet");
    println!("  register-customer NAME EMAIL PHONE    register a new customer");
    println!("  add-bike CATEGORY MODEL               add a bike (Mountain|Road|Hybrid|Electric)");
    println!("  bikes                                 list available bikes with rates");
    println!("  rent BIKE_ID CUSTOMER_ID              start a rental");
    println!("  return RENTAL_ID                      close a rental and print the charge");
    println!("  history CUSTOMER_ID                   rental history, newest first");
    println!("  report                                business analytics report");
    println!();
    println!("Environment: BIKE_RENTAL_DB (default {}), BIKE_RENTAL_RATES", DEFAULT_DB);
}
