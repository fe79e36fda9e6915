// Bike Rental Management System - Core Library
// Pricing engine, persistence layer, and rental operations, shared by
// the CLI and the tests.

pub mod db;
pub mod error;
pub mod pricing;
pub mod rental;

// Re-export commonly used types
pub use db::{
    setup_database, seed_sample_bikes,
    Bike, BusinessReport, Customer, Rental, RentalStatus,
};
pub use error::{RentalError, RentalResult};
pub use pricing::{
    format_cents, BikeCategory, Charge, RatePolicy, RateTable, BILLING_UNIT_SECS,
};
pub use rental::{
    business_report, end_rental, list_available_bikes, register_bike,
    register_customer, rental_history, start_rental,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
