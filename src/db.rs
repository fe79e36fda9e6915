// Persistence layer: schema setup and row-level CRUD over the three
// tables (customers, bikes, rentals). Every function takes an explicit
// &Connection; nothing in here holds global state.

use crate::error::{RentalError, RentalResult};
use crate::pricing::{BikeCategory, Charge};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

// ============================================================================
// MODELS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bike {
    pub id: i64,
    pub category: BikeCategory,
    pub model: String,
    pub available: bool,
    pub last_maintenance: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalStatus {
    Active,
    Completed,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Active => "ACTIVE",
            RentalStatus::Completed => "COMPLETED",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(RentalStatus::Active),
            "COMPLETED" => Some(RentalStatus::Completed),
            _ => None,
        }
    }
}

/// A rental row. `end_time` and `charge` stay NULL while the rental is
/// open; both are written exactly once, when the rental closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rental {
    pub id: i64,
    pub bike_id: i64,
    pub customer_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub charge: Option<Charge>,
    pub status: RentalStatus,
}

impl Rental {
    pub fn is_open(&self) -> bool {
        self.status == RentalStatus::Active
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            phone TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bikes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            model TEXT NOT NULL,
            is_available INTEGER NOT NULL DEFAULT 1,
            last_maintenance TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rentals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bike_id INTEGER NOT NULL REFERENCES bikes(id),
            customer_id INTEGER NOT NULL REFERENCES customers(id),
            start_time TEXT NOT NULL,
            end_time TEXT,
            billed_hours INTEGER,
            base_cents INTEGER,
            overtime_cents INTEGER,
            surcharge_cents INTEGER,
            total_cents INTEGER,
            status TEXT NOT NULL DEFAULT 'ACTIVE'
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_rentals_bike ON rentals(bike_id, status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_rentals_customer ON rentals(customer_id, start_time)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    let created_at_str: String = row.get(4)?;

    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        created_at: parse_timestamp(4, &created_at_str)?,
    })
}

fn bike_from_row(row: &Row<'_>) -> rusqlite::Result<Bike> {
    let category_str: String = row.get(1)?;
    let category = BikeCategory::parse(&category_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let last_maintenance_str: Option<String> = row.get(4)?;

    Ok(Bike {
        id: row.get(0)?,
        category,
        model: row.get(2)?,
        available: row.get(3)?,
        last_maintenance: last_maintenance_str
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
    })
}

fn rental_from_row(row: &Row<'_>) -> rusqlite::Result<Rental> {
    let start_str: String = row.get(3)?;
    let end_str: Option<String> = row.get(4)?;

    let end_time = match end_str {
        Some(s) => Some(parse_timestamp(4, &s)?),
        None => None,
    };

    let billed_hours: Option<i64> = row.get(5)?;
    let charge = match billed_hours {
        Some(billed_hours) => Some(Charge {
            billed_hours,
            base_cents: row.get(6)?,
            overtime_cents: row.get(7)?,
            surcharge_cents: row.get(8)?,
        }),
        None => None,
    };

    let status_str: String = row.get(9)?;
    let status = RentalStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            9,
            rusqlite::types::Type::Text,
            format!("unknown rental status: {}", status_str).into(),
        )
    })?;

    Ok(Rental {
        id: row.get(0)?,
        bike_id: row.get(1)?,
        customer_id: row.get(2)?,
        start_time: parse_timestamp(3, &start_str)?,
        end_time,
        charge,
        status,
    })
}

const RENTAL_COLUMNS: &str = "id, bike_id, customer_id, start_time, end_time, \
     billed_hours, base_cents, overtime_cents, surcharge_cents, status";

// ============================================================================
// CUSTOMERS
// ============================================================================

pub fn insert_customer(
    conn: &Connection,
    name: &str,
    email: &str,
    phone: &str,
    created_at: DateTime<Utc>,
) -> RentalResult<i64> {
    let result = conn.execute(
        "INSERT INTO customers (name, email, phone, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![name, email, phone, created_at.to_rfc3339()],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(RentalError::validation(format!(
                "email already registered: {}",
                email
            )))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_customer(conn: &Connection, id: i64) -> RentalResult<Customer> {
    conn.query_row(
        "SELECT id, name, email, phone, created_at FROM customers WHERE id = ?1",
        params![id],
        customer_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => RentalError::not_found("customer", id),
        other => other.into(),
    })
}

pub fn find_customer_by_email(conn: &Connection, email: &str) -> RentalResult<Option<Customer>> {
    let result = conn.query_row(
        "SELECT id, name, email, phone, created_at FROM customers WHERE email = ?1",
        params![email],
        customer_from_row,
    );

    match result {
        Ok(customer) => Ok(Some(customer)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// BIKES
// ============================================================================

pub fn insert_bike(
    conn: &Connection,
    category: BikeCategory,
    model: &str,
    last_maintenance: Option<NaiveDate>,
) -> RentalResult<i64> {
    conn.execute(
        "INSERT INTO bikes (category, model, is_available, last_maintenance)
         VALUES (?1, ?2, 1, ?3)",
        params![
            category.as_str(),
            model,
            last_maintenance.map(|d| d.format("%Y-%m-%d").to_string()),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn get_bike(conn: &Connection, id: i64) -> RentalResult<Bike> {
    conn.query_row(
        "SELECT id, category, model, is_available, last_maintenance FROM bikes WHERE id = ?1",
        params![id],
        bike_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => RentalError::not_found("bike", id),
        other => other.into(),
    })
}

pub fn list_available_bikes(conn: &Connection) -> RentalResult<Vec<Bike>> {
    let mut stmt = conn.prepare(
        "SELECT id, category, model, is_available, last_maintenance
         FROM bikes WHERE is_available = 1 ORDER BY id",
    )?;

    let bikes = stmt
        .query_map([], bike_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(bikes)
}

pub fn set_bike_available(conn: &Connection, bike_id: i64, available: bool) -> RentalResult<()> {
    let updated = conn.execute(
        "UPDATE bikes SET is_available = ?2 WHERE id = ?1",
        params![bike_id, available],
    )?;

    if updated == 0 {
        return Err(RentalError::not_found("bike", bike_id));
    }
    Ok(())
}

// ============================================================================
// RENTALS
// ============================================================================

pub fn insert_rental(
    conn: &Connection,
    bike_id: i64,
    customer_id: i64,
    start_time: DateTime<Utc>,
) -> RentalResult<i64> {
    conn.execute(
        "INSERT INTO rentals (bike_id, customer_id, start_time, status)
         VALUES (?1, ?2, ?3, 'ACTIVE')",
        params![bike_id, customer_id, start_time.to_rfc3339()],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn get_rental(conn: &Connection, id: i64) -> RentalResult<Rental> {
    conn.query_row(
        &format!("SELECT {} FROM rentals WHERE id = ?1", RENTAL_COLUMNS),
        params![id],
        rental_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => RentalError::not_found("rental", id),
        other => other.into(),
    })
}

/// The open rental for a bike, if any. The data model guarantees at most
/// one exists.
pub fn open_rental_for_bike(conn: &Connection, bike_id: i64) -> RentalResult<Option<Rental>> {
    let result = conn.query_row(
        &format!(
            "SELECT {} FROM rentals WHERE bike_id = ?1 AND status = 'ACTIVE'",
            RENTAL_COLUMNS
        ),
        params![bike_id],
        rental_from_row,
    );

    match result {
        Ok(rental) => Ok(Some(rental)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write the close-time fields. The charge is written once; only an
/// ACTIVE rental row is eligible.
pub fn complete_rental(
    conn: &Connection,
    rental_id: i64,
    end_time: DateTime<Utc>,
    charge: &Charge,
) -> RentalResult<()> {
    let updated = conn.execute(
        "UPDATE rentals SET
            end_time = ?2,
            billed_hours = ?3,
            base_cents = ?4,
            overtime_cents = ?5,
            surcharge_cents = ?6,
            total_cents = ?7,
            status = 'COMPLETED'
         WHERE id = ?1 AND status = 'ACTIVE'",
        params![
            rental_id,
            end_time.to_rfc3339(),
            charge.billed_hours,
            charge.base_cents,
            charge.overtime_cents,
            charge.surcharge_cents,
            charge.total_cents(),
        ],
    )?;

    if updated == 0 {
        return Err(RentalError::not_found("rental", rental_id));
    }
    Ok(())
}

pub fn rentals_for_customer(conn: &Connection, customer_id: i64) -> RentalResult<Vec<Rental>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM rentals WHERE customer_id = ?1 ORDER BY start_time DESC",
        RENTAL_COLUMNS
    ))?;

    let rentals = stmt
        .query_map(params![customer_id], rental_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rentals)
}

// ============================================================================
// ANALYTICS
// ============================================================================

/// Aggregates for the business report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessReport {
    pub total_revenue_cents: i64,
    pub total_rentals: i64,
    pub active_rentals: i64,
    pub most_popular_category: Option<String>,
    pub average_billed_hours: f64,
}

pub fn fetch_report(conn: &Connection) -> RentalResult<BusinessReport> {
    let total_revenue_cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(total_cents), 0) FROM rentals WHERE status = 'COMPLETED'",
        [],
        |row| row.get(0),
    )?;

    let total_rentals: i64 =
        conn.query_row("SELECT COUNT(*) FROM rentals", [], |row| row.get(0))?;

    let active_rentals: i64 = conn.query_row(
        "SELECT COUNT(*) FROM rentals WHERE status = 'ACTIVE'",
        [],
        |row| row.get(0),
    )?;

    let most_popular_category: Option<String> = conn
        .query_row(
            "SELECT b.category
             FROM rentals r JOIN bikes b ON r.bike_id = b.id
             GROUP BY b.category
             ORDER BY COUNT(*) DESC, b.category
             LIMIT 1",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    let average_billed_hours: f64 = conn.query_row(
        "SELECT COALESCE(AVG(billed_hours), 0.0) FROM rentals WHERE billed_hours IS NOT NULL",
        [],
        |row| row.get(0),
    )?;

    Ok(BusinessReport {
        total_revenue_cents,
        total_rentals,
        active_rentals,
        most_popular_category,
        average_billed_hours,
    })
}

// ============================================================================
// SAMPLE DATA
// ============================================================================

/// Seed the starter fleet if the bikes table is empty.
pub fn seed_sample_bikes(conn: &Connection) -> RentalResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM bikes", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(0);
    }

    let fleet: [(BikeCategory, &str, &str); 6] = [
        (BikeCategory::Mountain, "Trek X-Caliber", "2024-01-15"),
        (BikeCategory::Road, "Giant Defy", "2024-01-20"),
        (BikeCategory::Hybrid, "Cannondale Quick", "2024-01-18"),
        (BikeCategory::Electric, "Rad Power RadCity", "2024-01-22"),
        (BikeCategory::Mountain, "Specialized Rockhopper", "2024-01-10"),
        (BikeCategory::Road, "Cannondale CAAD", "2024-01-25"),
    ];

    for (category, model, maintained) in fleet {
        let date = NaiveDate::parse_from_str(maintained, "%Y-%m-%d").ok();
        insert_bike(conn, category, model, date)?;
    }

    Ok(fleet.len())
}

// ============================================================================
// TESTS
// ============================================================================
