// Rental operations: validation + persistence for the rental lifecycle.
// Start and end run inside a SQLite transaction so a rejected operation
// leaves no partial state behind.

use crate::db::{self, Bike, BusinessReport, Customer, Rental};
use crate::error::{RentalError, RentalResult};
use crate::pricing::{BikeCategory, Charge, RateTable};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

pub fn register_customer(
    conn: &Connection,
    name: &str,
    email: &str,
    phone: &str,
) -> RentalResult<Customer> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() {
        return Err(RentalError::validation("customer name must not be empty"));
    }
    if email.is_empty() {
        return Err(RentalError::validation("customer email must not be empty"));
    }

    let id = db::insert_customer(conn, name, email, phone.trim(), Utc::now())?;
    db::get_customer(conn, id)
}

pub fn register_bike(
    conn: &Connection,
    category: BikeCategory,
    model: &str,
    last_maintenance: Option<NaiveDate>,
) -> RentalResult<Bike> {
    let model = model.trim();
    if model.is_empty() {
        return Err(RentalError::validation("bike model must not be empty"));
    }

    let id = db::insert_bike(conn, category, model, last_maintenance)?;
    db::get_bike(conn, id)
}

pub fn list_available_bikes(conn: &Connection) -> RentalResult<Vec<Bike>> {
    db::list_available_bikes(conn)
}

/// Open a rental: the customer and bike must exist, and the bike must be
/// available. The rental row and the availability flip commit together.
pub fn start_rental(
    conn: &mut Connection,
    bike_id: i64,
    customer_id: i64,
    at: DateTime<Utc>,
) -> RentalResult<Rental> {
    let tx = conn.transaction()?;

    db::get_customer(&tx, customer_id)?;
    let bike = db::get_bike(&tx, bike_id)?;

    if !bike.available || db::open_rental_for_bike(&tx, bike_id)?.is_some() {
        return Err(RentalError::validation(format!(
            "bike {} is already rented",
            bike_id
        )));
    }

    let rental_id = db::insert_rental(&tx, bike_id, customer_id, at)?;
    db::set_bike_available(&tx, bike_id, false)?;

    let rental = db::get_rental(&tx, rental_id)?;
    tx.commit()?;

    Ok(rental)
}

/// Close a rental: compute the charge for the elapsed duration, persist
/// it, and release the bike. The charge is written exactly once.
pub fn end_rental(
    conn: &mut Connection,
    rental_id: i64,
    at: DateTime<Utc>,
    rates: &RateTable,
) -> RentalResult<Charge> {
    let tx = conn.transaction()?;

    let rental = db::get_rental(&tx, rental_id)?;
    if !rental.is_open() {
        return Err(RentalError::validation(format!(
            "rental {} is not open",
            rental_id
        )));
    }
    if at < rental.start_time {
        return Err(RentalError::validation(
            "rental end time precedes its start time",
        ));
    }

    let bike = db::get_bike(&tx, rental.bike_id)?;
    let charge = rates.quote(bike.category, at - rental.start_time)?;

    db::complete_rental(&tx, rental_id, at, &charge)?;
    db::set_bike_available(&tx, rental.bike_id, true)?;
    tx.commit()?;

    Ok(charge)
}

pub fn rental_history(conn: &Connection, customer_id: i64) -> RentalResult<Vec<Rental>> {
    db::get_customer(conn, customer_id)?;
    db::rentals_for_customer(conn, customer_id)
}

pub fn business_report(conn: &Connection) -> RentalResult<BusinessReport> {
    db::fetch_report(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    fn fixture(conn: &Connection) -> (i64, i64) {
        let customer = register_customer(conn, "Ada Lovelace", "ada@example.com", "555-0100")
            .unwrap();
        let bike = register_bike(conn, BikeCategory::Road, "Giant Defy", None).unwrap();
        (customer.id, bike.id)
    }

    #[test]
    fn test_register_customer_validates_fields() {
        let conn = test_conn();

        assert!(register_customer(&conn, "", "a@example.com", "555")
            .unwrap_err()
            .is_validation());
        assert!(register_customer(&conn, "Ada", "  ", "555")
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_full_rental_lifecycle() {
        let mut conn = test_conn();
        let (customer_id, bike_id) = fixture(&conn);
        let start = Utc::now();

        let rental = start_rental(&mut conn, bike_id, customer_id, start).unwrap();
        assert!(rental.is_open());
        assert!(!db::get_bike(&conn, bike_id).unwrap().available);

        let charge = end_rental(
            &mut conn,
            rental.id,
            start + Duration::minutes(90),
            &RateTable::builtin(),
        )
        .unwrap();

        // Road: $12/h, 3h grace; 1.5h bills as 2h within grace
        assert_eq!(charge.billed_hours, 2);
        assert_eq!(charge.total_cents(), 2400);

        let closed = db::get_rental(&conn, rental.id).unwrap();
        assert!(!closed.is_open());
        assert_eq!(closed.charge.unwrap(), charge);
        assert!(db::get_bike(&conn, bike_id).unwrap().available);
    }

    #[test]
    fn test_double_rent_rejected_and_state_unchanged() {
        let mut conn = test_conn();
        let (customer_id, bike_id) = fixture(&conn);
        let other = register_customer(&conn, "Grace Hopper", "grace@example.com", "555-0101")
            .unwrap();
        let start = Utc::now();

        start_rental(&mut conn, bike_id, customer_id, start).unwrap();

        let err = start_rental(&mut conn, bike_id, other.id, start).unwrap_err();
        assert!(err.is_validation());

        // Exactly one rental row; the open rental still belongs to the
        // first customer
        let open = db::open_rental_for_bike(&conn, bike_id).unwrap().unwrap();
        assert_eq!(open.customer_id, customer_id);
        assert!(rental_history(&conn, other.id).unwrap().is_empty());
    }

    #[test]
    fn test_start_rental_unknown_ids() {
        let mut conn = test_conn();
        let (customer_id, bike_id) = fixture(&conn);
        let now = Utc::now();

        assert!(start_rental(&mut conn, 999, customer_id, now)
            .unwrap_err()
            .is_not_found());
        assert!(start_rental(&mut conn, bike_id, 999, now)
            .unwrap_err()
            .is_not_found());

        // Neither failure touched the bike
        assert!(db::get_bike(&conn, bike_id).unwrap().available);
    }

    #[test]
    fn test_end_rental_twice_rejected() {
        let mut conn = test_conn();
        let (customer_id, bike_id) = fixture(&conn);
        let start = Utc::now();
        let rates = RateTable::builtin();

        let rental = start_rental(&mut conn, bike_id, customer_id, start).unwrap();
        end_rental(&mut conn, rental.id, start + Duration::hours(1), &rates).unwrap();

        let err = end_rental(&mut conn, rental.id, start + Duration::hours(2), &rates)
            .unwrap_err();
        assert!(err.is_validation());

        // The first charge is immutable
        let closed = db::get_rental(&conn, rental.id).unwrap();
        assert_eq!(closed.charge.unwrap().billed_hours, 1);
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut conn = test_conn();
        let (customer_id, bike_id) = fixture(&conn);
        let start = Utc::now();

        let rental = start_rental(&mut conn, bike_id, customer_id, start).unwrap();
        let err = end_rental(
            &mut conn,
            rental.id,
            start - Duration::hours(1),
            &RateTable::builtin(),
        )
        .unwrap_err();

        assert!(err.is_validation());

        // Still open, bike still held
        assert!(db::get_rental(&conn, rental.id).unwrap().is_open());
        assert!(!db::get_bike(&conn, bike_id).unwrap().available);
    }

    #[test]
    fn test_end_rental_matches_direct_quote() {
        let mut conn = test_conn();
        let (customer_id, _) = fixture(&conn);
        let rates = RateTable::builtin();
        let start = Utc::now();

        for (category, minutes) in [
            (BikeCategory::Mountain, 30),
            (BikeCategory::Road, 200),
            (BikeCategory::Hybrid, 60 * 7),
            (BikeCategory::Electric, 60 * 10),
        ] {
            let bike = register_bike(&conn, category, "Test Bike", None).unwrap();
            let rental = start_rental(&mut conn, bike.id, customer_id, start).unwrap();

            let elapsed = Duration::minutes(minutes);
            let charge = end_rental(&mut conn, rental.id, start + elapsed, &rates).unwrap();

            assert_eq!(charge, rates.quote(category, elapsed).unwrap());
        }
    }

    #[test]
    fn test_rental_history_requires_customer() {
        let conn = test_conn();
        assert!(rental_history(&conn, 42).unwrap_err().is_not_found());
    }

    #[test]
    fn test_business_report_aggregates() {
        let mut conn = test_conn();
        let (customer_id, bike_id) = fixture(&conn);
        let electric = register_bike(&conn, BikeCategory::Electric, "RadCity", None).unwrap();
        let rates = RateTable::builtin();
        let start = Utc::now();

        // One completed Road rental (2 billed hours: $24.00)
        let first = start_rental(&mut conn, bike_id, customer_id, start).unwrap();
        end_rental(&mut conn, first.id, start + Duration::minutes(90), &rates).unwrap();

        // Two Electric rentals, one still open
        let second = start_rental(&mut conn, electric.id, customer_id, start).unwrap();
        end_rental(&mut conn, second.id, start + Duration::hours(2), &rates).unwrap();
        start_rental(&mut conn, electric.id, customer_id, start).unwrap();

        let report = business_report(&conn).unwrap();
        assert_eq!(report.total_revenue_cents, 2400 + 5400);
        assert_eq!(report.total_rentals, 3);
        assert_eq!(report.active_rentals, 1);
        assert_eq!(report.most_popular_category.as_deref(), Some("Electric"));
        assert_eq!(report.average_billed_hours, 2.0);
    }
}
