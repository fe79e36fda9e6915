// Error taxonomy for rental operations
// Validation and not-found failures surface to the caller unchanged;
// storage failures are wrapped, never swallowed.

use std::fmt;

#[derive(Debug)]
pub enum RentalError {
    /// Input that the data model rejects: unknown category, negative
    /// duration, unavailable bike, closing a rental that is not open,
    /// duplicate customer email.
    Validation(String),

    /// A referenced customer/bike/rental id does not exist.
    NotFound { entity: &'static str, id: i64 },

    /// Underlying SQLite failure.
    Storage(rusqlite::Error),
}

impl RentalError {
    pub fn validation(msg: impl Into<String>) -> Self {
        RentalError::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        RentalError::NotFound { entity, id }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, RentalError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RentalError::NotFound { .. })
    }
}

impl fmt::Display for RentalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RentalError::Validation(msg) => write!(f, "validation error: {}", msg),
            RentalError::NotFound { entity, id } => {
                write!(f, "{} not found: id {}", entity, id)
            }
            RentalError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for RentalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RentalError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for RentalError {
    fn from(e: rusqlite::Error) -> Self {
        RentalError::Storage(e)
    }
}

pub type RentalResult<T> = Result<T, RentalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_validation() {
        let err = RentalError::validation("duration must be non-negative");
        assert_eq!(
            err.to_string(),
            "validation error: duration must be non-negative"
        );
        assert!(err.is_validation());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_display_not_found() {
        let err = RentalError::not_found("bike", 42);
        assert_eq!(err.to_string(), "bike not found: id 42");
        assert!(err.is_not_found());
    }
}
