pub mod booking;
pub mod identity;
pub mod repository;
pub mod search;

use aerobook_catalog::{FlightError, InventoryError, SeatClass};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    /// Authenticated, but not a party to the resource.
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Not enough available seats in {seat_class} class.")]
    InsufficientInventory {
        seat_class: SeatClass,
        requested: u32,
        available: u32,
    },
    #[error("Could not allocate {requested} unique {seat_class} seats.")]
    AllocationExhausted { seat_class: SeatClass, requested: u32 },
    #[error("Booking is already cancelled.")]
    AlreadyCancelled,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Internal service error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable name, used in error response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Unauthenticated(_) => "unauthenticated",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::Unauthorized(_) => "unauthorized",
            CoreError::NotFound(_) => "not_found",
            CoreError::InsufficientInventory { .. } => "insufficient_inventory",
            CoreError::AllocationExhausted { .. } => "allocation_exhausted",
            CoreError::AlreadyCancelled => "already_cancelled",
            CoreError::Validation(_) => "validation_error",
            CoreError::Conflict(_) => "conflict",
            CoreError::InvalidCredentials => "invalid_credentials",
            CoreError::Internal(_) => "internal",
        }
    }
}

impl From<InventoryError> for CoreError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientInventory { seat_class, requested, available } => {
                CoreError::InsufficientInventory { seat_class, requested, available }
            }
            InventoryError::AllocationExhausted { seat_class, requested, .. } => {
                CoreError::AllocationExhausted { seat_class, requested }
            }
        }
    }
}

impl From<FlightError> for CoreError {
    fn from(err: FlightError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Case-insensitive equality using full Unicode lowercasing, as SQL `LOWER()` does.
pub fn eq_lowercase(a: &str, b: &str) -> bool {
    a.chars().flat_map(char::to_lowercase).eq(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_errors_carry_seat_class() {
        let err: CoreError = InventoryError::InsufficientInventory {
            seat_class: SeatClass::Business,
            requested: 3,
            available: 1,
        }
        .into();
        assert_eq!(err.code(), "insufficient_inventory");
        assert_eq!(err.to_string(), "Not enough available seats in business class.");
    }

    #[test]
    fn test_eq_lowercase_folds_non_ascii() {
        assert!(eq_lowercase("São Paulo", "SÃO PAULO"));
        assert!(eq_lowercase("Zürich", "zÜrich"));
        assert!(!eq_lowercase("Zürich", "Zurich"));
    }
}
