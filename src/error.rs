// ⚠️ Registry Errors
// Every failure here is routine (a bad lookup from the menu), never fatal.

use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    // Key errors
    #[error("Plate already registered: {0}")]
    DuplicatePlate(String),

    #[error("Plate not found: {0}")]
    PlateNotFound(String),

    #[error("Owner not found: {0}")]
    OwnerNotFound(String),

    #[error("Plate must not be empty")]
    EmptyPlate,

    // Update errors
    #[error("Invalid field path: {0}")]
    InvalidFieldPath(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidFieldValue { field: String, value: String },
}

impl RegistryError {
    /// True for "the key is not there" errors (plate or owner)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::PlateNotFound(_) | RegistryError::OwnerNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RegistryError::DuplicatePlate("ABC123".to_string()).to_string(),
            "Plate already registered: ABC123"
        );
        assert_eq!(
            RegistryError::InvalidFieldValue {
                field: "vehicle.year".to_string(),
                value: "soon".to_string(),
            }
            .to_string(),
            "Invalid value for vehicle.year: soon"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(RegistryError::PlateNotFound("X".to_string()).is_not_found());
        assert!(RegistryError::OwnerNotFound("DL1".to_string()).is_not_found());
        assert!(!RegistryError::EmptyPlate.is_not_found());
    }
}
