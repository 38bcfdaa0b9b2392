//! Identifier helpers

use crate::errors::{AppError, Result};
use uuid::Uuid;

/// Generate a new creation-ordered record id
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// Parse a path id, reporting a malformed value as a format error
/// rather than letting it surface as "not found".
pub fn parse_id(raw: &str, kind: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::InvalidFormat {
        message: format!("Invalid {} ID format.", kind),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = new_id();
        assert_eq!(parse_id(&id.to_string(), "News").unwrap(), id);

        let err = parse_id("not-an-id", "News").unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat { .. }));
        assert!(err.to_string().contains("Invalid News ID format"));
    }

    #[test]
    fn test_ids_are_creation_ordered() {
        let first = new_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = new_id();
        assert!(first < second);
    }
}
