use tripbook_core::CoreError;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Translate a driver error into the domain taxonomy.
///
/// Unique violations become `Conflict`; lock conflicts become a retryable
/// `Conflict` so a losing concurrent writer never sees a 500.
pub(crate) fn db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let what = db.constraint().unwrap_or("unique constraint");
            return CoreError::Conflict(format!("duplicate value violates {}", what));
        }
        if matches!(db.code().as_deref(), Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)) {
            return CoreError::Conflict("concurrent update, please retry".to_string());
        }
    }
    CoreError::StorageError(err.to_string())
}
