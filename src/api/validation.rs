use super::ApiError;

/// Parses an `{id}` path segment. Anything that is not a positive integer
/// cannot name a record, so it is reported as not found.
pub fn read_id_param(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}
