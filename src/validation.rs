//! Input validation for processing requests
//!
//! Ids end up in backend URL paths and in worker payloads, so they are
//! checked before any network call is made.

use std::collections::HashSet;

use crate::error::{ProcessingError, ProcessingResult};

/// Maximum length of a posting, processing or CV id
const MAX_ID_LENGTH: usize = 128;

/// Maximum number of CV ids in a single run
const MAX_CV_IDS: usize = 10_000;

/// Validates an id that is interpolated into a URL path
pub fn validate_identifier(field: &str, value: &str) -> ProcessingResult<()> {
    if value.trim().is_empty() {
        return Err(ProcessingError::InvalidInput(format!("{field} must not be empty")));
    }

    if value.len() > MAX_ID_LENGTH {
        return Err(ProcessingError::InvalidInput(format!(
            "{field} too long: {} chars (max: {MAX_ID_LENGTH})",
            value.len()
        )));
    }

    // Uuids, numeric ids and slugs only
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ProcessingError::InvalidInput(format!(
            "{field} contains invalid characters: {value:?}"
        )));
    }

    Ok(())
}

/// Validates an explicit CV selection
pub fn validate_cv_ids(cv_ids: &[String]) -> ProcessingResult<()> {
    if cv_ids.len() > MAX_CV_IDS {
        return Err(ProcessingError::InvalidInput(format!(
            "Too many CVs selected: {} (max: {MAX_CV_IDS})",
            cv_ids.len()
        )));
    }

    let mut seen = HashSet::with_capacity(cv_ids.len());
    for cv_id in cv_ids {
        validate_identifier("cv_id", cv_id)?;
        if !seen.insert(cv_id.as_str()) {
            return Err(ProcessingError::InvalidInput(format!(
                "Duplicate CV id in selection: {cv_id}"
            )));
        }
    }

    Ok(())
}
