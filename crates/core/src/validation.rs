//! Input validation for analysis submissions and job updates.
//!
//! Pure functions returning [`CoreError::Validation`] so both the HTTP layer
//! and the registry can call them without duplicating rules.

use crate::error::CoreError;
use crate::job::FileRef;
use crate::types::JsonObject;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper bound on the job progress percentage.
pub const MAX_PROGRESS: u32 = 100;

/// Maximum length of the instructions text, in characters.
pub const MAX_INSTRUCTIONS_LEN: usize = 20_000;

/// Maximum number of files in one submission.
pub const MAX_FILES: usize = 32;

/// Maximum length of an uploaded file name.
const MAX_FILE_NAME_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Validate the instructions text.
///
/// Rules:
/// - Must contain at least one non-whitespace character.
/// - Must not exceed `MAX_INSTRUCTIONS_LEN` characters.
pub fn validate_instructions(instructions: &str) -> Result<(), CoreError> {
    if instructions.trim().is_empty() {
        return Err(CoreError::Validation(
            "Instructions cannot be empty".to_string(),
        ));
    }
    if instructions.chars().count() > MAX_INSTRUCTIONS_LEN {
        return Err(CoreError::Validation(format!(
            "Instructions must not exceed {MAX_INSTRUCTIONS_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate the set of uploaded file references.
///
/// Rules:
/// - At least one file, at most `MAX_FILES`.
/// - Each name must be non-empty, at most `MAX_FILE_NAME_LEN` bytes, and
///   must not contain path separators.
pub fn validate_files(files: &[FileRef]) -> Result<(), CoreError> {
    if files.is_empty() {
        return Err(CoreError::Validation(
            "At least one file is required".to_string(),
        ));
    }
    if files.len() > MAX_FILES {
        return Err(CoreError::Validation(format!(
            "A submission may contain at most {MAX_FILES} files"
        )));
    }
    for (i, file) in files.iter().enumerate() {
        if file.name.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "File at index {i} has an empty name"
            )));
        }
        if file.name.len() > MAX_FILE_NAME_LEN {
            return Err(CoreError::Validation(format!(
                "File name at index {i} exceeds {MAX_FILE_NAME_LEN} bytes"
            )));
        }
        if file.name.contains('/') || file.name.contains('\\') {
            return Err(CoreError::Validation(format!(
                "File name '{}' must not contain path separators",
                file.name
            )));
        }
    }
    Ok(())
}

/// Parse the optional `additional_params` form field.
///
/// An empty string yields an empty bag. Anything other than a JSON object
/// is rejected.
pub fn parse_parameter_bag(raw: &str) -> Result<JsonObject, CoreError> {
    if raw.trim().is_empty() {
        return Ok(JsonObject::new());
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(CoreError::Validation(
            "additional_params must be a JSON object".to_string(),
        )),
        Err(e) => Err(CoreError::Validation(format!(
            "additional_params is not valid JSON: {e}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// Validate a progress percentage supplied by an update.
pub fn validate_progress(progress: u32) -> Result<(), CoreError> {
    if progress > MAX_PROGRESS {
        return Err(CoreError::Validation(format!(
            "Progress must be between 0 and {MAX_PROGRESS}, got {progress}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
