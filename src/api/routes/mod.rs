//! API route modules.

use std::collections::HashMap;

use crate::api::error::ApiError;

pub mod bots;
pub mod meetings;
pub mod uploads;
pub mod webhook;

/// Pulls a required, non-blank query parameter.
pub(crate) fn required_param<'a>(
    params: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, ApiError> {
    match params.get(name).map(String::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::bad_request(format!("{} is required", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_param() {
        let mut params = HashMap::new();
        params.insert("user_id".to_string(), "u1".to_string());
        params.insert("bot_id".to_string(), "  ".to_string());

        assert_eq!(required_param(&params, "user_id").unwrap(), "u1");
        assert!(required_param(&params, "bot_id").is_err());
        assert!(required_param(&params, "missing").is_err());
    }
}
