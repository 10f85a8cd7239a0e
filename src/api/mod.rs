//! Axum HTTP handlers.

pub mod ask;
pub mod conversations;
pub mod datasets;
pub mod search;

use axum::http::StatusCode;

/// Longest query accepted, in characters; longer input is cut.
pub const MAX_QUERY_CHARS: usize = 2_000;

/// Trimmed, length-capped query, or 400 when it is blank.
pub(crate) fn validate_query(raw: &str) -> Result<String, (StatusCode, String)> {
    let query = raw.trim();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Query is required".to_string()));
    }
    Ok(truncate_to_char_boundary(query, MAX_QUERY_CHARS).to_string())
}

fn truncate_to_char_boundary(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_query_rejected() {
        let err = validate_query("   \n").unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_query_trimmed_and_capped() {
        assert_eq!(validate_query("  sort a vector ").unwrap(), "sort a vector");
        let long = "가".repeat(MAX_QUERY_CHARS + 10);
        assert_eq!(validate_query(&long).unwrap().chars().count(), MAX_QUERY_CHARS);
    }
}
