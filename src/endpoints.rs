//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/expenses/{expense_id}', use `format_endpoint`.

/// The route for registering a new account.
pub const REGISTER: &str = "/api/auth/register";
/// The route for exchanging credentials for a session cookie.
pub const LOG_IN: &str = "/api/auth/log_in";
/// The route for ending the session.
pub const LOG_OUT: &str = "/api/auth/log_out";
/// The route for listing and creating records.
pub const EXPENSES: &str = "/api/expenses";
/// The route for a single record.
pub const EXPENSE: &str = "/api/expenses/{expense_id}";

/// Replace the first parameter in `endpoint_path` with `id`.
///
/// Parameters are written in braces, e.g. '/api/expenses/{expense_id}'.
/// Paths without a parameter are returned unchanged.
#[cfg(test)]
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::REGISTER);
        assert_endpoint_is_valid_uri(endpoints::LOG_IN);
        assert_endpoint_is_valid_uri(endpoints::LOG_OUT);
        assert_endpoint_is_valid_uri(endpoints::EXPENSES);
        assert_endpoint_is_valid_uri(&format_endpoint(endpoints::EXPENSE, 1));
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint(endpoints::EXPENSE, 42);

        assert_eq!(formatted_path, "/api/expenses/42");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint(endpoints::EXPENSES, 1);

        assert_eq!(formatted_path, endpoints::EXPENSES);
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint("/hello/{world}/bye", 1);

        assert_eq!(formatted_path, "/hello/1/bye");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
