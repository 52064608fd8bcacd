// Header and credential resolution for a single test case

use restcheck_common::types::TestCase;
use std::collections::BTreeMap;

pub const AUTHORIZATION: &str = "Authorization";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredential {
    pub username: String,
    pub password: String,
}

/// Effective request headers plus the Basic credential, if one applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAuth {
    pub headers: BTreeMap<String, String>,
    pub credential: Option<BasicCredential>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Work out which authentication mode applies to `case`.
///
/// An explicit authorization header wins over basic-auth fields, and basic
/// auth needs both user and password. Anything else is an anonymous request.
/// The declared headers are copied, never modified.
pub fn resolve(case: &TestCase) -> ResolvedAuth {
    let mut headers = case.headers.clone().unwrap_or_default();

    if let Some(authorization) = non_empty(&case.authorization) {
        headers.retain(|name, _| !name.eq_ignore_ascii_case(AUTHORIZATION));
        headers.insert(AUTHORIZATION.to_string(), authorization.to_string());
        return ResolvedAuth {
            headers,
            credential: None,
        };
    }

    let credential = match (non_empty(&case.basic_auth_user), non_empty(&case.basic_auth_password)) {
        (Some(username), Some(password)) => Some(BasicCredential {
            username: username.to_string(),
            password: password.to_string(),
        }),
        _ => None,
    };

    ResolvedAuth { headers, credential }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restcheck_common::types::{HttpMethod, RunFlag};

    fn make_case() -> TestCase {
        TestCase {
            id: "1".to_string(),
            name: "auth".to_string(),
            run: RunFlag::Run,
            method: HttpMethod::Get,
            base_url: "http://localhost".to_string(),
            endpoint: "/secure".to_string(),
            authorization: None,
            basic_auth_user: None,
            basic_auth_password: None,
            headers: None,
            body: None,
            expected_status_code: 200,
            expected_response: None,
        }
    }

    #[test]
    fn test_authorization_header_added() {
        let mut case = make_case();
        case.authorization = Some("Bearer abc".to_string());
        case.headers = Some(BTreeMap::from([("Accept".to_string(), "application/json".to_string())]));

        let resolved = resolve(&case);

        assert_eq!(resolved.headers.get(AUTHORIZATION).map(String::as_str), Some("Bearer abc"));
        assert_eq!(resolved.headers.get("Accept").map(String::as_str), Some("application/json"));
        assert_eq!(resolved.credential, None);
        // the declared headers are left untouched
        assert!(!case.headers.unwrap().contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_authorization_header_wins_over_basic_auth() {
        let mut case = make_case();
        case.authorization = Some("Token t".to_string());
        case.basic_auth_user = Some("user".to_string());
        case.basic_auth_password = Some("pass".to_string());

        let resolved = resolve(&case);

        assert_eq!(resolved.credential, None);
        assert_eq!(resolved.headers.len(), 1);
    }

    #[test]
    fn test_declared_authorization_is_replaced_case_insensitively() {
        let mut case = make_case();
        case.authorization = Some("Bearer new".to_string());
        case.headers = Some(BTreeMap::from([("authorization".to_string(), "Bearer old".to_string())]));

        let resolved = resolve(&case);

        assert_eq!(resolved.headers.len(), 1);
        assert_eq!(resolved.headers.get(AUTHORIZATION).map(String::as_str), Some("Bearer new"));
    }

    #[test]
    fn test_basic_auth_credential() {
        let mut case = make_case();
        case.basic_auth_user = Some("user".to_string());
        case.basic_auth_password = Some("pass".to_string());
        case.headers = Some(BTreeMap::from([("X-Env".to_string(), "qa".to_string())]));

        let resolved = resolve(&case);

        assert_eq!(
            resolved.credential,
            Some(BasicCredential {
                username: "user".to_string(),
                password: "pass".to_string(),
            })
        );
        assert_eq!(resolved.headers, case.headers.unwrap());
    }

    #[test]
    fn test_incomplete_basic_auth_is_anonymous() {
        let mut case = make_case();
        case.basic_auth_user = Some("user".to_string());
        case.basic_auth_password = Some(String::new());

        let resolved = resolve(&case);

        assert_eq!(resolved, ResolvedAuth::default());
    }

    #[test]
    fn test_anonymous_request() {
        assert_eq!(resolve(&make_case()), ResolvedAuth::default());
    }
}
