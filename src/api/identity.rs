//! Session identity from the auth gateway's headers.

use crate::{
    core::identity::{Role, SessionUser},
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::HeaderMap, http::request::Parts};

/// Stable user id
pub const USER_ID_HEADER: &str = "x-user-id";
/// Contact email
pub const USER_EMAIL_HEADER: &str = "x-user-email";
/// Display name
pub const USER_NAME_HEADER: &str = "x-user-name";
/// `user` or `vendor`
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Reads the caller from request headers.
///
/// A missing id or role is [`Error::Unauthenticated`]; an unknown role is a
/// validation error. Email and name default to empty.
pub fn session_from_headers(headers: &HeaderMap) -> Result<SessionUser> {
    let id = header(headers, USER_ID_HEADER).ok_or(Error::Unauthenticated)?;
    let role: Role = header(headers, USER_ROLE_HEADER)
        .ok_or(Error::Unauthenticated)?
        .parse()?;

    Ok(SessionUser {
        id: id.to_string(),
        email: header(headers, USER_EMAIL_HEADER).unwrap_or_default().to_string(),
        name: header(headers, USER_NAME_HEADER).unwrap_or_default().to_string(),
        role,
    })
}

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        session_from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_full_identity() {
        let user = session_from_headers(&headers(&[
            (USER_ID_HEADER, "u-1"),
            (USER_EMAIL_HEADER, "u1@campus.edu"),
            (USER_NAME_HEADER, "Asha"),
            (USER_ROLE_HEADER, "vendor"),
        ]));
        assert!(matches!(user, Ok(ref u) if u.is_vendor() && u.email == "u1@campus.edu"));
    }

    #[test]
    fn test_missing_identity() {
        assert!(matches!(
            session_from_headers(&HeaderMap::new()),
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            session_from_headers(&headers(&[(USER_ID_HEADER, "u-1")])),
            Err(Error::Unauthenticated)
        ));
    }

    #[test]
    fn test_unknown_role() {
        assert!(matches!(
            session_from_headers(&headers(&[
                (USER_ID_HEADER, "u-1"),
                (USER_ROLE_HEADER, "admin")
            ])),
            Err(Error::Validation { .. })
        ));
    }
}
