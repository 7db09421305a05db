//! Caller identity taken from request headers.
//!
//! Authentication happens upstream; this server trusts `x-user-id` and
//! `x-user-role` as given.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use domain::UserId;
use fulfillment::Caller;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Roles a caller can present. Only `admin` grants extra rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Driver,
    Customer,
}

impl std::str::FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "driver" => Ok(Role::Driver),
            "customer" | "" => Ok(Role::Customer),
            other => Err(ApiError::BadRequest(format!("unknown role: {other}"))),
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| ApiError::BadRequest(format!("{name} is not valid text")))
        })
        .transpose()
}

/// Extractor for the calling user.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id: i64 = header(parts, USER_ID_HEADER)?
            .ok_or_else(|| ApiError::Unauthorized(format!("{USER_ID_HEADER} header is required")))?
            .trim()
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("{USER_ID_HEADER} must be an integer")))?;
        let role: Role = header(parts, USER_ROLE_HEADER)?.unwrap_or("customer").parse()?;

        Ok(Identity(Caller {
            user_id: UserId::new(user_id),
            is_admin: role == Role::Admin,
        }))
    }
}
