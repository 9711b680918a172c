//! Principal resolution from request headers
//!
//! Authentication happens upstream; the gateway in front of this service
//! forwards the authenticated caller as:
//! - `x-principal-id`
//! - `x-principal-role` (`admin`, `manager`/`scout`, `artist`, `viewer`)
//! - `x-principal-entitlement` (`all`, `none`, or comma-separated artist ids;
//!   absent means `none`)

use crate::access::{Entitlement, Principal, Role};
use crate::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";
pub const PRINCIPAL_ENTITLEMENT_HEADER: &str = "x-principal-entitlement";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::Unauthorized(format!("{} is not valid text", name)))
        })
        .transpose()
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, PRINCIPAL_ID_HEADER)?
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Missing principal".to_string()))?;

        let role: Role = header(parts, PRINCIPAL_ROLE_HEADER)?
            .ok_or_else(|| ApiError::Unauthorized("Missing principal role".to_string()))?
            .parse()
            .map_err(ApiError::Unauthorized)?;

        let entitlement = match header(parts, PRINCIPAL_ENTITLEMENT_HEADER)? {
            Some(value) => value.parse().unwrap_or_default(),
            None => Entitlement::None,
        };

        Ok(Principal::new(id, role, entitlement))
    }
}
