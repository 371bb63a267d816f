use crate::config::IdentityConfig;
use crate::errors::ApiError;
use crate::metrics_defs::REQUEST_FORBIDDEN;
use axum::extract::{FromRef, FromRequestParts};
use http::HeaderMap;
use http::request::Parts;
use serde::Serialize;
use shared::counter;

/// The authenticated caller, as asserted by the front proxy.
///
/// Handlers never inspect it; it is handed to the engine verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl Identity {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Identity {
            name: name.into(),
            groups: Vec::new(),
        }
    }
}

/// Reads the caller identity from the configured headers.
///
/// Returns `None` when the user header is missing, empty or not valid UTF-8.
/// Groups may be sent as repeated headers, comma separated, or both.
pub fn resolve_identity(headers: &HeaderMap, config: &IdentityConfig) -> Option<Identity> {
    let name = headers
        .get(config.user_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())?;

    let groups = headers
        .get_all(config.group_header.as_str())
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect();

    Some(Identity {
        name: name.to_string(),
        groups,
    })
}

impl<S> FromRequestParts<S> for Identity
where
    IdentityConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = IdentityConfig::from_ref(state);
        resolve_identity(&parts.headers, &config).ok_or_else(|| {
            let err = ApiError::Unauthenticated;
            tracing::error!(path = %parts.uri.path(), "{err}");
            counter!(REQUEST_FORBIDDEN).increment(1);
            err
        })
    }
}
