//! Request extractors that reject with the API's JSON error shape.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::app::errors::ApiError;

/// `Json<T>` whose rejection renders as `{"error":"validation_error",...}`.
///
/// Guarded handlers take `Result<ValidatedJson<T>, ApiError>` so the caller is
/// authorized before a malformed body is reported.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
