mod auth;
mod matches;
mod playoffs;

use crate::http::{Request, RequestUri, Result};
use crate::StatusCodeError;

pub async fn route(req: Request, mut uri: RequestUri<'_>) -> Result {
    match uri.take_str() {
        Some("auth") => auth::route(req, uri).await,
        Some("playoffs") => playoffs::route(req, uri).await,
        Some("matches") => matches::route(req, uri).await,
        _ => Err(StatusCodeError::not_found().into()),
    }
}
