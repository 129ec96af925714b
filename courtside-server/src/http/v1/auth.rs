use courtside_api::auth::{Claims, LoginData, RefreshToken};
use hyper::Method;
use sha2::{Digest, Sha256};

use crate::http::{Request, RequestUri, Response, Result};
use crate::{method, StatusCodeError};

pub async fn route(req: Request, mut uri: RequestUri<'_>) -> Result {
    match uri.take_str() {
        Some("login") => method!(req, {
            Method::POST => login(req).await,
        }),
        Some("refresh") => method!(req, {
            Method::POST => refresh(req).await,
        }),
        _ => Err(StatusCodeError::not_found().into()),
    }
}

async fn login(mut req: Request) -> Result {
    let body: LoginData = req.json().await?;

    let user = match req.state().store.users().get(&body.username).await? {
        Some(user) => user,
        None => return Err(StatusCodeError::unauthorized().into()),
    };

    let digest = hex::encode(Sha256::digest(body.password.as_bytes()));
    if digest != user.password {
        return Err(StatusCodeError::unauthorized().into());
    }

    let tokens = req
        .state()
        .auth
        .create_tokens(Claims::new(user.id.0, user.role))?;

    Ok(Response::ok().json(&tokens))
}

async fn refresh(mut req: Request) -> Result {
    let body: RefreshToken = req.json().await?;

    match req.state().auth.validate_refresh_token(body.refresh_token) {
        Ok(token) => {
            let tokens = req.state().auth.create_tokens(token.into_claims())?;
            Ok(Response::ok().json(&tokens))
        }
        Err(_) => Err(StatusCodeError::unauthorized().into()),
    }
}
