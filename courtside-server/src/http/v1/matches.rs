use courtside_api::id::MatchId;
use courtside_api::playoffs::{DeclareWinner, PartialMatch};
use hyper::Method;

use crate::http::{Request, RequestUri, Response, Result};
use crate::{method, StatusCodeError};

pub async fn route(req: Request, mut uri: RequestUri<'_>) -> Result {
    match uri.take() {
        None => Err(StatusCodeError::not_found().into()),
        Some(part) => {
            let id = part.parse()?;

            match uri.take_str() {
                None => method!(req, {
                    Method::GET => get(req, id).await,
                    Method::PATCH => patch(req, id).await,
                }),
                Some("complete") => method!(req, {
                    Method::POST => complete(req, id).await,
                }),
                Some(_) => Err(StatusCodeError::not_found().into()),
            }
        }
    }
}

async fn get(req: Request, id: MatchId) -> Result {
    let m = req.state().playoffs().get_match(id).await?;

    Ok(Response::ok().json(&m))
}

async fn patch(mut req: Request, id: MatchId) -> Result {
    req.require_admin()?;

    let partial: PartialMatch = req.json().await?;

    let m = req.state().playoffs().update_match(id, &partial).await?;

    Ok(Response::ok().json(&m))
}

/// Declares the winner of the match without advancing it anywhere. Used for
/// the last match of a bracket.
async fn complete(mut req: Request, id: MatchId) -> Result {
    req.require_admin()?;

    let body: DeclareWinner = req.json().await?;

    let m = req.state().playoffs().complete_match(id, body.winner).await?;

    Ok(Response::ok().json(&m))
}
