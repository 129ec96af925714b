use courtside_api::id::{BracketId, MatchId, SeasonId};
use courtside_api::playoffs::{Bracket, DeclareWinner, PartialBracket, SeedBracket};
use hyper::Method;

use crate::http::{Request, RequestUri, Response, Result};
use crate::{method, StatusCodeError};

pub async fn route(req: Request, mut uri: RequestUri<'_>) -> Result {
    match uri.take() {
        None => method!(req, {
            Method::GET => list(req).await,
            Method::POST => create(req).await,
        }),
        Some(part) => {
            let id = part.parse()?;

            match uri.take_str() {
                None => method!(req, {
                    Method::GET => get(req, id).await,
                    Method::PATCH => patch(req, id).await,
                    Method::DELETE => delete(req, id).await,
                }),
                Some("activate") => method!(req, {
                    Method::POST => activate(req, id).await,
                }),
                Some("seed") => method!(req, {
                    Method::POST => seed(req, id).await,
                }),
                Some("matches") => match uri.take() {
                    None => method!(req, {
                        Method::GET => matches(req, id).await,
                    }),
                    Some(part) => {
                        let match_id = part.parse()?;

                        match uri.take_str() {
                            Some("advance") => method!(req, {
                                Method::POST => advance(req, id, match_id).await,
                            }),
                            _ => Err(StatusCodeError::not_found().into()),
                        }
                    }
                },
                Some(_) => Err(StatusCodeError::not_found().into()),
            }
        }
    }
}

/// Extracts the `season` query parameter.
fn season_query(req: &Request) -> std::result::Result<SeasonId, crate::Error> {
    let query = req.uri().query().unwrap_or("");

    for pair in query.split('&') {
        if let Some(("season", value)) = pair.split_once('=') {
            return match value.parse() {
                Ok(id) => Ok(id),
                Err(_) => Err(StatusCodeError::bad_request()
                    .message("invalid season id")
                    .into()),
            };
        }
    }

    Err(StatusCodeError::bad_request()
        .message("missing season query parameter")
        .into())
}

async fn list(req: Request) -> Result {
    let season_id = season_query(&req)?;

    let brackets = req.state().playoffs().list_brackets(season_id).await?;

    Ok(Response::ok().json(&brackets))
}

async fn get(req: Request, id: BracketId) -> Result {
    let bracket = req.state().playoffs().get_bracket(id).await?;

    Ok(Response::ok().json(&bracket))
}

async fn create(mut req: Request) -> Result {
    req.require_admin()?;

    let bracket: Bracket = req.json().await?;

    let bracket = req.state().playoffs().create_bracket(bracket).await?;

    Ok(Response::created().json(&bracket))
}

async fn patch(mut req: Request, id: BracketId) -> Result {
    req.require_admin()?;

    let partial: PartialBracket = req.json().await?;

    req.state().playoffs().update_bracket(id, &partial).await?;

    let bracket = req.state().playoffs().get_bracket(id).await?;

    Ok(Response::ok().json(&bracket))
}

async fn delete(req: Request, id: BracketId) -> Result {
    req.require_admin()?;

    req.state().playoffs().delete_bracket(id).await?;

    Ok(Response::no_content())
}

async fn activate(req: Request, id: BracketId) -> Result {
    req.require_admin()?;

    let bracket = req.state().playoffs().activate_bracket(id).await?;

    Ok(Response::ok().json(&bracket))
}

async fn seed(mut req: Request, id: BracketId) -> Result {
    req.require_admin()?;

    let body: SeedBracket = req.json().await?;

    let matches = req.state().playoffs().seed_bracket(id, body.teams).await?;

    Ok(Response::created().json(&matches))
}

async fn matches(req: Request, id: BracketId) -> Result {
    let matches = req.state().playoffs().bracket_matches(id).await?;

    Ok(Response::ok().json(&matches))
}

/// Declares the winner of the match and moves it into the next round.
/// Responds with the full match list of the bracket after the advancement.
async fn advance(mut req: Request, id: BracketId, match_id: MatchId) -> Result {
    req.require_admin()?;

    let body: DeclareWinner = req.json().await?;

    let matches = req
        .state()
        .playoffs()
        .advance_winner(id, match_id, body.winner)
        .await?;

    Ok(Response::ok().json(&matches))
}
