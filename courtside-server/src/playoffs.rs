use std::collections::HashMap;
use std::sync::Arc;

use courtside_api::id::{BracketId, MatchId, SeasonId, TeamId};
use courtside_api::playoffs::{Bracket, BracketKind, Match, PartialBracket, PartialMatch};
use courtside_core::single_elimination;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::thread_rng;
use tokio::sync::Mutex as AsyncMutex;

use crate::state::State;
use crate::{Error, StatusCodeError};

/// A registry of per-bracket locks.
///
/// Seeding and advancement read bracket state before writing it back. Holding
/// the bracket lock across that window keeps concurrent writers from
/// interleaving on the same bracket. Different brackets never contend.
#[derive(Debug, Default)]
pub struct BracketLocks {
    locks: Mutex<HashMap<BracketId, Arc<AsyncMutex<()>>>>,
}

impl BracketLocks {
    /// Returns the lock of the bracket with the given `id`, creating it if
    /// necessary.
    pub fn get(&self, id: BracketId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(id).or_default().clone()
    }

    /// Removes the lock of the bracket with the given `id`. Called when the
    /// bracket is deleted.
    pub fn remove(&self, id: BracketId) {
        let mut locks = self.locks.lock();
        locks.remove(&id);
    }
}

/// The playoff service. All bracket and match operations go through here;
/// the http layer only translates requests into calls on this type.
#[derive(Copy, Clone, Debug)]
pub struct Playoffs<'a> {
    state: &'a State,
}

impl<'a> Playoffs<'a> {
    pub(crate) fn new(state: &'a State) -> Self {
        Self { state }
    }

    /// Returns all brackets of the season with the given `id`.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if the season does not exist or a database
    /// error occured.
    pub async fn list_brackets(&self, season_id: SeasonId) -> Result<Vec<Bracket>, Error> {
        if self.state.store.seasons().get(season_id).await?.is_none() {
            return Err(StatusCodeError::not_found()
                .message("season not found")
                .into());
        }

        self.state.store.brackets().list(season_id).await
    }

    /// Returns the bracket with the given `id`.
    pub async fn get_bracket(&self, id: BracketId) -> Result<Bracket, Error> {
        match self.state.store.brackets().get(id).await? {
            Some(bracket) => Ok(bracket),
            None => Err(StatusCodeError::not_found()
                .message("bracket not found")
                .into()),
        }
    }

    /// Creates a new bracket and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if the season does not exist, the bracket
    /// requests an unsupported elimination system, the season already has an
    /// active bracket, or a database error occured.
    pub async fn create_bracket(&self, mut bracket: Bracket) -> Result<Bracket, Error> {
        if self.state.store.seasons().get(bracket.season_id).await?.is_none() {
            return Err(StatusCodeError::not_found()
                .message("season not found")
                .into());
        }

        reject_unsupported(bracket.kind)?;

        if self.state.store.brackets().has_active(bracket.season_id).await? {
            return Err(StatusCodeError::conflict()
                .message("the season already has an active bracket")
                .into());
        }

        // Brackets are born inactive and incomplete; activation is explicit.
        bracket.current_round = 1;
        bracket.is_active = false;
        bracket.is_completed = false;

        let id = self.state.store.brackets().insert(&bracket).await?;
        bracket.id = id;

        log::info!(
            "Created bracket {} ({:?}) in season {}",
            bracket.id,
            bracket.name,
            bracket.season_id
        );

        Ok(bracket)
    }

    /// Updates the bracket with the given `id`.
    pub async fn update_bracket(
        &self,
        id: BracketId,
        bracket: &PartialBracket,
    ) -> Result<(), Error> {
        // Confirm existence before writing.
        self.get_bracket(id).await?;

        if let Some(kind) = bracket.kind {
            reject_unsupported(kind)?;
        }

        self.state.store.brackets().update(id, bracket).await
    }

    /// Deletes the bracket with the given `id` together with all of its
    /// matches.
    pub async fn delete_bracket(&self, id: BracketId) -> Result<(), Error> {
        let bracket = self.get_bracket(id).await?;

        let lock = self.state.bracket_locks.get(id);
        let _guard = lock.lock().await;

        self.state.store.brackets().delete(id).await?;
        self.state.bracket_locks.remove(id);

        log::info!("Deleted bracket {} ({:?})", id, bracket.name);

        Ok(())
    }

    /// Activates the bracket with the given `id`, deactivating every other
    /// bracket of the same season.
    pub async fn activate_bracket(&self, id: BracketId) -> Result<Bracket, Error> {
        let bracket = self.get_bracket(id).await?;

        self.state
            .store
            .brackets()
            .activate(id, bracket.season_id)
            .await?;

        self.get_bracket(id).await
    }

    /// Seeds the bracket with the given teams, replacing any existing
    /// matches.
    ///
    /// Teams are shuffled and paired into round-1 matches two at a time. An
    /// odd trailing team has no opponent and is left out of the bracket.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if the bracket does not exist, a team does
    /// not exist, the team list exceeds the bracket capacity or a database
    /// error occured.
    pub async fn seed_bracket(
        &self,
        id: BracketId,
        mut teams: Vec<TeamId>,
    ) -> Result<Vec<Match>, Error> {
        let bracket = self.get_bracket(id).await?;

        reject_unsupported(bracket.kind)?;

        if teams.len() as u64 > bracket.max_teams as u64 {
            return Err(StatusCodeError::conflict()
                .message(format!(
                    "bracket holds at most {} teams, got {}",
                    bracket.max_teams,
                    teams.len()
                ))
                .into());
        }

        let known = self.state.store.teams().get_many(&teams).await?;
        for team in &teams {
            if !known.iter().any(|t| t.id == *team) {
                return Err(StatusCodeError::not_found()
                    .message(format!("team {} not found", team))
                    .into());
            }
        }

        let lock = self.state.bracket_locks.get(id);
        let _guard = lock.lock().await;

        teams.shuffle(&mut thread_rng());

        let round_one = round_one_matches(id, &teams);

        // The old matches and the new round 1 swap in one transaction, so a
        // failed re-seed never leaves a truncated bracket behind.
        self.state.store.matches(id).replace_all(&round_one).await?;

        log::info!(
            "Seeded bracket {} with {} round-1 matches from {} teams",
            id,
            round_one.len(),
            teams.len()
        );

        self.state.store.matches(id).list().await
    }

    /// Returns all matches of the bracket with the given `id`, ordered by
    /// round and position.
    pub async fn bracket_matches(&self, id: BracketId) -> Result<Vec<Match>, Error> {
        self.get_bracket(id).await?;
        self.state.store.matches(id).list().await
    }

    /// Returns the match with the given `id`.
    pub async fn get_match(&self, id: MatchId) -> Result<Match, Error> {
        match self.state.store.get_match(id).await? {
            Some(m) => Ok(m),
            None => Err(StatusCodeError::not_found()
                .message("match not found")
                .into()),
        }
    }

    /// Updates the notes and game linkage of the match with the given `id`.
    pub async fn update_match(&self, id: MatchId, m: &PartialMatch) -> Result<Match, Error> {
        self.get_match(id).await?;
        self.state.store.update_match(id, m).await?;
        self.get_match(id).await
    }

    /// Declares `winner` the winner of the match with the given `id` and
    /// moves it into the next round.
    ///
    /// If the target match in the next round already exists the winner fills
    /// its open slot, otherwise a new match is created with the winner in the
    /// slot its feeder position dictates. Marking the match completed and
    /// propagating the winner happen in one transaction.
    ///
    /// Returns all matches of the bracket after the advancement.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if the match does not exist, is already
    /// completed, the winner does not play in it or a database error occured.
    pub async fn advance_winner(
        &self,
        bracket_id: BracketId,
        id: MatchId,
        winner: TeamId,
    ) -> Result<Vec<Match>, Error> {
        let lock = self.state.bracket_locks.get(bracket_id);
        let _guard = lock.lock().await;

        let m = self.get_match(id).await?;

        if m.bracket_id != bracket_id {
            return Err(StatusCodeError::not_found()
                .message("match not found")
                .into());
        }

        self.require_team(winner).await?;
        validate_winner(&m, winner)?;

        let matches = self.state.store.matches(m.bracket_id);

        let next_round_positions = matches.round_positions(m.round_number + 1).await?;
        let advancement = single_elimination::advancement(
            m.round_number,
            m.position_in_round,
            &next_round_positions,
        );

        matches.advance(id, winner, &advancement).await?;

        log::info!(
            "Team {} won match {} of bracket {}, advancing to round {}",
            winner,
            id,
            m.bracket_id,
            advancement.target().round
        );

        matches.list().await
    }

    /// Marks the match with the given `id` as completed with `winner`,
    /// without moving the winner anywhere.
    ///
    /// When the last open match of a bracket completes, the bracket is marked
    /// completed as well.
    ///
    /// Returns the updated match.
    pub async fn complete_match(&self, id: MatchId, winner: TeamId) -> Result<Match, Error> {
        let m = self.get_match(id).await?;

        let lock = self.state.bracket_locks.get(m.bracket_id);
        let _guard = lock.lock().await;

        // Reload under the lock so the completed check is not stale.
        let m = self.get_match(id).await?;

        self.require_team(winner).await?;
        validate_winner(&m, winner)?;

        self.state.store.complete_match(id, winner).await?;

        let (total, completed) = self.state.store.matches(m.bracket_id).counts().await?;
        if single_elimination::is_complete(total, completed) {
            self.state.store.brackets().set_completed(m.bracket_id).await?;

            log::info!("Bracket {} is complete", m.bracket_id);
        }

        self.get_match(id).await
    }

    async fn require_team(&self, id: TeamId) -> Result<(), Error> {
        if self.state.store.teams().get(id).await?.is_none() {
            return Err(StatusCodeError::not_found()
                .message("team not found")
                .into());
        }

        Ok(())
    }
}

/// Builds the round-1 matches for an already-shuffled team order. Match `k`
/// pairs teams `2k - 1` and `2k`; an odd trailing team is excluded.
fn round_one_matches(bracket_id: BracketId, teams: &[TeamId]) -> Vec<Match> {
    single_elimination::pair(teams)
        .into_iter()
        .enumerate()
        .map(|(index, (team1, team2))| {
            let number = index as u32 + 1;

            Match {
                id: MatchId(0),
                bracket_id,
                game_id: None,
                team1: Some(team1),
                team2: Some(team2),
                winner: None,
                round_number: 1,
                match_number: number,
                position_in_round: number,
                is_completed: false,
                notes: None,
            }
        })
        .collect()
}

/// Rejects winners that are not part of the match, and matches that already
/// have a winner.
fn validate_winner(m: &Match, winner: TeamId) -> Result<(), StatusCodeError> {
    if m.is_completed {
        return Err(StatusCodeError::conflict().message("match is already completed"));
    }

    if !m.has_team(winner) {
        return Err(StatusCodeError::bad_request()
            .message("winner must be one of the teams in this match"));
    }

    Ok(())
}

fn reject_unsupported(kind: BracketKind) -> Result<(), StatusCodeError> {
    match kind {
        BracketKind::SingleElimination => Ok(()),
        BracketKind::DoubleElimination => Err(StatusCodeError::not_implemented()
            .message("double elimination brackets are not supported")),
    }
}

#[cfg(test)]
mod tests {
    use super::{round_one_matches, validate_winner, BracketLocks};

    use courtside_api::id::{BracketId, MatchId, TeamId};
    use courtside_api::playoffs::Match;
    use hyper::StatusCode;

    fn testing_match() -> Match {
        Match {
            id: MatchId(1),
            bracket_id: BracketId(1),
            game_id: None,
            team1: Some(TeamId(3)),
            team2: Some(TeamId(4)),
            winner: None,
            round_number: 1,
            match_number: 1,
            position_in_round: 1,
            is_completed: false,
            notes: None,
        }
    }

    #[test]
    fn test_bracket_locks() {
        let locks = BracketLocks::default();

        let first = locks.get(BracketId(1));
        let again = locks.get(BracketId(1));
        assert!(std::sync::Arc::ptr_eq(&first, &again));

        let other = locks.get(BracketId(2));
        assert!(!std::sync::Arc::ptr_eq(&first, &other));

        locks.remove(BracketId(1));
        let fresh = locks.get(BracketId(1));
        assert!(!std::sync::Arc::ptr_eq(&first, &fresh));
    }

    #[test]
    fn test_round_one_matches() {
        let teams: Vec<TeamId> = (1..=5).map(TeamId).collect();

        // The whole round is built up front and written in one go; the odd
        // trailing team is excluded.
        let matches = round_one_matches(BracketId(7), &teams);
        assert_eq!(matches.len(), 2);

        for (index, m) in matches.iter().enumerate() {
            let number = index as u32 + 1;

            assert_eq!(m.bracket_id, BracketId(7));
            assert_eq!(m.round_number, 1);
            assert_eq!(m.match_number, number);
            assert_eq!(m.position_in_round, number);
            assert_eq!(m.team1, Some(TeamId(number as u64 * 2 - 1)));
            assert_eq!(m.team2, Some(TeamId(number as u64 * 2)));
            assert_eq!(m.winner, None);
            assert!(!m.is_completed);
        }

        assert!(round_one_matches(BracketId(7), &[TeamId(1)]).is_empty());
    }

    #[test]
    fn test_validate_winner() {
        let m = testing_match();
        validate_winner(&m, TeamId(3)).unwrap();
        validate_winner(&m, TeamId(4)).unwrap();

        let err = validate_winner(&m, TeamId(5)).unwrap_err();
        assert_eq!(err.code, StatusCode::BAD_REQUEST);

        let mut m = testing_match();
        m.is_completed = true;
        let err = validate_winner(&m, TeamId(3)).unwrap_err();
        assert_eq!(err.code, StatusCode::CONFLICT);
    }
}
