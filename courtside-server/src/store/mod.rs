use courtside_api::auth::Role;
use courtside_api::id::{BracketId, MatchId, SeasonId, TeamId, UserId};
use courtside_api::playoffs::{Bracket, BracketKind, Match, PartialBracket, PartialMatch};
use courtside_api::seasons::Season;
use courtside_api::teams::Team;
use courtside_api::users::User;
use courtside_core::{Advancement, Slot};
use futures::TryStreamExt;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

use crate::Error;

macro_rules! get_one {
    ($query:expr) => {
        match $query {
            Ok(v) => v,
            Err(sqlx::Error::RowNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
    };
}

#[derive(Clone, Debug)]
pub struct Store {
    pub pool: MySqlPool,
    pub table_prefix: String,
}

impl Store {
    #[inline]
    pub fn seasons(&self) -> SeasonsClient<'_> {
        SeasonsClient { store: self }
    }

    #[inline]
    pub fn teams(&self) -> TeamsClient<'_> {
        TeamsClient { store: self }
    }

    #[inline]
    pub fn users(&self) -> UsersClient<'_> {
        UsersClient { store: self }
    }

    #[inline]
    pub fn brackets(&self) -> BracketsClient<'_> {
        BracketsClient { store: self }
    }

    #[inline]
    pub fn matches(&self, id: BracketId) -> MatchesClient<'_> {
        MatchesClient { store: self, id }
    }

    /// Creates all missing tables.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn create_tables(&self) -> Result<(), Error> {
        let tables = [
            format!(
                "CREATE TABLE IF NOT EXISTS {}seasons (\
                id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, \
                name TEXT NOT NULL, \
                year SMALLINT UNSIGNED NOT NULL, \
                is_active BOOLEAN NOT NULL DEFAULT FALSE)",
                self.table_prefix
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}teams (\
                id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, \
                season_id BIGINT UNSIGNED NOT NULL, \
                name TEXT NOT NULL)",
                self.table_prefix
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}users (\
                id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, \
                name TEXT NOT NULL, \
                password TEXT NOT NULL, \
                role TINYINT UNSIGNED NOT NULL)",
                self.table_prefix
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}playoff_brackets (\
                id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, \
                season_id BIGINT UNSIGNED NOT NULL, \
                name TEXT NOT NULL, \
                kind TINYINT UNSIGNED NOT NULL, \
                max_teams INT UNSIGNED NOT NULL, \
                current_round INT UNSIGNED NOT NULL, \
                is_active BOOLEAN NOT NULL DEFAULT FALSE, \
                is_completed BOOLEAN NOT NULL DEFAULT FALSE)",
                self.table_prefix
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}playoff_matches (\
                id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, \
                bracket_id BIGINT UNSIGNED NOT NULL, \
                game_id BIGINT UNSIGNED, \
                team1_id BIGINT UNSIGNED, \
                team2_id BIGINT UNSIGNED, \
                winner_id BIGINT UNSIGNED, \
                round_number INT UNSIGNED NOT NULL, \
                match_number INT UNSIGNED NOT NULL, \
                position_in_round INT UNSIGNED NOT NULL, \
                is_completed BOOLEAN NOT NULL DEFAULT FALSE, \
                notes TEXT)",
                self.table_prefix
            ),
        ];

        for table in tables {
            sqlx::query(&table).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// Returns the [`Match`] with the given `id` regardless of its bracket.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn get_match(&self, id: MatchId) -> Result<Option<Match>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT id, bracket_id, game_id, team1_id, team2_id, winner_id, round_number, \
                match_number, position_in_round, is_completed, notes \
                FROM {}playoff_matches WHERE id = ?",
                self.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.pool)
            .await
        );

        Ok(Some(match_from_row(&row)?))
    }

    /// Updates the notes and game linkage of the [`Match`] with the given
    /// `id` using the given [`PartialMatch`].
    pub async fn update_match(&self, id: MatchId, m: &PartialMatch) -> Result<(), Error> {
        if let Some(notes) = &m.notes {
            sqlx::query(&format!(
                "UPDATE {}playoff_matches SET notes = ? WHERE id = ?",
                self.table_prefix
            ))
            .bind(notes)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        }

        if let Some(game_id) = m.game_id {
            sqlx::query(&format!(
                "UPDATE {}playoff_matches SET game_id = ? WHERE id = ?",
                self.table_prefix
            ))
            .bind(game_id.0)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Marks the [`Match`] with the given `id` as completed with `winner`.
    pub async fn complete_match(&self, id: MatchId, winner: TeamId) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}playoff_matches SET winner_id = ?, is_completed = TRUE WHERE id = ?",
            self.table_prefix
        ))
        .bind(winner.0)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SeasonsClient<'a> {
    store: &'a Store,
}

impl<'a> SeasonsClient<'a> {
    /// Returns the [`Season`] with the given `id`, or `None` if no season
    /// with the given `id` exists.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn get(&self, id: SeasonId) -> Result<Option<Season>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT name, year, is_active FROM {}seasons WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.store.pool)
            .await
        );

        Ok(Some(Season {
            id,
            name: row.try_get("name")?,
            year: row.try_get("year")?,
            is_active: row.try_get("is_active")?,
        }))
    }
}

#[derive(Copy, Clone, Debug)]
pub struct TeamsClient<'a> {
    store: &'a Store,
}

impl<'a> TeamsClient<'a> {
    /// Returns the [`Team`] with the given `id`, or `None` if no team with
    /// the given `id` exists.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn get(&self, id: TeamId) -> Result<Option<Team>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT season_id, name FROM {}teams WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.store.pool)
            .await
        );

        Ok(Some(Team {
            id,
            season_id: SeasonId(row.try_get("season_id")?),
            name: row.try_get("name")?,
        }))
    }

    /// Returns all [`Team`]s with the given ids. Ids without a matching team
    /// are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn get_many(&self, ids: &[TeamId]) -> Result<Vec<Team>, Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, season_id, name FROM {}teams WHERE id IN ({})",
            self.store.table_prefix, placeholders
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.0);
        }

        let mut rows = query.fetch(&self.store.pool);

        let mut teams = Vec::new();
        while let Some(row) = rows.try_next().await? {
            teams.push(Team {
                id: TeamId(row.try_get("id")?),
                season_id: SeasonId(row.try_get("season_id")?),
                name: row.try_get("name")?,
            });
        }

        Ok(teams)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct UsersClient<'a> {
    store: &'a Store,
}

impl<'a> UsersClient<'a> {
    /// Returns the [`User`] with the given `username`, or `None` if no such
    /// user exists.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn get(&self, username: &str) -> Result<Option<User>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT id, password, role FROM {}users WHERE name = ?",
                self.store.table_prefix
            ))
            .bind(username)
            .fetch_one(&self.store.pool)
            .await
        );

        let role: u8 = row.try_get("role")?;

        Ok(Some(User {
            id: UserId(row.try_get("id")?),
            username: username.to_string(),
            password: row.try_get("password")?,
            role: Role::from_u8(role).unwrap_or_default(),
        }))
    }
}

#[derive(Copy, Clone, Debug)]
pub struct BracketsClient<'a> {
    store: &'a Store,
}

impl<'a> BracketsClient<'a> {
    /// Returns all [`Bracket`]s of the season with the given `id`.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn list(&self, season_id: SeasonId) -> Result<Vec<Bracket>, Error> {
        let sql = format!(
            "SELECT id, name, kind, max_teams, current_round, is_active, is_completed \
            FROM {}playoff_brackets WHERE season_id = ?",
            self.store.table_prefix
        );

        let mut rows = sqlx::query(&sql).bind(season_id.0).fetch(&self.store.pool);

        let mut brackets = Vec::new();
        while let Some(row) = rows.try_next().await? {
            brackets.push(bracket_from_row(&row, season_id)?);
        }

        Ok(brackets)
    }

    /// Returns the [`Bracket`] with the given `id`, or `None` if no bracket
    /// with the given `id` exists.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn get(&self, id: BracketId) -> Result<Option<Bracket>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT id, season_id, name, kind, max_teams, current_round, is_active, \
                is_completed FROM {}playoff_brackets WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.store.pool)
            .await
        );

        let season_id = SeasonId(row.try_get("season_id")?);

        Ok(Some(bracket_from_row(&row, season_id)?))
    }

    /// Inserts a new [`Bracket`] and returns the id of the newly created
    /// value.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn insert(&self, bracket: &Bracket) -> Result<BracketId, Error> {
        let res = sqlx::query(&format!(
            "INSERT INTO {}playoff_brackets \
            (season_id, name, kind, max_teams, current_round, is_active, is_completed) \
            VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.store.table_prefix
        ))
        .bind(bracket.season_id.0)
        .bind(&bracket.name)
        .bind(bracket.kind.to_u8())
        .bind(bracket.max_teams)
        .bind(bracket.current_round)
        .bind(bracket.is_active)
        .bind(bracket.is_completed)
        .execute(&self.store.pool)
        .await?;

        Ok(BracketId(res.last_insert_id()))
    }

    /// Updates the [`Bracket`] with the given `id` using the given
    /// [`PartialBracket`].
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn update(&self, id: BracketId, bracket: &PartialBracket) -> Result<(), Error> {
        if let Some(name) = &bracket.name {
            sqlx::query(&format!(
                "UPDATE {}playoff_brackets SET name = ? WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(name)
            .bind(id.0)
            .execute(&self.store.pool)
            .await?;
        }

        if let Some(kind) = bracket.kind {
            sqlx::query(&format!(
                "UPDATE {}playoff_brackets SET kind = ? WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(kind.to_u8())
            .bind(id.0)
            .execute(&self.store.pool)
            .await?;
        }

        if let Some(max_teams) = bracket.max_teams {
            sqlx::query(&format!(
                "UPDATE {}playoff_brackets SET max_teams = ? WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(max_teams)
            .bind(id.0)
            .execute(&self.store.pool)
            .await?;
        }

        Ok(())
    }

    /// Deletes the [`Bracket`] with the given `id` together with all of its
    /// matches, within a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured. On error no
    /// change is applied.
    pub async fn delete(&self, id: BracketId) -> Result<(), Error> {
        let mut tx = self.store.pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM {}playoff_matches WHERE bracket_id = ?",
            self.store.table_prefix
        ))
        .bind(id.0)
        .execute(&mut tx)
        .await?;

        sqlx::query(&format!(
            "DELETE FROM {}playoff_brackets WHERE id = ?",
            self.store.table_prefix
        ))
        .bind(id.0)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Returns `true` if the season with the given `id` has an active
    /// bracket.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn has_active(&self, season_id: SeasonId) -> Result<bool, Error> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS active FROM {}playoff_brackets \
            WHERE season_id = ? AND is_active = TRUE",
            self.store.table_prefix
        ))
        .bind(season_id.0)
        .fetch_one(&self.store.pool)
        .await?;

        let active: i64 = row.try_get("active")?;

        Ok(active > 0)
    }

    /// Deactivates every bracket of the season with the given `id`, then
    /// activates the bracket with the given `id`.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn activate(&self, id: BracketId, season_id: SeasonId) -> Result<(), Error> {
        let mut tx = self.store.pool.begin().await?;

        sqlx::query(&format!(
            "UPDATE {}playoff_brackets SET is_active = FALSE WHERE season_id = ?",
            self.store.table_prefix
        ))
        .bind(season_id.0)
        .execute(&mut tx)
        .await?;

        sqlx::query(&format!(
            "UPDATE {}playoff_brackets SET is_active = TRUE WHERE id = ?",
            self.store.table_prefix
        ))
        .bind(id.0)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Marks the [`Bracket`] with the given `id` as completed.
    pub async fn set_completed(&self, id: BracketId) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}playoff_brackets SET is_completed = TRUE WHERE id = ?",
            self.store.table_prefix
        ))
        .bind(id.0)
        .execute(&self.store.pool)
        .await?;

        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct MatchesClient<'a> {
    store: &'a Store,
    id: BracketId,
}

impl<'a> MatchesClient<'a> {
    /// Returns all [`Match`]es of the bracket ordered by round, then by
    /// position within the round.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn list(&self) -> Result<Vec<Match>, Error> {
        let sql = format!(
            "SELECT id, bracket_id, game_id, team1_id, team2_id, winner_id, round_number, \
            match_number, position_in_round, is_completed, notes \
            FROM {}playoff_matches WHERE bracket_id = ? \
            ORDER BY round_number ASC, position_in_round ASC",
            self.store.table_prefix
        );

        let mut rows = sqlx::query(&sql).bind(self.id.0).fetch(&self.store.pool);

        let mut matches = Vec::new();
        while let Some(row) = rows.try_next().await? {
            matches.push(match_from_row(&row)?);
        }

        Ok(matches)
    }

    /// Returns the occupied positions of the given `round`, in ascending
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn round_positions(&self, round: u32) -> Result<Vec<u32>, Error> {
        let sql = format!(
            "SELECT position_in_round FROM {}playoff_matches \
            WHERE bracket_id = ? AND round_number = ? ORDER BY position_in_round ASC",
            self.store.table_prefix
        );

        let mut rows = sqlx::query(&sql)
            .bind(self.id.0)
            .bind(round)
            .fetch(&self.store.pool);

        let mut positions = Vec::new();
        while let Some(row) = rows.try_next().await? {
            positions.push(row.try_get("position_in_round")?);
        }

        Ok(positions)
    }

    /// Replaces all [`Match`]es of the bracket with the given ones, within a
    /// single transaction.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured. On error no
    /// change is applied.
    pub async fn replace_all(&self, matches: &[Match]) -> Result<(), Error> {
        let mut tx = self.store.pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM {}playoff_matches WHERE bracket_id = ?",
            self.store.table_prefix
        ))
        .bind(self.id.0)
        .execute(&mut tx)
        .await?;

        for m in matches {
            sqlx::query(&format!(
                "INSERT INTO {}playoff_matches \
                (bracket_id, game_id, team1_id, team2_id, winner_id, round_number, \
                match_number, position_in_round, is_completed, notes) \
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                self.store.table_prefix
            ))
            .bind(self.id.0)
            .bind(m.game_id.map(|id| id.0))
            .bind(m.team1.map(|id| id.0))
            .bind(m.team2.map(|id| id.0))
            .bind(m.winner.map(|id| id.0))
            .bind(m.round_number)
            .bind(m.match_number)
            .bind(m.position_in_round)
            .bind(m.is_completed)
            .bind(&m.notes)
            .execute(&mut tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Returns the total and completed match counts of the bracket.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured.
    pub async fn counts(&self) -> Result<(u64, u64), Error> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total, \
            COUNT(CASE WHEN is_completed THEN 1 END) AS completed \
            FROM {}playoff_matches WHERE bracket_id = ?",
            self.store.table_prefix
        ))
        .bind(self.id.0)
        .fetch_one(&self.store.pool)
        .await?;

        let total: i64 = row.try_get("total")?;
        let completed: i64 = row.try_get("completed")?;

        Ok((total as u64, completed as u64))
    }

    /// Marks the match with the given `id` as completed with `winner` and
    /// applies the [`Advancement`] to the next round, both within a single
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] if a database error occured. On error no
    /// change is applied.
    pub async fn advance(
        &self,
        id: MatchId,
        winner: TeamId,
        advancement: &Advancement,
    ) -> Result<(), Error> {
        let target = advancement.target();

        let slot_column = match target.slot {
            Slot::Team1 => "team1_id",
            Slot::Team2 => "team2_id",
        };

        let mut tx = self.store.pool.begin().await?;

        sqlx::query(&format!(
            "UPDATE {}playoff_matches SET winner_id = ?, is_completed = TRUE WHERE id = ?",
            self.store.table_prefix
        ))
        .bind(winner.0)
        .bind(id.0)
        .execute(&mut tx)
        .await?;

        match *advancement {
            Advancement::Create { match_number, .. } => {
                sqlx::query(&format!(
                    "INSERT INTO {}playoff_matches \
                    (bracket_id, {}, round_number, match_number, position_in_round, \
                    is_completed) VALUES (?, ?, ?, ?, ?, FALSE)",
                    self.store.table_prefix, slot_column
                ))
                .bind(self.id.0)
                .bind(winner.0)
                .bind(target.round)
                .bind(match_number)
                .bind(target.position)
                .execute(&mut tx)
                .await?;
            }
            Advancement::Update { .. } => {
                sqlx::query(&format!(
                    "UPDATE {}playoff_matches SET {} = ? \
                    WHERE bracket_id = ? AND round_number = ? AND position_in_round = ?",
                    self.store.table_prefix, slot_column
                ))
                .bind(winner.0)
                .bind(self.id.0)
                .bind(target.round)
                .bind(target.position)
                .execute(&mut tx)
                .await?;
            }
        }

        tx.commit().await?;

        Ok(())
    }
}

fn bracket_from_row(row: &MySqlRow, season_id: SeasonId) -> Result<Bracket, Error> {
    let kind: u8 = row.try_get("kind")?;

    Ok(Bracket {
        id: BracketId(row.try_get("id")?),
        season_id,
        name: row.try_get("name")?,
        kind: BracketKind::from_u8(kind).unwrap_or_default(),
        max_teams: row.try_get("max_teams")?,
        current_round: row.try_get("current_round")?,
        is_active: row.try_get("is_active")?,
        is_completed: row.try_get("is_completed")?,
    })
}

fn match_from_row(row: &MySqlRow) -> Result<Match, Error> {
    Ok(Match {
        id: MatchId(row.try_get("id")?),
        bracket_id: BracketId(row.try_get("bracket_id")?),
        game_id: row.try_get::<Option<u64>, _>("game_id")?.map(Into::into),
        team1: row.try_get::<Option<u64>, _>("team1_id")?.map(Into::into),
        team2: row.try_get::<Option<u64>, _>("team2_id")?.map(Into::into),
        winner: row.try_get::<Option<u64>, _>("winner_id")?.map(Into::into),
        round_number: row.try_get("round_number")?,
        match_number: row.try_get("match_number")?,
        position_in_round: row.try_get("position_in_round")?,
        is_completed: row.try_get("is_completed")?,
        notes: row.try_get("notes")?,
    })
}
