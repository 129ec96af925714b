use serde::{Deserialize, Serialize};

use crate::id::{BracketId, GameId, MatchId, SeasonId, TeamId};

/// The elimination system a bracket runs under.
///
/// Only single elimination is implemented. Double elimination is declared for
/// forward compatibility and is rejected with a fail-fast error wherever a
/// bracket would be created or updated with it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketKind {
    #[default]
    SingleElimination,
    DoubleElimination,
}

impl BracketKind {
    pub fn from_u8(kind: u8) -> Option<Self> {
        match kind {
            1 => Some(Self::SingleElimination),
            2 => Some(Self::DoubleElimination),
            _ => None,
        }
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::SingleElimination => 1,
            Self::DoubleElimination => 2,
        }
    }
}

/// A playoff bracket of a single season.
///
/// At most one bracket of a season is active at any time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    #[serde(default)]
    pub id: BracketId,
    pub season_id: SeasonId,
    pub name: String,
    #[serde(default)]
    pub kind: BracketKind,
    pub max_teams: u32,
    #[serde(default = "default_round")]
    pub current_round: u32,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_completed: bool,
}

fn default_round() -> u32 {
    1
}

/// A partial bracket used for updates. Fields that are `None` are left
/// untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PartialBracket {
    pub name: Option<String>,
    pub kind: Option<BracketKind>,
    pub max_teams: Option<u32>,
}

/// A single playoff pairing at a round and position within its bracket.
///
/// `team1`/`team2` stay empty ("TBD") until a feeder match in the previous
/// round resolves into the slot. A completed match always carries a winner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    #[serde(default)]
    pub id: MatchId,
    pub bracket_id: BracketId,
    pub game_id: Option<GameId>,
    pub team1: Option<TeamId>,
    pub team2: Option<TeamId>,
    pub winner: Option<TeamId>,
    pub round_number: u32,
    pub match_number: u32,
    pub position_in_round: u32,
    #[serde(default)]
    pub is_completed: bool,
    pub notes: Option<String>,
}

impl Match {
    /// Returns `true` if `team` plays in this match.
    pub fn has_team(&self, team: TeamId) -> bool {
        self.team1 == Some(team) || self.team2 == Some(team)
    }
}

/// A partial match used for updates to notes and the linked game record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PartialMatch {
    pub notes: Option<String>,
    pub game_id: Option<GameId>,
}

/// Request body for seeding a bracket.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedBracket {
    pub teams: Vec<TeamId>,
}

/// Request body for advancing or completing a match.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct DeclareWinner {
    pub winner: TeamId,
}

#[cfg(test)]
mod tests {
    use super::{Bracket, BracketKind};
    use crate::id::{BracketId, SeasonId, TeamId};

    #[test]
    fn test_bracket_kind_u8() {
        for kind in [BracketKind::SingleElimination, BracketKind::DoubleElimination] {
            assert_eq!(BracketKind::from_u8(kind.to_u8()), Some(kind));
        }

        assert_eq!(BracketKind::from_u8(0), None);
        assert_eq!(BracketKind::from_u8(3), None);
    }

    #[test]
    fn test_bracket_deserialize_defaults() {
        // A creation payload only carries season, name and capacity.
        let bracket: Bracket = serde_json::from_str(
            r#"{"season_id": 1, "name": "Summer Finals", "max_teams": 8}"#,
        )
        .unwrap();

        assert_eq!(bracket.id, BracketId(0));
        assert_eq!(bracket.season_id, SeasonId(1));
        assert_eq!(bracket.kind, BracketKind::SingleElimination);
        assert_eq!(bracket.current_round, 1);
        assert!(!bracket.is_active);
        assert!(!bracket.is_completed);
    }

    #[test]
    fn test_match_has_team() {
        let m = super::Match {
            id: Default::default(),
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
        };

        assert!(m.has_team(TeamId(3)));
        assert!(m.has_team(TeamId(4)));
        assert!(!m.has_team(TeamId(5)));
    }
}
