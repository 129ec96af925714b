use serde::{Deserialize, Serialize};

use crate::id::{SeasonId, TeamId};

/// A team registered for a season.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub season_id: SeasonId,
    pub name: String,
}
