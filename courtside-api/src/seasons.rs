use serde::{Deserialize, Serialize};

use crate::id::SeasonId;

/// A league season. The playoff engine only reads seasons, it never creates
/// or mutates them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub id: SeasonId,
    pub name: String,
    pub year: u16,
    pub is_active: bool,
}
