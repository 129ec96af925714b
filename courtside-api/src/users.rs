use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::id::UserId;

/// A login account. `password` holds the hex encoded SHA-256 digest of the
/// password, never the plain text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password: String,
    pub role: Role,
}
