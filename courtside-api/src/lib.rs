//! Wire types for the courtside playoff API.
//!
//! Everything here serializes with serde and is shared between the server and
//! its clients. The crate carries no behavior beyond parsing and validation.

pub mod auth;
pub mod id;
pub mod playoffs;
pub mod seasons;
pub mod teams;
pub mod users;
