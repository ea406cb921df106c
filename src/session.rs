//! Keys stored in the tower-sessions cookie session.

pub const USER_ID: &str = "user_id";
