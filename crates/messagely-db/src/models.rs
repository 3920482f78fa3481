//! Database row types: these map directly to SQLite rows.
//! Distinct from messagely-types API models to keep the DB layer independent.

pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: &'a str,
}

pub struct UserRow {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub join_at: String,
    pub last_login_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummaryRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: String,
    pub from_username: String,
    pub to_username: String,
    pub body: String,
    pub sent_at: String,
    pub read_at: Option<String>,
}

/// A message row joined with one or both participants' profiles.
#[derive(Debug)]
pub struct MessageDetailRow {
    pub id: String,
    pub body: String,
    pub sent_at: String,
    pub read_at: Option<String>,
    pub from_user: UserSummaryRow,
    pub to_user: UserSummaryRow,
}

/// A message row joined with the profile of the other participant.
#[derive(Debug)]
pub struct ThreadRow {
    pub id: String,
    pub body: String,
    pub sent_at: String,
    pub read_at: Option<String>,
    pub counterpart: UserSummaryRow,
}
