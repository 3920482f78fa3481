pub mod auth;
pub mod convert;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod router;
pub mod state;
pub mod users;
