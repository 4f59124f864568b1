//! Data access layer

pub mod user_repo;

pub use user_repo::{PgUserStore, TokenMutation, UserStore};
