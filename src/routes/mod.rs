pub mod auth;
pub mod common;
pub mod permissions;
pub mod roles;
pub mod users;
