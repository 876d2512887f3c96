mod handler;
pub mod model;

pub use handler::{assign_roles, get_one, list, remove, update};
