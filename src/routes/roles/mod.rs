mod handler;
pub mod model;

pub use handler::{assign_permissions, create, get_by_code, get_one, list, remove, update};
