mod handler;
pub mod model;

pub use handler::{create, get_by_code, get_one, list, remove, tree, update};
