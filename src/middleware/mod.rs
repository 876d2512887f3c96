mod auth;
mod error_handler;
mod guard;
mod rate_limit;
mod request_id;

pub use auth::auth_middleware;
pub use error_handler::unify_errors;
pub use guard::{ADMIN, ADMIN_ROLES, RequiredPermissions, RequiredRoles, SUPER_ADMIN, roles_guard};
pub use rate_limit::{RateLimiter, rate_limit};
pub use request_id::request_id;
