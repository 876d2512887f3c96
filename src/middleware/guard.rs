use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    error::AppError,
    routes::{permissions::model::Permission, roles::model::Role},
    utils::Claims,
};

pub const SUPER_ADMIN: &str = "super_admin";
pub const ADMIN: &str = "admin";

/// 管理接口默认要求的角色集合
pub const ADMIN_ROLES: &[&str] = &[SUPER_ADMIN, ADMIN];

/// 路由声明的必需角色代码，命中任意一个即放行
#[derive(Debug, Clone, Copy)]
pub struct RequiredRoles(pub &'static [&'static str]);

/// 路由声明的必需权限代码，与 [`RequiredRoles`] 之间是“或”的关系
#[derive(Debug, Clone, Copy)]
pub struct RequiredPermissions(pub &'static [&'static str]);

/// 授权中间件：将调用者的角色展开为权限全集后与路由声明求交
pub async fn roles_guard(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("缺少访问令牌".into()))?;

    let required_roles = req.extensions().get::<RequiredRoles>().copied();
    let required_permissions = req.extensions().get::<RequiredPermissions>().copied();

    // 未声明任何要求的路由，认证通过即可访问
    if required_roles.is_none() && required_permissions.is_none() {
        return Ok(next.run(req).await);
    }

    if let Some(RequiredRoles(required)) = required_roles {
        let role_codes = Role::codes_for_user(&state.pool, claims.sub).await?;
        if intersects(required, &role_codes) {
            return Ok(next.run(req).await);
        }
    }

    if let Some(RequiredPermissions(required)) = required_permissions {
        let permission_codes = Permission::codes_for_user(&state.pool, claims.sub).await?;
        if intersects(required, &permission_codes) {
            return Ok(next.run(req).await);
        }
    }

    Err(AppError::Forbidden("权限不足".into()))
}

fn intersects(required: &[&str], owned: &[String]) -> bool {
    required.iter().any(|r| owned.iter().any(|o| o == r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_is_or_semantics() {
        let owned = vec!["user".to_string(), "admin".to_string()];
        assert!(intersects(&["super_admin", "admin"], &owned));
        assert!(!intersects(&["super_admin"], &owned));
        assert!(!intersects(&[], &owned));
        assert!(!intersects(&["admin"], &[]));
    }
}
