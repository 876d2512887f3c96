use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{AppState, cache::token::TokenStore, error::AppError, utils::verify_access_token};

/// 认证中间件：校验访问令牌签名，并以 Redis 中的记录为准判断是否已撤销
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer
        .as_ref()
        .map(|header| header.token())
        .ok_or_else(|| AppError::Unauthorized("缺少访问令牌".into()))?;

    let claims = verify_access_token(token, &state.config)
        .map_err(|_| AppError::Unauthorized("访问令牌无效或已过期".into()))?;

    // 登出或过期后键即不存在，令牌签名再合法也一律拒绝
    match TokenStore::get_access_token(&state.redis, claims.sub).await? {
        Some(stored) if stored == token => {}
        _ => return Err(AppError::Unauthorized("访问令牌已失效".into())),
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
