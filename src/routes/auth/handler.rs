use axum::{
    Json,
    extract::{Extension, State},
};

use crate::{
    AppState,
    cache::token::TokenStore,
    error::AppError,
    routes::common::{ApiResponse, message_to_api_response, success_to_api_response},
    routes::users::model::User,
    utils::{
        Claims, generate_access_token, generate_refresh_token, hash_password, verify_password,
        verify_refresh_token,
    },
};

use super::model::{
    LoginRequest, LoginResponse, LoginUser, RefreshTokenRequest, RefreshTokenResponse,
    RegisterRequest,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(mut req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    req.normalize();
    req.validate()?;

    // 冲突检查全部通过后才做哈希
    if User::user_name_exists(&state.pool, &req.user_name).await? {
        return Err(AppError::Conflict("用户名已存在".into()));
    }
    if let Some(email) = &req.email {
        if User::email_exists(&state.pool, email, None).await? {
            return Err(AppError::Conflict("邮箱已存在".into()));
        }
    }
    if let Some(phone) = &req.phone {
        if User::phone_exists(&state.pool, phone, None).await? {
            return Err(AppError::Conflict("手机号已存在".into()));
        }
    }

    let password_hash = hash_password(&req.password, state.config.bcrypt_cost)
        .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))?;

    let user = User::create(
        &state.pool,
        &req.user_name,
        req.nick_name.as_deref(),
        &password_hash,
        req.email.as_deref(),
        req.phone.as_deref(),
    )
    .await?;

    Ok(success_to_api_response(user))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    if req.user_name.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("用户名和密码不能为空".into()));
    }

    // 用户不存在与密码错误对外呈现同一条消息
    let user = User::find_by_user_name(&state.pool, &req.user_name)
        .await?
        .ok_or_else(|| AppError::Unauthorized("用户名或密码错误".into()))?;

    if !user.is_active {
        return Err(AppError::Forbidden("账号已被禁用".into()));
    }

    if !verify_password(&req.password, &user.password).unwrap_or(false) {
        return Err(AppError::Unauthorized("用户名或密码错误".into()));
    }

    let access_token =
        generate_access_token(user.id, &user.user_name, user.email.as_deref(), &state.config)
            .map_err(|e| AppError::Internal(format!("failed to sign access token: {}", e)))?;
    let refresh_token =
        generate_refresh_token(user.id, &user.user_name, user.email.as_deref(), &state.config)
            .map_err(|e| AppError::Internal(format!("failed to sign refresh token: {}", e)))?;

    // 两类令牌分别落入缓存，过期时间与各自有效期一致
    TokenStore::store_access_token(
        &state.redis,
        user.id,
        &access_token,
        state.config.access_token_expiration_secs,
    )
    .await?;
    TokenStore::store_refresh_token(
        &state.redis,
        user.id,
        &refresh_token,
        state.config.refresh_token_expiration_secs,
    )
    .await?;

    Ok(success_to_api_response(LoginResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".into(),
        expires_in: state.config.access_token_expiration_secs,
        user: LoginUser {
            id: user.id,
            user_name: user.user_name,
            nick_name: user.nick_name,
            email: user.email,
            phone: user.phone,
        },
    }))
}

#[axum::debug_handler]
pub async fn logout(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    // 幂等删除，键不存在也视为登出成功
    TokenStore::remove_tokens(&state.redis, claims.sub).await?;

    Ok(message_to_api_response("登出成功"))
}

#[axum::debug_handler]
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<ApiResponse<RefreshTokenResponse>>, AppError> {
    // 签名、过期、撤销统一收敛为同一条错误，不向外区分
    let claims = verify_refresh_token(&req.refresh_token, &state.config)
        .map_err(|_| AppError::Unauthorized("刷新令牌无效".into()))?;

    match TokenStore::get_refresh_token(&state.redis, claims.sub).await? {
        Some(stored) if stored == req.refresh_token => {}
        _ => return Err(AppError::Unauthorized("刷新令牌无效".into())),
    }

    // 只换发访问令牌，刷新令牌不轮换
    let access_token = generate_access_token(
        claims.sub,
        &claims.user_name,
        claims.email.as_deref(),
        &state.config,
    )
    .map_err(|e| AppError::Internal(format!("failed to sign access token: {}", e)))?;

    TokenStore::store_access_token(
        &state.redis,
        claims.sub,
        &access_token,
        state.config.access_token_expiration_secs,
    )
    .await?;

    Ok(success_to_api_response(RefreshTokenResponse {
        access_token,
        token_type: "Bearer".into(),
        expires_in: state.config.access_token_expiration_secs,
    }))
}
