use axum::{
    Json,
    extract::{Extension, Path, Query, State},
};

use crate::{
    AppState,
    error::AppError,
    routes::common::{
        ApiResponse, PageResult, clamp_page, message_to_api_response, success_to_api_response,
    },
    utils::Claims,
};

use super::model::{
    AssignRolesRequest, UpdateUserRequest, User, UserQuery, ensure_email_or_phone, validate_email,
    validate_phone,
};

#[axum::debug_handler]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<PageResult<User>>>, AppError> {
    let (page_num, page_size) = clamp_page(query.page_num, query.page_size);

    let (users, total) = User::list(&state.pool, page_num, page_size).await?;

    Ok(success_to_api_response(PageResult::new(
        users, total, page_num, page_size,
    )))
}

#[axum::debug_handler]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = User::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ID为 {} 的用户不存在", id)))?;

    Ok(success_to_api_response(user))
}

#[axum::debug_handler]
pub async fn update(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = User::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ID为 {} 的用户不存在", id)))?;

    // 未提供的字段保持原值，空字符串视为清空
    let nick_name = merge_field(req.nick_name, user.nick_name);
    let email = merge_field(req.email, user.email);
    let phone = merge_field(req.phone, user.phone);
    let is_active = req.is_active.unwrap_or(user.is_active);

    if let Some(nick) = &nick_name {
        let len = nick.chars().count();
        if !(2..=20).contains(&len) {
            return Err(AppError::Validation("昵称长度必须在2到20个字符之间".into()));
        }
    }
    if let Some(email) = &email {
        validate_email(email)?;
        if User::email_exists(&state.pool, email, Some(id)).await? {
            return Err(AppError::Conflict("邮箱已存在".into()));
        }
    }
    if let Some(phone) = &phone {
        validate_phone(phone)?;
        if User::phone_exists(&state.pool, phone, Some(id)).await? {
            return Err(AppError::Conflict("手机号已存在".into()));
        }
    }
    ensure_email_or_phone(email.as_deref(), phone.as_deref())?;

    let updated = User::update(
        &state.pool,
        id,
        nick_name.as_deref(),
        email.as_deref(),
        phone.as_deref(),
        is_active,
        &claims.user_name,
    )
    .await?;

    Ok(success_to_api_response(updated))
}

#[axum::debug_handler]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    User::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ID为 {} 的用户不存在", id)))?;

    User::delete(&state.pool, id).await?;

    Ok(message_to_api_response("删除成功"))
}

#[axum::debug_handler]
pub async fn assign_roles(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AssignRolesRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    User::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ID为 {} 的用户不存在", id)))?;

    User::assign_roles(&state.pool, id, &req.role_ids).await?;

    Ok(message_to_api_response("分配成功"))
}

/// Some("") 清空字段，None 保持原值
fn merge_field(incoming: Option<String>, current: Option<String>) -> Option<String> {
    match incoming {
        Some(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        }
        None => current,
    }
}
