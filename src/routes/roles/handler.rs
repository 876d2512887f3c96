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
    AssignPermissionsRequest, CreateRoleRequest, Role, RoleDetail, RoleQuery, UpdateRoleRequest,
};

#[axum::debug_handler]
pub async fn create(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateRoleRequest>,
) -> Result<Json<ApiResponse<Role>>, AppError> {
    validate_code(&req.code)?;
    validate_name(&req.name)?;

    if Role::code_exists(&state.pool, &req.code, None).await? {
        return Err(AppError::Conflict("角色代码已存在".into()));
    }

    let role = Role::create(&state.pool, &req, &claims.user_name).await?;

    Ok(success_to_api_response(role))
}

#[axum::debug_handler]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<RoleQuery>,
) -> Result<Json<ApiResponse<PageResult<Role>>>, AppError> {
    let (page_num, page_size) = clamp_page(query.page_num, query.page_size);

    let (roles, total) = Role::list(&state.pool, &query, page_num, page_size).await?;

    Ok(success_to_api_response(PageResult::new(
        roles, total, page_num, page_size,
    )))
}

#[axum::debug_handler]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<RoleDetail>>, AppError> {
    let role = Role::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ID为 {} 的角色不存在", id)))?;

    let permissions = Role::permissions_of(&state.pool, id).await?;
    let users = Role::users_of(&state.pool, id).await?;

    Ok(success_to_api_response(RoleDetail {
        role,
        permissions,
        users,
    }))
}

#[axum::debug_handler]
pub async fn get_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<RoleDetail>>, AppError> {
    let role = Role::find_by_code(&state.pool, &code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("角色代码 {} 不存在", code)))?;

    let permissions = Role::permissions_of(&state.pool, role.id).await?;
    let users = Role::users_of(&state.pool, role.id).await?;

    Ok(success_to_api_response(RoleDetail {
        role,
        permissions,
        users,
    }))
}

#[axum::debug_handler]
pub async fn update(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<ApiResponse<Role>>, AppError> {
    let role = Role::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ID为 {} 的角色不存在", id)))?;

    // 变更代码时检查与其他角色的冲突
    let code = match &req.code {
        Some(code) if code != &role.code => {
            validate_code(code)?;
            if Role::code_exists(&state.pool, code, Some(id)).await? {
                return Err(AppError::Conflict("角色代码已存在".into()));
            }
            code.clone()
        }
        _ => role.code.clone(),
    };

    let name = match &req.name {
        Some(name) => {
            validate_name(name)?;
            name.clone()
        }
        None => role.name.clone(),
    };

    let description = req.description.clone().or_else(|| role.description.clone());
    let sort = req.sort.unwrap_or(role.sort);
    let is_active = req.is_active.unwrap_or(role.is_active);

    let updated = Role::update(
        &state.pool,
        id,
        &code,
        &name,
        description.as_deref(),
        sort,
        is_active,
        &claims.user_name,
        req.permission_ids.as_deref(),
    )
    .await?;

    Ok(success_to_api_response(updated))
}

#[axum::debug_handler]
pub async fn assign_permissions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AssignPermissionsRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    Role::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ID为 {} 的角色不存在", id)))?;

    Role::assign_permissions(&state.pool, id, &req.permission_ids).await?;

    Ok(message_to_api_response("分配成功"))
}

#[axum::debug_handler]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    Role::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ID为 {} 的角色不存在", id)))?;

    if Role::user_count(&state.pool, id).await? > 0 {
        return Err(AppError::Conflict("该角色下存在用户，无法删除".into()));
    }

    Role::delete(&state.pool, id).await?;

    Ok(message_to_api_response("删除成功"))
}

fn validate_code(code: &str) -> Result<(), AppError> {
    if code.trim().is_empty() || code.len() > 50 {
        return Err(AppError::Validation("角色代码长度必须在1到50个字符之间".into()));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), AppError> {
    let len = name.chars().count();
    if name.trim().is_empty() || len > 50 {
        return Err(AppError::Validation("角色名称长度必须在1到50个字符之间".into()));
    }
    Ok(())
}
