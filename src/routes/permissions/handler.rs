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
    CreatePermissionRequest, PERMISSION_TYPES, Permission, PermissionQuery,
    UpdatePermissionRequest, would_create_cycle,
};

#[axum::debug_handler]
pub async fn create(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreatePermissionRequest>,
) -> Result<Json<ApiResponse<Permission>>, AppError> {
    validate_code(&req.code)?;
    validate_name(&req.name)?;
    validate_type(&req.permission_type)?;

    if Permission::code_exists(&state.pool, &req.code, None).await? {
        return Err(AppError::Conflict("权限代码已存在".into()));
    }

    // 父级必须指向已存在的节点
    if let Some(parent_id) = req.parent_id {
        Permission::find_by_id(&state.pool, parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound("父级权限不存在".into()))?;
    }

    let permission = Permission::create(&state.pool, &req, &claims.user_name).await?;

    Ok(success_to_api_response(permission))
}

#[axum::debug_handler]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PermissionQuery>,
) -> Result<Json<ApiResponse<PageResult<Permission>>>, AppError> {
    let (page_num, page_size) = clamp_page(query.page_num, query.page_size);

    let (permissions, total) = Permission::list(&state.pool, &query, page_num, page_size).await?;

    Ok(success_to_api_response(PageResult::new(
        permissions,
        total,
        page_num,
        page_size,
    )))
}

/// 不分页返回全部权限，树形结构由前端按 parentId 组装
#[axum::debug_handler]
pub async fn tree(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Permission>>>, AppError> {
    let permissions = Permission::tree(&state.pool).await?;
    Ok(success_to_api_response(permissions))
}

#[axum::debug_handler]
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Permission>>, AppError> {
    let permission = Permission::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ID为 {} 的权限不存在", id)))?;

    Ok(success_to_api_response(permission))
}

#[axum::debug_handler]
pub async fn get_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<Permission>>, AppError> {
    let permission = Permission::find_by_code(&state.pool, &code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("权限代码 {} 不存在", code)))?;

    Ok(success_to_api_response(permission))
}

#[axum::debug_handler]
pub async fn update(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePermissionRequest>,
) -> Result<Json<ApiResponse<Permission>>, AppError> {
    let permission = Permission::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ID为 {} 的权限不存在", id)))?;

    let code = match &req.code {
        Some(code) if code != &permission.code => {
            validate_code(code)?;
            if Permission::code_exists(&state.pool, code, Some(id)).await? {
                return Err(AppError::Conflict("权限代码已存在".into()));
            }
            code.clone()
        }
        _ => permission.code.clone(),
    };

    let name = match &req.name {
        Some(name) => {
            validate_name(name)?;
            name.clone()
        }
        None => permission.name.clone(),
    };

    let permission_type = match &req.permission_type {
        Some(t) => {
            validate_type(t)?;
            t.clone()
        }
        None => permission.permission_type.clone(),
    };

    // 父级变更时校验目标存在且不形成环
    let parent_id = match req.parent_id {
        Some(new_parent) if req.parent_id != permission.parent_id => {
            Permission::find_by_id(&state.pool, new_parent)
                .await?
                .ok_or_else(|| AppError::NotFound("父级权限不存在".into()))?;

            let links = Permission::parent_links(&state.pool).await?;
            if would_create_cycle(&links, id, Some(new_parent)) {
                return Err(AppError::Conflict("父级权限不能形成循环引用".into()));
            }
            Some(new_parent)
        }
        _ => permission.parent_id,
    };

    let description = req.description.clone().or_else(|| permission.description.clone());
    let resource = req.resource.clone().or_else(|| permission.resource.clone());
    let method = req.method.clone().or_else(|| permission.method.clone());
    let sort = req.sort.unwrap_or(permission.sort);
    let is_active = req.is_active.unwrap_or(permission.is_active);

    let updated = Permission::update(
        &state.pool,
        id,
        &code,
        &name,
        description.as_deref(),
        &permission_type,
        resource.as_deref(),
        method.as_deref(),
        parent_id,
        sort,
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
    Permission::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ID为 {} 的权限不存在", id)))?;

    // 有子级时禁止删除，不做级联
    if Permission::children_count(&state.pool, id).await? > 0 {
        return Err(AppError::Conflict("该权限下存在子权限，无法删除".into()));
    }

    Permission::delete(&state.pool, id).await?;

    Ok(message_to_api_response("删除成功"))
}

fn validate_code(code: &str) -> Result<(), AppError> {
    if code.trim().is_empty() || code.len() > 50 {
        return Err(AppError::Validation("权限代码长度必须在1到50个字符之间".into()));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), AppError> {
    let len = name.chars().count();
    if name.trim().is_empty() || len > 50 {
        return Err(AppError::Validation("权限名称长度必须在1到50个字符之间".into()));
    }
    Ok(())
}

fn validate_type(permission_type: &str) -> Result<(), AppError> {
    if !PERMISSION_TYPES.contains(&permission_type) {
        return Err(AppError::Validation(
            "权限类型必须是 api/menu/button 之一".into(),
        ));
    }
    Ok(())
}
