use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};

use crate::error::AppError;
use crate::routes::common::{default_page_num, default_page_size};
use crate::routes::permissions::model::Permission;
use crate::routes::users::model::UserSummary;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub sort: i32,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// 角色详情，携带权限集合与持有该角色的用户
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub sort: Option<i32>,
    pub is_active: Option<bool>,
    pub permission_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub sort: Option<i32>,
    pub is_active: Option<bool>,
    pub permission_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleQuery {
    #[serde(default = "default_page_num")]
    pub page_num: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub code: Option<String>,
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPermissionsRequest {
    pub permission_ids: Vec<i64>,
}

const ROLE_COLUMNS: &str = "id, code, name, description, sort, is_active, \
                            created_by, updated_by, create_time, update_time";

impl Role {
    pub async fn code_exists(
        pool: &PgPool,
        code: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM roles WHERE code = $1 AND ($2::bigint IS NULL OR id <> $2))",
        )
        .bind(code)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    /// 创建角色并在同一事务内关联权限，权限ID无效则整体回滚
    pub async fn create(
        pool: &PgPool,
        req: &CreateRoleRequest,
        created_by: &str,
    ) -> Result<Self, AppError> {
        let mut tx = pool.begin().await?;

        let role = sqlx::query_as::<_, Role>(&format!(
            r#"
            INSERT INTO roles (code, name, description, sort, is_active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ROLE_COLUMNS}
            "#,
        ))
        .bind(&req.code)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.sort.unwrap_or(0))
        .bind(req.is_active.unwrap_or(true))
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(permission_ids) = &req.permission_ids {
            replace_permissions_tx(&mut tx, role.id, permission_ids).await?;
        }

        tx.commit().await?;
        Ok(role)
    }

    pub async fn list(
        pool: &PgPool,
        query: &RoleQuery,
        page_num: u32,
        page_size: u32,
    ) -> Result<(Vec<Self>, i64), AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE 1=1"
        ));
        push_filters(&mut qb, query);
        qb.push(" ORDER BY sort ASC, create_time DESC");
        qb.push(" LIMIT ").push_bind(page_size as i64);
        qb.push(" OFFSET ")
            .push_bind(((page_num - 1) as i64) * (page_size as i64));

        let roles = qb.build_query_as::<Role>().fetch_all(pool).await?;

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM roles WHERE 1=1");
        push_filters(&mut count_qb, query);
        let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

        Ok((roles, total))
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, AppError> {
        let role = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(role)
    }

    pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Self>, AppError> {
        let role = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(pool)
        .await?;
        Ok(role)
    }

    /// 角色关联的权限，按目录的默认顺序返回
    pub async fn permissions_of(pool: &PgPool, role_id: i64) -> Result<Vec<Permission>, AppError> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.code, p.name, p.description, p.type, p.resource, p.method,
                   p.parent_id, p.sort, p.is_active,
                   p.created_by, p.updated_by, p.create_time, p.update_time
            FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.sort ASC, p.create_time DESC
            "#,
        )
        .bind(role_id)
        .fetch_all(pool)
        .await?;
        Ok(permissions)
    }

    pub async fn users_of(pool: &PgPool, role_id: i64) -> Result<Vec<UserSummary>, AppError> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.user_name, u.nick_name, u.email, u.phone, u.is_active
            FROM users u
            INNER JOIN user_roles ur ON ur.user_id = u.id
            WHERE ur.role_id = $1
            ORDER BY u.create_time DESC
            "#,
        )
        .bind(role_id)
        .fetch_all(pool)
        .await?;
        Ok(users)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        pool: &PgPool,
        id: i64,
        code: &str,
        name: &str,
        description: Option<&str>,
        sort: i32,
        is_active: bool,
        updated_by: &str,
        permission_ids: Option<&[i64]>,
    ) -> Result<Self, AppError> {
        let mut tx = pool.begin().await?;

        let role = sqlx::query_as::<_, Role>(&format!(
            r#"
            UPDATE roles
            SET code = $1, name = $2, description = $3, sort = $4, is_active = $5,
                updated_by = $6, update_time = NOW()
            WHERE id = $7
            RETURNING {ROLE_COLUMNS}
            "#,
        ))
        .bind(code)
        .bind(name)
        .bind(description)
        .bind(sort)
        .bind(is_active)
        .bind(updated_by)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        // 提供了 permissionIds 即全量替换，空数组表示清空
        if let Some(permission_ids) = permission_ids {
            replace_permissions_tx(&mut tx, id, permission_ids).await?;
        }

        tx.commit().await?;
        Ok(role)
    }

    /// 全量替换角色的权限集合
    pub async fn assign_permissions(
        pool: &PgPool,
        role_id: i64,
        permission_ids: &[i64],
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        replace_permissions_tx(&mut tx, role_id, permission_ids).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn user_count(pool: &PgPool, role_id: i64) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role_id = $1")
                .bind(role_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// 调用者持有的启用角色代码，授权中间件使用
    pub async fn codes_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<String>, AppError> {
        let codes: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.code
            FROM roles r
            INNER JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1 AND r.is_active = TRUE
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(codes)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &RoleQuery) {
    if let Some(code) = &query.code {
        qb.push(" AND code LIKE ").push_bind(format!("%{}%", code));
    }
    if let Some(name) = &query.name {
        qb.push(" AND name LIKE ").push_bind(format!("%{}%", name));
    }
    if let Some(is_active) = query.is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
}

/// 校验权限ID全部存在后整体替换，任一无效则返回 NotFound 并回滚
async fn replace_permissions_tx(
    tx: &mut Transaction<'_, Postgres>,
    role_id: i64,
    permission_ids: &[i64],
) -> Result<(), AppError> {
    if !permission_ids.is_empty() {
        let found: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE id = ANY($1)")
                .bind(permission_ids)
                .fetch_one(&mut **tx)
                .await?;
        if found != permission_ids.len() as i64 {
            return Err(AppError::NotFound("部分权限ID不存在".into()));
        }
    }

    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut **tx)
        .await?;

    if !permission_ids.is_empty() {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) SELECT $1, unnest($2::bigint[])",
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
