use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::routes::common::{default_page_num, default_page_size};

/// 合法的权限类型
pub const PERMISSION_TYPES: &[&str] = &["api", "menu", "button"];

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub permission_type: String,
    pub resource: Option<String>,
    pub method: Option<String>,
    pub parent_id: Option<i64>,
    pub sort: i32,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub permission_type: String,
    pub resource: Option<String>,
    pub method: Option<String>,
    pub parent_id: Option<i64>,
    pub sort: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissionRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub permission_type: Option<String>,
    pub resource: Option<String>,
    pub method: Option<String>,
    pub parent_id: Option<i64>,
    pub sort: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionQuery {
    #[serde(default = "default_page_num")]
    pub page_num: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub permission_type: Option<String>,
    pub parent_id: Option<i64>,
    pub is_active: Option<bool>,
}

const PERMISSION_COLUMNS: &str = "id, code, name, description, type, resource, method, \
                                  parent_id, sort, is_active, \
                                  created_by, updated_by, create_time, update_time";

impl Permission {
    pub async fn code_exists(
        pool: &PgPool,
        code: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM permissions WHERE code = $1 AND ($2::bigint IS NULL OR id <> $2))",
        )
        .bind(code)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(
        pool: &PgPool,
        req: &CreatePermissionRequest,
        created_by: &str,
    ) -> Result<Self, AppError> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            r#"
            INSERT INTO permissions (code, name, description, type, resource, method,
                                     parent_id, sort, is_active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PERMISSION_COLUMNS}
            "#,
        ))
        .bind(&req.code)
        .bind(&req.name)
        .bind(&req.description)
        .bind(&req.permission_type)
        .bind(&req.resource)
        .bind(&req.method)
        .bind(req.parent_id)
        .bind(req.sort.unwrap_or(0))
        .bind(req.is_active.unwrap_or(true))
        .bind(created_by)
        .fetch_one(pool)
        .await?;

        Ok(permission)
    }

    pub async fn list(
        pool: &PgPool,
        query: &PermissionQuery,
        page_num: u32,
        page_size: u32,
    ) -> Result<(Vec<Self>, i64), AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE 1=1"
        ));
        push_filters(&mut qb, query);
        qb.push(" ORDER BY sort ASC, create_time DESC");
        qb.push(" LIMIT ").push_bind(page_size as i64);
        qb.push(" OFFSET ")
            .push_bind(((page_num - 1) as i64) * (page_size as i64));

        let permissions = qb.build_query_as::<Permission>().fetch_all(pool).await?;

        let mut count_qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM permissions WHERE 1=1");
        push_filters(&mut count_qb, query);
        let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

        Ok((permissions, total))
    }

    /// 全量权限集合，树形关系由调用方按 parentId 组装
    pub async fn tree(pool: &PgPool) -> Result<Vec<Self>, AppError> {
        let permissions = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY sort ASC, create_time DESC"
        ))
        .fetch_all(pool)
        .await?;
        Ok(permissions)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, AppError> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(permission)
    }

    pub async fn find_by_code(pool: &PgPool, code: &str) -> Result<Option<Self>, AppError> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(pool)
        .await?;
        Ok(permission)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        pool: &PgPool,
        id: i64,
        code: &str,
        name: &str,
        description: Option<&str>,
        permission_type: &str,
        resource: Option<&str>,
        method: Option<&str>,
        parent_id: Option<i64>,
        sort: i32,
        is_active: bool,
        updated_by: &str,
    ) -> Result<Self, AppError> {
        let permission = sqlx::query_as::<_, Permission>(&format!(
            r#"
            UPDATE permissions
            SET code = $1, name = $2, description = $3, type = $4, resource = $5,
                method = $6, parent_id = $7, sort = $8, is_active = $9,
                updated_by = $10, update_time = NOW()
            WHERE id = $11
            RETURNING {PERMISSION_COLUMNS}
            "#,
        ))
        .bind(code)
        .bind(name)
        .bind(description)
        .bind(permission_type)
        .bind(resource)
        .bind(method)
        .bind(parent_id)
        .bind(sort)
        .bind(is_active)
        .bind(updated_by)
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(permission)
    }

    pub async fn children_count(pool: &PgPool, id: i64) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE parent_id = $1")
                .bind(id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// 父级引用对，用于更新父级时的环路检查
    pub async fn parent_links(pool: &PgPool) -> Result<HashMap<i64, Option<i64>>, AppError> {
        let rows: Vec<(i64, Option<i64>)> =
            sqlx::query_as("SELECT id, parent_id FROM permissions")
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    /// 调用者经由角色展开得到的启用权限代码全集
    pub async fn codes_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<String>, AppError> {
        let codes: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT p.code
            FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.id
            INNER JOIN roles r ON r.id = rp.role_id
            INNER JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1 AND p.is_active = TRUE AND r.is_active = TRUE
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(codes)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &PermissionQuery) {
    if let Some(code) = &query.code {
        qb.push(" AND code LIKE ").push_bind(format!("%{}%", code));
    }
    if let Some(name) = &query.name {
        qb.push(" AND name LIKE ").push_bind(format!("%{}%", name));
    }
    if let Some(permission_type) = &query.permission_type {
        qb.push(" AND type = ").push_bind(permission_type.clone());
    }
    if let Some(parent_id) = query.parent_id {
        qb.push(" AND parent_id = ").push_bind(parent_id);
    }
    if let Some(is_active) = query.is_active {
        qb.push(" AND is_active = ").push_bind(is_active);
    }
}

/// 沿父级链迭代上溯判断是否成环，带访问集合兜底脏数据
pub fn would_create_cycle(
    links: &HashMap<i64, Option<i64>>,
    id: i64,
    new_parent: Option<i64>,
) -> bool {
    let mut seen = HashSet::new();
    let mut current = new_parent;
    while let Some(parent) = current {
        if parent == id || !seen.insert(parent) {
            return true;
        }
        current = links.get(&parent).copied().flatten();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(pairs: &[(i64, Option<i64>)]) -> HashMap<i64, Option<i64>> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let links = links(&[(1, None)]);
        assert!(would_create_cycle(&links, 1, Some(1)));
    }

    #[test]
    fn reparenting_under_descendant_is_a_cycle() {
        // 1 -> 2 -> 3，把1挂到3下面会成环
        let links = links(&[(1, None), (2, Some(1)), (3, Some(2))]);
        assert!(would_create_cycle(&links, 1, Some(3)));
        assert!(!would_create_cycle(&links, 3, Some(1)));
    }

    #[test]
    fn valid_reparent_is_not_a_cycle() {
        let links = links(&[(1, None), (2, Some(1)), (3, None)]);
        assert!(!would_create_cycle(&links, 2, Some(3)));
        assert!(!would_create_cycle(&links, 2, None));
    }

    #[test]
    fn preexisting_dirty_cycle_does_not_loop_forever() {
        // 脏数据：4和5互为父级，访问集合保证终止
        let links = links(&[(4, Some(5)), (5, Some(4))]);
        assert!(would_create_cycle(&links, 1, Some(4)));
    }
}
