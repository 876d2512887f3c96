use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;
use crate::routes::common::{default_page_num, default_page_size};

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub user_name: String,
    pub nick_name: Option<String>,
    #[serde(skip_serializing)]
    pub password: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// 角色详情等场景下的用户摘要，天然不含密码字段
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub user_name: String,
    pub nick_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    #[serde(default = "default_page_num")]
    pub page_num: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub nick_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRolesRequest {
    pub role_ids: Vec<i64>,
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if !email.contains('@') || email.len() > 255 {
        return Err(AppError::Validation("邮箱格式不正确".into()));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), AppError> {
    if phone.len() < 5 || phone.len() > 20 || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation("手机号格式不正确".into()));
    }
    Ok(())
}

/// 邮箱和手机号至少保留一个，注册和资料更新共用同一条规则
pub fn ensure_email_or_phone(
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<(), AppError> {
    let has_email = email.map(|e| !e.trim().is_empty()).unwrap_or(false);
    let has_phone = phone.map(|p| !p.trim().is_empty()).unwrap_or(false);
    if !has_email && !has_phone {
        return Err(AppError::Validation("邮箱或手机号至少需要提供一个".into()));
    }
    Ok(())
}

impl User {
    /// 创建用户，唯一约束兜底应用层预检查
    pub async fn create(
        pool: &PgPool,
        user_name: &str,
        nick_name: Option<&str>,
        password_hash: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Self, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_name, nick_name, password, email, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_name, nick_name, password, email, phone, is_active,
                      created_by, updated_by, create_time, update_time
            "#,
        )
        .bind(user_name)
        .bind(nick_name)
        .bind(password_hash)
        .bind(email)
        .bind(phone)
        .fetch_one(pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, user_name, nick_name, password, email, phone, is_active,
                   created_by, updated_by, create_time, update_time
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_user_name(
        pool: &PgPool,
        user_name: &str,
    ) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, user_name, nick_name, password, email, phone, is_active,
                   created_by, updated_by, create_time, update_time
            FROM users
            WHERE user_name = $1
            "#,
        )
        .bind(user_name)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn user_name_exists(pool: &PgPool, user_name: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE user_name = $1)")
                .bind(user_name)
                .fetch_one(pool)
                .await?;
        Ok(exists)
    }

    pub async fn email_exists(
        pool: &PgPool,
        email: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND ($2::bigint IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    pub async fn phone_exists(
        pool: &PgPool,
        phone: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE phone = $1 AND ($2::bigint IS NULL OR id <> $2))",
        )
        .bind(phone)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    /// 按创建时间倒序分页
    pub async fn list(
        pool: &PgPool,
        page_num: u32,
        page_size: u32,
    ) -> Result<(Vec<Self>, i64), AppError> {
        let offset = ((page_num - 1) as i64) * (page_size as i64);

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, user_name, nick_name, password, email, phone, is_active,
                   created_by, updated_by, create_time, update_time
            FROM users
            ORDER BY create_time DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok((users, total))
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        nick_name: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
        is_active: bool,
        updated_by: &str,
    ) -> Result<Self, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET nick_name = $1, email = $2, phone = $3, is_active = $4,
                updated_by = $5, update_time = NOW()
            WHERE id = $6
            RETURNING id, user_name, nick_name, password, email, phone, is_active,
                      created_by, updated_by, create_time, update_time
            "#,
        )
        .bind(nick_name)
        .bind(email)
        .bind(phone)
        .bind(is_active)
        .bind(updated_by)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(user)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// 全量替换用户的角色集合，任一角色ID无效则整体失败
    pub async fn assign_roles(
        pool: &PgPool,
        user_id: i64,
        role_ids: &[i64],
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;

        if !role_ids.is_empty() {
            let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE id = ANY($1)")
                .bind(role_ids)
                .fetch_one(&mut *tx)
                .await?;
            if found != role_ids.len() as i64 {
                return Err(AppError::NotFound("部分角色ID不存在".into()));
            }
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if !role_ids.is_empty() {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role_id) SELECT $1, unnest($2::bigint[])",
            )
            .bind(user_id)
            .bind(role_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// 把存储层的唯一约束冲突翻译成与预检查一致的错误
fn map_unique_violation(err: sqlx::Error) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            let message = match db_err.constraint() {
                Some("users_user_name_key") => "用户名已存在",
                Some("users_email_key") => "邮箱已存在",
                Some("users_phone_key") => "手机号已存在",
                _ => "用户名/邮箱/手机号已存在",
            };
            return AppError::Conflict(message.into());
        }
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_or_phone_rule() {
        assert!(ensure_email_or_phone(Some("a@b.com"), None).is_ok());
        assert!(ensure_email_or_phone(None, Some("13812345678")).is_ok());
        assert!(ensure_email_or_phone(Some("a@b.com"), Some("13812345678")).is_ok());
        assert!(ensure_email_or_phone(None, None).is_err());
        assert!(ensure_email_or_phone(Some("  "), Some("")).is_err());
    }

    #[test]
    fn email_and_phone_formats() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_phone("13812345678").is_ok());
        assert!(validate_phone("13812x45678").is_err());
        assert!(validate_phone("123").is_err());
    }

    #[test]
    fn password_never_serialized() {
        let user = User {
            id: 1,
            user_name: "alice01".into(),
            nick_name: None,
            password: "$2b$12$secret".into(),
            email: Some("alice@example.com".into()),
            phone: None,
            is_active: true,
            created_by: None,
            updated_by: None,
            create_time: Utc::now(),
            update_time: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["userName"], "alice01");
    }
}
