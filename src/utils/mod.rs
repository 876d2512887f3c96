use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,              // 用户ID
    pub user_name: String,     // 登录名
    pub email: Option<String>, // 邮箱
    pub iat: i64,              // 签发时间
    pub exp: i64,              // 过期时间
}

fn build_claims(user_id: i64, user_name: &str, email: Option<&str>, ttl_secs: u64) -> Claims {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::seconds(ttl_secs as i64))
        .expect("valid timestamp")
        .timestamp();

    Claims {
        sub: user_id,
        user_name: user_name.to_string(),
        email: email.map(|e| e.to_string()),
        iat: now.timestamp(),
        exp: expiration,
    }
}

pub fn generate_access_token(
    user_id: i64,
    user_name: &str,
    email: Option<&str>,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = build_claims(
        user_id,
        user_name,
        email,
        config.access_token_expiration_secs,
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// 刷新令牌使用独立密钥和更长的有效期
pub fn generate_refresh_token(
    user_id: i64,
    user_name: &str,
    email: Option<&str>,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = build_claims(
        user_id,
        user_name,
        email,
        config.refresh_token_expiration_secs,
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
    )
}

pub fn verify_access_token(
    token: &str,
    config: &Config,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub fn verify_refresh_token(
    token: &str,
    config: &Config,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_refresh_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/test".into(),
            redis_url: "redis://localhost".into(),
            jwt_secret: "access-secret".into(),
            jwt_refresh_secret: "refresh-secret".into(),
            access_token_expiration_secs: 7 * 24 * 60 * 60,
            refresh_token_expiration_secs: 30 * 24 * 60 * 60,
            bcrypt_cost: 4,
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            api_prefix: "/api".into(),
        }
    }

    #[test]
    fn hash_then_verify_roundtrip() {
        let hashed = hash_password("secret-pw", 4).unwrap();
        assert!(verify_password("secret-pw", &hashed).unwrap());
        assert!(!verify_password("wrong-pw", &hashed).unwrap());
    }

    #[test]
    fn hash_is_salted() {
        let a = hash_password("same-input", 4).unwrap();
        let b = hash_password("same-input", 4).unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same-input", &a).unwrap());
        assert!(verify_password("same-input", &b).unwrap());
    }

    #[test]
    fn malformed_hash_fails_closed() {
        assert!(verify_password("whatever", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn access_token_roundtrip() {
        let config = test_config();
        let token =
            generate_access_token(42, "alice01", Some("alice@example.com"), &config).unwrap();
        let claims = verify_access_token(&token, &config).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.user_name, "alice01");
        assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_uses_distinct_secret() {
        let config = test_config();
        let refresh = generate_refresh_token(42, "alice01", None, &config).unwrap();
        // 刷新令牌不能通过访问令牌密钥校验，反之亦然
        assert!(verify_access_token(&refresh, &config).is_err());
        assert!(verify_refresh_token(&refresh, &config).is_ok());

        let access = generate_access_token(42, "alice01", None, &config).unwrap();
        assert!(verify_refresh_token(&access, &config).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = test_config();
        let token = generate_access_token(1, "bob", None, &config).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('x');
        assert!(verify_access_token(&tampered, &config).is_err());
    }
}
