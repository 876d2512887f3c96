use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::routes::users::model::{ensure_email_or_phone, validate_email, validate_phone};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_name: String,
    pub nick_name: Option<String>,
    pub password: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

/// 登录响应里的用户摘要
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    pub id: i64,
    pub user_name: String,
    pub nick_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: LoginUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl RegisterRequest {
    /// 空白字符串按缺省处理
    pub fn normalize(&mut self) {
        self.user_name = self.user_name.trim().to_string();
        self.nick_name = take_non_empty(self.nick_name.take());
        self.email = take_non_empty(self.email.take());
        self.phone = take_non_empty(self.phone.take());
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.user_name.len() < 6 || self.user_name.len() > 20 {
            return Err(AppError::Validation("用户名长度必须在6到20个字符之间".into()));
        }
        if !self
            .user_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::Validation(
                "用户名只允许使用字母、数字和下划线".into(),
            ));
        }
        if self.password.len() < 8 || self.password.len() > 20 {
            return Err(AppError::Validation("密码长度必须在8到20个字符之间".into()));
        }
        if let Some(nick) = &self.nick_name {
            let len = nick.chars().count();
            if !(2..=20).contains(&len) {
                return Err(AppError::Validation("昵称长度必须在2到20个字符之间".into()));
            }
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        ensure_email_or_phone(self.email.as_deref(), self.phone.as_deref())?;
        Ok(())
    }
}

fn take_non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> RegisterRequest {
        RegisterRequest {
            user_name: "alice01".into(),
            nick_name: Some("爱丽丝".into()),
            password: "Test1234".into(),
            email: Some("alice@example.com".into()),
            phone: None,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn short_user_name_rejected() {
        let mut req = valid_request();
        req.user_name = "abc".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn user_name_charset_rejected() {
        let mut req = valid_request();
        req.user_name = "alice-01!".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn missing_email_and_phone_rejected() {
        let mut req = valid_request();
        req.email = None;
        req.phone = None;
        assert!(req.validate().is_err());
    }

    #[test]
    fn phone_alone_is_enough() {
        let mut req = valid_request();
        req.email = None;
        req.phone = Some("13812345678".into());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn normalize_drops_blank_fields() {
        let mut req = valid_request();
        req.email = Some("   ".into());
        req.phone = Some("13812345678".into());
        req.normalize();
        assert_eq!(req.email, None);
        assert_eq!(req.phone.as_deref(), Some("13812345678"));
    }
}
