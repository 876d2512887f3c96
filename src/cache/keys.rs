/// 访问令牌缓存键前缀
const ACCESS_TOKEN_PREFIX: &str = "access_token:";

/// 刷新令牌缓存键前缀
const REFRESH_TOKEN_PREFIX: &str = "refresh_token:";

/// 限流计数键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 生成访问令牌缓存键
pub fn access_token_key(user_id: i64) -> String {
    format!("{}{}", ACCESS_TOKEN_PREFIX, user_id)
}

/// 生成刷新令牌缓存键
pub fn refresh_token_key(user_id: i64) -> String {
    format!("{}{}", REFRESH_TOKEN_PREFIX, user_id)
}

/// 生成限流计数键
pub fn rate_limit_key(ip: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(access_token_key(42), "access_token:42");
        assert_eq!(refresh_token_key(42), "refresh_token:42");
        assert_eq!(rate_limit_key("10.0.0.1"), "rate_limit:10.0.0.1");
    }
}
