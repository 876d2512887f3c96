use redis::{AsyncCommands, Client as RedisClient};
use std::sync::Arc;

use crate::cache::keys;

/// 令牌缓存操作
///
/// Redis 中键的存在与否是令牌是否仍然有效的唯一权威：
/// 过期或登出删除后，即使令牌本身签名未过期也视为失效。
pub struct TokenStore;

impl TokenStore {
    /// 写入访问令牌，过期时间与令牌有效期一致
    pub async fn store_access_token(
        redis: &Arc<RedisClient>,
        user_id: i64,
        token: &str,
        ttl_secs: u64,
    ) -> Result<(), redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        let _: () = conn
            .set_ex(keys::access_token_key(user_id), token, ttl_secs)
            .await?;
        Ok(())
    }

    /// 写入刷新令牌
    pub async fn store_refresh_token(
        redis: &Arc<RedisClient>,
        user_id: i64,
        token: &str,
        ttl_secs: u64,
    ) -> Result<(), redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        let _: () = conn
            .set_ex(keys::refresh_token_key(user_id), token, ttl_secs)
            .await?;
        Ok(())
    }

    pub async fn get_access_token(
        redis: &Arc<RedisClient>,
        user_id: i64,
    ) -> Result<Option<String>, redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        conn.get(keys::access_token_key(user_id)).await
    }

    pub async fn get_refresh_token(
        redis: &Arc<RedisClient>,
        user_id: i64,
    ) -> Result<Option<String>, redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        conn.get(keys::refresh_token_key(user_id)).await
    }

    /// 删除用户的两类令牌，键不存在时同样视为成功
    pub async fn remove_tokens(
        redis: &Arc<RedisClient>,
        user_id: i64,
    ) -> Result<(), redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        let _: () = conn
            .del(vec![
                keys::access_token_key(user_id),
                keys::refresh_token_key(user_id),
            ])
            .await?;
        Ok(())
    }
}
