// 通用的响应与分页结构

use axum::Json;
use serde::{Deserialize, Serialize};

/// 通用的API响应结构，成功时 code 恒为 0
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: 0,
        message: "ok".into(),
        data: Some(data),
    })
}

/// 无数据的成功响应（登出等场景）
pub fn message_to_api_response(message: &str) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        code: 0,
        message: message.to_string(),
        data: None,
    })
}

/// 分页参数上限，防止单页把全表拉回来
pub const MAX_PAGE_SIZE: u32 = 100;

pub fn default_page_num() -> u32 {
    1
}

pub fn default_page_size() -> u32 {
    10
}

/// 修正分页参数：页码至少为1，页大小限制在 [1, 100]
pub fn clamp_page(page_num: u32, page_size: u32) -> (u32, u32) {
    (page_num.max(1), page_size.clamp(1, MAX_PAGE_SIZE))
}

/// 带分页元信息的查询结果
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page_num: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PageResult<T> {
    pub fn new(data: Vec<T>, total: i64, page_num: u32, page_size: u32) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            ((total as u64).div_ceil(page_size as u64)) as u32
        };

        Self {
            data,
            total,
            page_num,
            page_size,
            total_pages,
            has_next: page_num < total_pages,
            has_prev: page_num > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_params_are_clamped() {
        assert_eq!(clamp_page(0, 0), (1, 1));
        assert_eq!(clamp_page(1, 10), (1, 10));
        assert_eq!(clamp_page(5, 1000), (5, 100));
    }

    #[test]
    fn page_metadata_math() {
        let page = PageResult::new(vec![1, 2, 3], 25, 2, 10);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_prev);

        let last = PageResult::<i32>::new(vec![], 25, 3, 10);
        assert!(!last.has_next);

        let empty = PageResult::<i32>::new(vec![], 0, 1, 10);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }

    #[test]
    fn success_envelope_shape() {
        let Json(resp) = success_to_api_response(serde_json::json!({"id": 1}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["code"], 0);
        assert_eq!(value["message"], "ok");
        assert_eq!(value["data"]["id"], 1);

        let Json(empty) = message_to_api_response("登出成功");
        let value = serde_json::to_value(&empty).unwrap();
        assert_eq!(value["code"], 0);
        assert!(value.get("data").is_none());
    }
}
