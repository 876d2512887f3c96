use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};

const MAX_ERROR_BODY: usize = 64 * 1024;

/// 错误响应中间件：记录 4xx/5xx 响应，并为统一错误体补充请求路径
pub async fn unify_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let status = response.status();

    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_ERROR_BODY).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read error response body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    // 非JSON响应（如框架自身的拒绝）原样透传
    let bytes = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(mut value) => {
            if let Some(obj) = value.as_object_mut() {
                obj.insert(
                    "path".to_string(),
                    serde_json::Value::String(path.clone()),
                );
            }
            serde_json::to_vec(&value)
                .map(axum::body::Bytes::from)
                .unwrap_or(bytes)
        }
        Err(_) => bytes,
    };

    let body_str = String::from_utf8_lossy(&bytes);
    if status.is_server_error() {
        error!("{} {} - {} - {}", method, path, status, body_str);
    } else {
        warn!("{} {} - {} - {}", method, path, status, body_str);
    }

    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
