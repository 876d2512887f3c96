use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post, put},
};
use rbac_backend::{
    AppState,
    config::Config,
    error::AppError,
    middleware::{
        ADMIN_ROLES, RateLimiter, RequiredPermissions, RequiredRoles, auth_middleware, rate_limit,
        request_id, roles_guard, unify_errors,
    },
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 用户管理接口的权限代码，与管理员角色之间满足其一即可
const USER_MANAGE_PERMISSIONS: &[&str] = &["user:manage"];

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'rbac_backend';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    // 执行数据库迁移
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // 设置 Redis 客户端
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let redis_arc = Arc::new(redis_client.clone());

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
        redis: redis_arc,
    };

    // 设置限流器
    let rate_limiter = Arc::new(RateLimiter::new(redis_client, config.clone()));

    // 公开路由：注册、登录、刷新令牌
    let public_routes = Router::new()
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh));

    // 用户路由：查询仅需认证，管理操作要求管理员角色或 user:manage 权限
    let user_routes = Router::new()
        .route("/users", get(routes::users::list))
        .route(
            "/users/{id}",
            get(routes::users::get_one).merge(
                put(routes::users::update)
                    .delete(routes::users::remove)
                    .layer::<_, std::convert::Infallible>(axum::middleware::from_fn_with_state(
                        state.clone(),
                        roles_guard,
                    ))
                    .layer::<_, std::convert::Infallible>(Extension(RequiredRoles(ADMIN_ROLES)))
                    .layer::<_, std::convert::Infallible>(Extension(RequiredPermissions(
                        USER_MANAGE_PERMISSIONS,
                    ))),
            ),
        )
        .route(
            "/users/{id}/roles",
            post(routes::users::assign_roles)
                .layer::<_, std::convert::Infallible>(axum::middleware::from_fn_with_state(
                    state.clone(),
                    roles_guard,
                ))
                .layer::<_, std::convert::Infallible>(Extension(RequiredRoles(ADMIN_ROLES)))
                .layer::<_, std::convert::Infallible>(Extension(RequiredPermissions(
                    USER_MANAGE_PERMISSIONS,
                ))),
        );

    // 角色管理路由，整体要求管理员角色
    let role_routes = Router::new()
        .route(
            "/roles",
            post(routes::roles::create).get(routes::roles::list),
        )
        .route(
            "/roles/{id}",
            get(routes::roles::get_one)
                .put(routes::roles::update)
                .delete(routes::roles::remove),
        )
        .route("/roles/code/{code}", get(routes::roles::get_by_code))
        .route(
            "/roles/{id}/permissions",
            post(routes::roles::assign_permissions),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            roles_guard,
        ))
        .route_layer(Extension(RequiredRoles(ADMIN_ROLES)));

    // 权限管理路由，整体要求管理员角色
    let permission_routes = Router::new()
        .route(
            "/permissions",
            post(routes::permissions::create).get(routes::permissions::list),
        )
        .route("/permissions/tree", get(routes::permissions::tree))
        .route(
            "/permissions/{id}",
            get(routes::permissions::get_one)
                .put(routes::permissions::update)
                .delete(routes::permissions::remove),
        )
        .route(
            "/permissions/code/{code}",
            get(routes::permissions::get_by_code),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            roles_guard,
        ))
        .route_layer(Extension(RequiredRoles(ADMIN_ROLES)));

    // 受保护路由统一套认证中间件
    let protected_routes = Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        .merge(user_routes)
        .merge(role_routes)
        .merge(permission_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // 创建基础路由
    let router = Router::new()
        .nest(
            &config.api_prefix.clone(),
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .fallback(|| async { AppError::NotFound("请求的接口不存在".into()) });

    // 限流、统一错误体、请求ID，自内向外依次套上
    let router = router
        .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit))
        .layer(axum::middleware::from_fn(unify_errors))
        .layer(axum::middleware::from_fn(request_id));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        let cors = CorsLayer::permissive();
        router.layer(cors)
    };

    // 添加应用状态
    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
