use crate::auth;
use crate::config::SessionLayer;
use crate::handlers;
use crate::AppState;
use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::path::Path;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Assembles the API, the session layer and the storefront's static files.
pub fn build_router(state: AppState, session_layer: SessionLayer, static_dir: &Path) -> Router {
    let protected_routes = Router::new()
        .route("/api/me", get(auth::handlers::me_handler))
        .layer(middleware::from_fn(auth::middleware::require_auth));

    let api_routes = Router::new()
        .route("/api/registro", post(handlers::register_handler))
        .route("/api/verificar", post(handlers::verify_handler))
        .route("/api/login", post(auth::handlers::login_handler))
        .route("/api/logout", post(auth::handlers::logout_handler))
        .route("/api/contacto", post(handlers::contact_handler))
        .route(
            "/api/recuperar-password",
            post(handlers::request_recovery_handler),
        )
        .route(
            "/api/restablecer-password",
            post(handlers::reset_password_handler),
        )
        .merge(protected_routes);

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(api_routes)
        .fallback_service(ServeDir::new(static_dir))
        .layer(session_layer)
        .layer(cors_layer)
        .layer(middleware::from_fn(add_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn add_security_headers(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if std::env::var("ENVIRONMENT")
        .map(|env| env == "production")
        .unwrap_or(false)
    {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}
