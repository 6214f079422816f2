use axum::{
    http::{header, Method},
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod reservations;
pub mod state;
pub mod trips;
pub mod users;

pub use error::AppError;
pub use state::{AppState, AuthConfig};

use middleware::{authenticate, require_admin};

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::USER_AGENT]);

    // Layers run bottom-up: the token is decoded before the role is checked
    let admin = admin::routes()
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let authenticated = trips::manage_routes()
        .merge(reservations::routes())
        .merge(users::routes())
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let api = trips::public_routes()
        .merge(users::public_routes())
        .merge(authenticated)
        .nest("/admin", admin);

    Router::new()
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
