//! HTTP gateway exposing multi-class and binary sentiment classification.
//!
//! The gateway validates the `text` query parameter, forwards it to an
//! attached [`Classifier`] and renders the label. With no classifier attached
//! every classification answers `501 Not Implemented`. A [`CorsPolicy`] is
//! applied to every response leaving the router.

pub mod config;
pub mod cors;
pub mod engine;
pub mod error;
pub mod routes;
pub mod types;

use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat};
pub use cors::{AllowList, CorsPolicy};
pub use engine::{BackendError, Classifier};
pub use error::{ApiError, ErrorKind};
pub use routes::{AppState, HandlerOutcome};
pub use types::{ClassificationMode, ClassificationRequest, ClassificationResult};

/// The classification routes wrapped in the response pipeline.
pub fn app(state: AppState, policy: CorsPolicy) -> Router {
    compose(routes::router(state), policy)
}

/// Wraps `router` with request tracing and the cross-origin policy. Routes
/// merged into `router` beforehand are covered too.
pub fn compose(router: Router, policy: CorsPolicy) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn_with_state(
                Arc::new(policy),
                cors::apply_policy,
            )),
    )
}
