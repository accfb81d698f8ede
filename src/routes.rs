use axum::{
    Json, Router, async_trait,
    extract::{FromRequestParts, Query, State},
    http::{Uri, request::Parts},
    response::Redirect,
    routing::get,
};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{self, Classifier};
use crate::error::ApiError;
use crate::types::{ClassificationMode, ClassificationRequest, ClassificationResult};

/// Either a label from the backend or one of the [`ApiError`] kinds.
pub type HandlerOutcome = Result<Json<ClassificationResult>, ApiError>;

#[derive(Clone)]
pub struct AppState {
    classifier: Option<Arc<dyn Classifier + Send + Sync>>,
    backend_timeout: Duration,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            classifier: None,
            backend_timeout: Duration::from_secs(30),
        }
    }
}

impl AppState {
    /// State with no backend attached; every classification is not implemented.
    pub fn new(backend_timeout: Duration) -> Self {
        Self {
            classifier: None,
            backend_timeout,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier + Send + Sync>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/classifier/multi/", get(classify_multi))
        .route("/classifier/binary/", get(classify_binary))
        .route("/classifier/multi", get(add_trailing_slash))
        .route("/classifier/binary", get(add_trailing_slash))
        .with_state(state)
}

/// Pairs in query-string order; a repeated `text` keeps its last value.
type QueryPairs = Vec<(String, String)>;

#[async_trait]
impl<S> FromRequestParts<S> for ClassificationRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<QueryPairs>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::malformed(rejection.body_text()))?;

        let text = pairs
            .into_iter()
            .rev()
            .find_map(|(key, value)| (key == "text").then_some(value))
            .ok_or_else(|| ApiError::missing_field("text"))?;
        Ok(ClassificationRequest { text })
    }
}

async fn classify_multi(
    State(state): State<AppState>,
    request: ClassificationRequest,
) -> HandlerOutcome {
    classify(&state, ClassificationMode::Multi, request).await
}

async fn classify_binary(
    State(state): State<AppState>,
    request: ClassificationRequest,
) -> HandlerOutcome {
    classify(&state, ClassificationMode::Binary, request).await
}

#[tracing::instrument(skip(state, request), fields(mode = %mode, text_len = request.text.len()))]
async fn classify(
    state: &AppState,
    mode: ClassificationMode,
    request: ClassificationRequest,
) -> HandlerOutcome {
    counter!("classification_requests_total", "mode" => mode.as_str()).increment(1);

    let outcome = match &state.classifier {
        Some(classifier) => {
            engine::classify_with_timeout(
                classifier.as_ref(),
                &request.text,
                mode,
                state.backend_timeout,
            )
            .await
            .map(Json)
            .map_err(ApiError::from)
        }
        None => Err(ApiError::NotImplemented(mode)),
    };

    match &outcome {
        Ok(Json(result)) => tracing::debug!(label = %result.label, "Classification completed"),
        Err(err @ ApiError::NotImplemented(_)) => {
            tracing::warn!(error = %err, "No classifier attached")
        }
        Err(err) => tracing::error!(error = %err, "Classification failed"),
    }
    if let Err(err) = &outcome {
        counter!(
            "classification_failures_total",
            "mode" => mode.as_str(),
            "kind" => err.kind().as_str()
        )
        .increment(1);
    }

    outcome
}

async fn add_trailing_slash(uri: Uri) -> Redirect {
    let target = match uri.query() {
        Some(query) => format!("{}/?{}", uri.path(), query),
        None => format!("{}/", uri.path()),
    };
    Redirect::temporary(&target)
}
