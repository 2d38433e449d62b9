use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        Form, Query, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use ib_core::Error;
use ib_engine::{IceBreaker, IceBreakerReport};

const INDEX_HTML: &str = include_str!("../assets/index.html");
const MISSING_NAME: &str = "Name parameter is required";

#[derive(Clone)]
struct AppState {
    ice_breaker: Arc<IceBreaker>,
    request_timeout: Duration,
}

pub fn create_app(ice_breaker: Arc<IceBreaker>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/process", post(process))
        .route("/api/icebreaker", get(api_icebreaker))
        .route("/health", get(health_check))
        .with_state(AppState {
            ice_breaker,
            request_timeout,
        })
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

#[derive(Debug, Default, Deserialize)]
struct IceBreakerParams {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    context: Option<String>,
}

/// A JSON error body: `{"error": "..."}`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn missing_name() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: MISSING_NAME.to_string(),
        }
    }

    fn timed_out(after: Duration) -> Self {
        Self {
            status: StatusCode::REQUEST_TIMEOUT,
            message: format!("Request timed out after {:?}", after),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::Lookup { .. } => StatusCode::NOT_FOUND,
        Error::Validation(_)
        | Error::Fetch { .. }
        | Error::Api { .. }
        | Error::Network(_)
        | Error::RateLimit(_)
        | Error::Timeout(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check() -> &'static str {
    "OK"
}

// A body that is not a urlencoded form carries no name.
async fn process(
    State(state): State<AppState>,
    form: Result<Form<IceBreakerParams>, FormRejection>,
) -> Result<Json<IceBreakerReport>, ApiError> {
    let params = match form {
        Ok(Form(params)) => params,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "Form rejected");
            IceBreakerParams::default()
        }
    };
    run(&state, params).await
}

async fn api_icebreaker(
    State(state): State<AppState>,
    query: Result<Query<IceBreakerParams>, QueryRejection>,
) -> Result<Json<IceBreakerReport>, ApiError> {
    let Query(params) = query?;
    run(&state, params).await
}

async fn run(
    state: &AppState,
    params: IceBreakerParams,
) -> Result<Json<IceBreakerReport>, ApiError> {
    let name = params
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(ApiError::missing_name)?;

    info!(person = name, "Processing ice breaker request");
    let outcome = tokio::time::timeout(
        state.request_timeout,
        state
            .ice_breaker
            .ice_break_with_context(name, params.context.as_deref()),
    )
    .await
    .map_err(|_| {
        error!(person = name, timeout = ?state.request_timeout, "Request timed out");
        ApiError::timed_out(state.request_timeout)
    })?;

    match outcome {
        Ok(report) => {
            info!(person = name, "Request succeeded");
            Ok(Json(report))
        }
        Err(e) => {
            error!(person = name, error = %e, "Request failed");
            Err(e.into())
        }
    }
}
