use crate::config::{IdentityConfig, Listener as ListenerConfig, MeteringOptions};
use crate::engine::{EngineError, MeteringEngine};
use crate::errors::ApiError;
use crate::export::export_response;
use crate::identity::Identity;
use crate::metrics_defs::{ENGINE_DURATION, REQUEST_REJECTED, REQUESTS};
use crate::price::PriceResponse;
use crate::query::{Level, Query, QueryError, RawQuery};
use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRef, Path, Query as QueryString, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use shared::{counter, histogram};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::net::TcpListener;

pub const API_PREFIX: &str = "/kapis/tenant.kubesphere.io/v1alpha2";

/// Read-only state shared by all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<dyn MeteringEngine>,
    pub options: Arc<MeteringOptions>,
    pub identity: IdentityConfig,
}

impl ApiState {
    pub fn new(
        engine: Arc<dyn MeteringEngine>,
        options: MeteringOptions,
        identity: IdentityConfig,
    ) -> Self {
        ApiState {
            engine,
            options: Arc::new(options),
            identity,
        }
    }
}

impl FromRef<ApiState> for IdentityConfig {
    fn from_ref(state: &ApiState) -> Self {
        state.identity.clone()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(&format!("{API_PREFIX}/metering"), get(metering_handler))
        .route(
            &format!("{API_PREFIX}/metering/hierarchy"),
            get(hierarchy_handler),
        )
        .route(
            &format!("{API_PREFIX}/namespaces/{{namespace}}/metering/hierarchy"),
            get(namespaced_hierarchy_handler),
        )
        .route(
            &format!("{API_PREFIX}/metering/price"),
            get(price_handler),
        )
        .with_state(state)
}

/// Serves the API until ctrl-c. `ready` is raised once the listener is bound.
pub async fn serve(
    listener: &ListenerConfig,
    state: ApiState,
    ready: Arc<AtomicBool>,
) -> std::io::Result<()> {
    let addr = format!("{}:{}", listener.host, listener.port);
    let tcp_listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "metering api listening");
    ready.store(true, Ordering::Relaxed);

    axum::serve(tcp_listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down metering api");
}

/// Aggregated metering for `user`, as JSON or as a CSV export.
///
/// For exports the window is validated before the engine is consulted, so a
/// bad `start`/`end` never costs an engine call.
pub async fn query_metering(
    engine: &dyn MeteringEngine,
    options: &MeteringOptions,
    user: &Identity,
    query: Query,
) -> Result<Response, ApiError> {
    let window = match query.is_export() {
        true => Some(query.export_window()?),
        false => None,
    };

    let metrics = timed(
        "metering",
        engine.metering(user, &query, &options.billing.price_info),
    )
    .await?;

    match window {
        Some(window) => Ok(export_response(&metrics, &window)),
        None => Ok(Json(metrics).into_response()),
    }
}

/// Per-resource breakdown for `user`. The level is always forced to the leaf
/// level; export is not supported.
pub async fn query_metering_hierarchy(
    engine: &dyn MeteringEngine,
    options: &MeteringOptions,
    user: &Identity,
    mut query: Query,
) -> Result<Response, ApiError> {
    query.level = Some(Level::LEAF);

    let stats = timed(
        "metering_hierarchy",
        engine.metering_hierarchy(user, &query, &options.billing.price_info),
    )
    .await?;

    Ok(Json(stats).into_response())
}

// No identity required here, unlike the metering endpoints.
pub fn price_info(options: &MeteringOptions) -> PriceResponse {
    PriceResponse::from(options)
}

async fn timed<T, F>(call: &'static str, fut: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    let started = Instant::now();
    let result = fut.await;
    histogram!(ENGINE_DURATION, "call" => call).record(started.elapsed().as_secs_f64());
    result
}

type QueryParams = Result<QueryString<RawQuery>, QueryRejection>;

fn respond(endpoint: &'static str, result: Result<Response, ApiError>) -> Response {
    result.unwrap_or_else(|err| {
        let kind = err.kind();
        tracing::warn!(endpoint, kind = kind.as_str(), error = %err, "request rejected");
        counter!(REQUEST_REJECTED, "endpoint" => endpoint, "kind" => kind.as_str()).increment(1);
        err.into_response()
    })
}

fn raw_query(params: QueryParams) -> Result<RawQuery, ApiError> {
    match params {
        Ok(QueryString(raw)) => Ok(raw),
        Err(rejection) => Err(QueryError::InvalidParameters(rejection.body_text()).into()),
    }
}

async fn metering(
    state: &ApiState,
    user: Result<Identity, ApiError>,
    params: QueryParams,
) -> Result<Response, ApiError> {
    let user = user?;
    let query = Query::parse(raw_query(params)?)?;
    query_metering(state.engine.as_ref(), &state.options, &user, query).await
}

async fn hierarchy(
    state: &ApiState,
    user: Result<Identity, ApiError>,
    raw: Result<RawQuery, ApiError>,
) -> Result<Response, ApiError> {
    let user = user?;
    // The requested level is replaced by the leaf level, so it is never parsed.
    let query = Query::parse(RawQuery {
        level: None,
        ..raw?
    })?;
    query_metering_hierarchy(state.engine.as_ref(), &state.options, &user, query).await
}

async fn metering_handler(
    State(state): State<ApiState>,
    user: Result<Identity, ApiError>,
    params: QueryParams,
) -> Response {
    counter!(REQUESTS, "endpoint" => "metering").increment(1);
    respond("metering", metering(&state, user, params).await)
}

async fn hierarchy_handler(
    State(state): State<ApiState>,
    user: Result<Identity, ApiError>,
    params: QueryParams,
) -> Response {
    counter!(REQUESTS, "endpoint" => "metering_hierarchy").increment(1);
    let result = hierarchy(&state, user, raw_query(params)).await;
    respond("metering_hierarchy", result)
}

async fn namespaced_hierarchy_handler(
    State(state): State<ApiState>,
    user: Result<Identity, ApiError>,
    Path(namespace): Path<String>,
    params: QueryParams,
) -> Response {
    counter!(REQUESTS, "endpoint" => "metering_hierarchy").increment(1);
    let raw = raw_query(params).map(|raw| RawQuery {
        namespace: Some(namespace),
        ..raw
    });
    respond("metering_hierarchy", hierarchy(&state, user, raw).await)
}

async fn price_handler(State(state): State<ApiState>) -> Json<PriceResponse> {
    counter!(REQUESTS, "endpoint" => "metering_price").increment(1);
    Json(price_info(&state.options))
}
