use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use signalwatch_core::config::{PollSettings, Settings};
use signalwatch_core::domain::account::TrackedAccount;
use signalwatch_core::domain::stats::CycleStats;
use signalwatch_core::poll::PollOrchestrator;
use signalwatch_core::schedule::{CycleRunner, Scheduler};
use signalwatch_core::storage::{PgStore, SignalStore};
use signalwatch_core::tracking::{self, TrackError};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let store = match connect_store(&settings).await {
        Ok(store) => Some(store),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "store unavailable; starting API in degraded mode");
            None
        }
    };

    let runner = match &store {
        Some(store) => match build_runner(&settings, Arc::clone(store)) {
            Ok(runner) => Some(runner),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "poll runtime not configured; polling disabled");
                None
            }
        },
        None => None,
    };

    let scheduler = runner.as_ref().map(|runner| {
        let interval = runner.orchestrator().settings().interval;
        Scheduler::start(Arc::clone(runner), interval)
    });

    let app = router(AppState { store, runner });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    Ok(())
}

async fn connect_store(settings: &Settings) -> anyhow::Result<Arc<dyn SignalStore>> {
    let store = PgStore::connect(settings.require_database_url()?).await?;
    signalwatch_core::storage::migrate(store.pool()).await?;
    Ok(Arc::new(store))
}

fn build_runner(settings: &Settings, store: Arc<dyn SignalStore>) -> anyhow::Result<Arc<CycleRunner>> {
    let poll = PollSettings::from_env()?;
    let orchestrator = PollOrchestrator::from_settings(settings, poll, store)?;
    Ok(Arc::new(CycleRunner::new(orchestrator)))
}

fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/tracks", post(create_track).get(list_tracks))
        .route("/tracks/:handle", delete(delete_track))
        .route("/health", get(health))
        .route("/manual-poll", post(manual_poll));

    Router::new()
        .route("/", get(banner))
        .route("/healthz", get(healthz))
        .nest("/api/v1", v1)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Clone)]
struct AppState {
    store: Option<Arc<dyn SignalStore>>,
    runner: Option<Arc<CycleRunner>>,
}

impl AppState {
    fn store(&self) -> Result<&dyn SignalStore, ApiError> {
        self.store
            .as_deref()
            .ok_or_else(|| api_error(StatusCode::SERVICE_UNAVAILABLE, "store unavailable"))
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    message: String,
}

type ApiError = (StatusCode, Json<ApiMessage>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ApiMessage {
            message: message.into(),
        }),
    )
}

fn internal(err: impl Into<anyhow::Error>) -> ApiError {
    let err = err.into();
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

async fn banner() -> &'static str {
    "signalwatch api"
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    store: bool,
    polling: bool,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let store = state.store.is_some();
    let polling = state.runner.is_some();
    Json(Health {
        status: if store && polling { "ok" } else { "degraded" },
        store,
        polling,
    })
}

#[derive(Debug, Deserialize)]
struct CreateTrack {
    handle: String,
    #[serde(default)]
    user_id: Option<String>,
}

async fn create_track(
    State(state): State<AppState>,
    Json(body): Json<CreateTrack>,
) -> Result<(StatusCode, Json<TrackedAccount>), ApiError> {
    match tracking::track(state.store()?, &body.handle, body.user_id.as_deref()).await {
        Ok(account) => Ok((StatusCode::CREATED, Json(account))),
        Err(err @ TrackError::InvalidHandle(_)) => {
            Err(api_error(StatusCode::BAD_REQUEST, err.to_string()))
        }
        Err(err @ TrackError::AlreadyTracked(_)) => {
            Err(api_error(StatusCode::CONFLICT, err.to_string()))
        }
        Err(TrackError::Store(err)) => Err(internal(err)),
    }
}

async fn list_tracks(State(state): State<AppState>) -> Result<Json<Vec<TrackedAccount>>, ApiError> {
    let accounts = tracking::list(state.store()?).await.map_err(internal)?;
    Ok(Json(accounts))
}

async fn delete_track(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<ApiMessage>, ApiError> {
    let (handle, removed) = tracking::untrack(state.store()?, &handle)
        .await
        .map_err(internal)?;
    if !removed {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("@{handle} is not tracked"),
        ));
    }
    Ok(Json(ApiMessage {
        message: format!("Stopped tracking @{handle}"),
    }))
}

async fn manual_poll(State(state): State<AppState>) -> Result<Json<CycleStats>, ApiError> {
    let Some(runner) = state.runner.as_ref() else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "poll runtime not configured",
        ));
    };
    Ok(Json(runner.run_once().await))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
