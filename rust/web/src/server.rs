use crate::config::ServerSettings;
use crate::errors::ErrorResponse;
use crate::events::EventBus;
use crate::handlers;
use crate::history::{GameFilter, HistoryStore};
use crate::middleware::with_request_logging;
use crate::scheduler::{FlipBackScheduler, TokioScheduler};
use crate::session::{SessionError, SessionManager};
use crate::settings::{AppSettings, SettingsStore};
use crate::static_handler::StaticHandler;
use pairs_engine::logger::TurnLogger;
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
/// Request bodies are tiny JSON objects.
const MAX_BODY_BYTES: u64 = 16 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
    static_dir: Option<PathBuf>,
    flip_back_delay: Duration,
    turn_log: Option<PathBuf>,
    settings: AppSettings,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let defaults = ServerSettings::default();
        Self {
            host: host.into(),
            port,
            static_dir: None,
            flip_back_delay: defaults.flip_back_delay(),
            turn_log: None,
            settings: defaults.app_settings(),
        }
    }

    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            static_dir: settings.static_dir.clone(),
            flip_back_delay: settings.flip_back_delay(),
            turn_log: settings.turn_log.clone(),
            settings: settings.app_settings(),
        }
    }

    /// Ephemeral port, embedded assets.
    pub fn for_tests() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn with_flip_back_delay(mut self, delay: Duration) -> Self {
        self.flip_back_delay = delay;
        self
    }

    pub fn with_turn_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.turn_log = Some(path.into());
        self
    }

    pub fn with_settings(mut self, settings: AppSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn static_dir(&self) -> Option<&Path> {
        self.static_dir.as_deref()
    }

    pub fn flip_back_delay(&self) -> Duration {
        self.flip_back_delay
    }
}

/// Shared components handed to every route.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: ServerConfig,
    event_bus: Arc<EventBus>,
    sessions: Arc<SessionManager>,
    static_handler: Arc<StaticHandler>,
    history: Arc<HistoryStore>,
    settings: Arc<SettingsStore>,
}

impl AppContext {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_scheduler(config, Arc::new(TokioScheduler))
    }

    /// Like [`AppContext::new`] but flip-backs run on `scheduler`.
    pub fn with_scheduler(
        config: ServerConfig,
        scheduler: Arc<dyn FlipBackScheduler>,
    ) -> Result<Self, ServerError> {
        let settings = Arc::new(
            SettingsStore::with_settings(config.settings.clone())
                .map_err(|err| ServerError::ConfigError(err.to_string()))?,
        );
        let defaults = config.settings.clone();

        let event_bus = Arc::new(EventBus::new());
        let history = Arc::new(HistoryStore::new());
        let mut sessions =
            SessionManager::with_history(Arc::clone(&event_bus), Arc::clone(&history))
                .with_scheduler(scheduler)
                .with_flip_back_delay(config.flip_back_delay)
                .with_session_ttl(Duration::from_secs(defaults.session_timeout_minutes * 60));
        if let Some(path) = &config.turn_log {
            let logger = TurnLogger::create(path).map_err(|err| {
                ServerError::ConfigError(format!(
                    "cannot open turn log {}: {err}",
                    path.display()
                ))
            })?;
            tracing::info!(path = %path.display(), "writing turn log");
            sessions = sessions.with_turn_log(logger);
        }

        let static_handler = Arc::new(match config.static_dir() {
            Some(dir) => StaticHandler::new(dir),
            None => StaticHandler::embedded(),
        });

        Ok(Self {
            config,
            event_bus,
            sessions: Arc::new(sessions),
            static_handler,
            history,
            settings,
        })
    }

    /// Context whose flip-backs never fire on their own.
    pub fn new_for_tests() -> Self {
        Self::with_scheduler(
            ServerConfig::for_tests(),
            Arc::new(crate::scheduler::ManualScheduler::new()),
        )
        .expect("test context")
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        Arc::clone(&self.sessions)
    }

    pub fn static_handler(&self) -> Arc<StaticHandler> {
        Arc::clone(&self.static_handler)
    }

    pub fn history(&self) -> Arc<HistoryStore> {
        Arc::clone(&self.history)
    }

    pub fn settings(&self) -> Arc<SettingsStore> {
        Arc::clone(&self.settings)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Session error: {0}")]
    SessionError(#[from] SessionError),
}

#[derive(Debug, Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let context = AppContext::new(config)?;
        Ok(Self { context })
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let bind_addr = Self::bind_addr(context.config())?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = Self::routes(&context);
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(address = %addr, "web server listening");

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });
        let sweeper = Self::spawn_session_sweeper(context.sessions());

        Ok(ServerHandle::new(addr, shutdown_tx, task, sweeper, context))
    }

    fn spawn_session_sweeper(sessions: Arc<SessionManager>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sessions.cleanup_expired_sessions();
            }
        })
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port()));
        }

        let candidate = format!("{}:{}", host, config.port());
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }

    /// Every route the server answers, with request logging and JSON rejections.
    pub fn routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let routes = Self::health_route(context)
            .or(Self::static_routes(context))
            .unify()
            .or(Self::sse_routes(context))
            .unify()
            .or(Self::session_routes(context))
            .unify()
            .or(Self::history_routes(context))
            .unify()
            .or(Self::settings_routes(context))
            .unify();

        with_request_logging(routes)
            .recover(handle_rejection)
            .unify()
            .boxed()
    }

    fn health_route(context: &AppContext) -> BoxedFilter<(Response,)> {
        warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .and(Self::with_session_manager(context.sessions()))
            .map(|sessions: Arc<SessionManager>| {
                handlers::health(sessions.active_sessions().len()).into_response()
            })
            .boxed()
    }

    fn static_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let handler = context.static_handler();

        let index = warp::path::end()
            .and(warp::get())
            .and(Self::with_static_handler(handler.clone()))
            .and_then(|handler: Arc<StaticHandler>| async move {
                let response = handler
                    .index()
                    .await
                    .unwrap_or_else(|err| handler.error_response(err));
                Ok::<_, Infallible>(response)
            });

        let assets = warp::path("static")
            .and(warp::path::tail())
            .and(warp::get())
            .and(Self::with_static_handler(handler))
            .and_then(
                |tail: warp::path::Tail, handler: Arc<StaticHandler>| async move {
                    let response = handler
                        .asset(tail.as_str())
                        .await
                        .unwrap_or_else(|err| handler.error_response(err));
                    Ok::<_, Infallible>(response)
                },
            );

        index.or(assets).unify().boxed()
    }

    fn session_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let sessions = context.sessions();

        let create = warp::path!("api" / "sessions")
            .and(warp::post())
            .and(Self::with_session_manager(sessions.clone()))
            .and(Self::with_settings(context.settings()))
            .and(Self::json_body::<handlers::CreateSessionRequest>())
            .and_then(
                |sessions: Arc<SessionManager>,
                 settings: Arc<SettingsStore>,
                 request: handlers::CreateSessionRequest| async move {
                    let response = handlers::create_session(sessions, settings, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let info = warp::path!("api" / "sessions" / String)
            .and(warp::get())
            .and(Self::with_session_manager(sessions.clone()))
            .and_then(
                |session_id: String, sessions: Arc<SessionManager>| async move {
                    let response = handlers::get_session(sessions, session_id).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let state = warp::path!("api" / "sessions" / String / "state")
            .and(warp::get())
            .and(Self::with_session_manager(sessions.clone()))
            .and_then(
                |session_id: String, sessions: Arc<SessionManager>| async move {
                    let response = handlers::get_session_state(sessions, session_id).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let flip = warp::path!("api" / "sessions" / String / "flip")
            .and(warp::post())
            .and(Self::with_session_manager(sessions.clone()))
            .and(Self::json_body::<handlers::FlipRequest>())
            .and_then(
                |session_id: String,
                 sessions: Arc<SessionManager>,
                 request: handlers::FlipRequest| async move {
                    let response = handlers::flip_card(sessions, session_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let start = warp::path!("api" / "sessions" / String / "start")
            .and(warp::post())
            .and(Self::with_session_manager(sessions.clone()))
            .and_then(
                |session_id: String, sessions: Arc<SessionManager>| async move {
                    let response = handlers::start_game(sessions, session_id).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let reset = warp::path!("api" / "sessions" / String / "reset")
            .and(warp::post())
            .and(Self::with_session_manager(sessions.clone()))
            .and(Self::json_body::<handlers::ResetRequest>())
            .and_then(
                |session_id: String,
                 sessions: Arc<SessionManager>,
                 request: handlers::ResetRequest| async move {
                    let response = handlers::reset_game(sessions, session_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let delete = warp::path!("api" / "sessions" / String)
            .and(warp::delete())
            .and(Self::with_session_manager(sessions))
            .and_then(
                |session_id: String, sessions: Arc<SessionManager>| async move {
                    let response = handlers::delete_session(sessions, session_id).await;
                    Ok::<_, Infallible>(response)
                },
            );

        create
            .or(state)
            .unify()
            .or(flip)
            .unify()
            .or(start)
            .unify()
            .or(reset)
            .unify()
            .or(info)
            .unify()
            .or(delete)
            .unify()
            .boxed()
    }

    fn sse_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        warp::path!("api" / "sessions" / String / "events")
            .and(warp::get())
            .and(Self::with_session_manager(context.sessions()))
            .and(Self::with_event_bus(context.event_bus()))
            .and_then(
                |session_id: String,
                 sessions: Arc<SessionManager>,
                 event_bus: Arc<EventBus>| async move {
                    let response =
                        handlers::sse::stream_events(session_id, sessions, event_bus).await;
                    Ok::<_, Infallible>(response)
                },
            )
            .boxed()
    }

    fn history_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let history = context.history();

        let recent = warp::path!("api" / "history")
            .and(warp::get())
            .and(warp::query::<handlers::history::GetHistoryQuery>())
            .and(Self::with_history_store(history.clone()))
            .and_then(
                |query: handlers::history::GetHistoryQuery, history: Arc<HistoryStore>| async move {
                    Ok::<_, Infallible>(handlers::get_recent_games(history, query).await)
                },
            );

        let stats = warp::path!("api" / "history" / "stats")
            .and(warp::get())
            .and(Self::with_history_store(history.clone()))
            .and_then(|history: Arc<HistoryStore>| async move {
                Ok::<_, Infallible>(handlers::get_statistics(history).await)
            });

        let filter = warp::path!("api" / "history" / "filter")
            .and(warp::post())
            .and(Self::json_body::<GameFilter>())
            .and(Self::with_history_store(history.clone()))
            .and_then(|filter: GameFilter, history: Arc<HistoryStore>| async move {
                Ok::<_, Infallible>(handlers::filter_games(history, filter).await)
            });

        let by_id = warp::path!("api" / "history" / String)
            .and(warp::get())
            .and(Self::with_history_store(history))
            .and_then(|game_id: String, history: Arc<HistoryStore>| async move {
                Ok::<_, Infallible>(handlers::get_game_by_id(history, game_id).await)
            });

        recent
            .or(stats)
            .unify()
            .or(filter)
            .unify()
            .or(by_id)
            .unify()
            .boxed()
    }

    fn settings_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let store = context.settings();
        let sessions = context.sessions();

        let get = warp::path!("api" / "settings")
            .and(warp::get())
            .and(Self::with_settings(store.clone()))
            .and_then(|store: Arc<SettingsStore>| async move {
                Ok::<_, Infallible>(handlers::get_settings(store).await)
            });

        let put = warp::path!("api" / "settings")
            .and(warp::put())
            .and(Self::with_settings(store.clone()))
            .and(Self::with_session_manager(sessions.clone()))
            .and(Self::json_body::<handlers::UpdateSettingsRequest>())
            .and_then(
                |store: Arc<SettingsStore>,
                 sessions: Arc<SessionManager>,
                 request: handlers::UpdateSettingsRequest| async move {
                    Ok::<_, Infallible>(handlers::update_settings(store, sessions, request).await)
                },
            );

        let patch = warp::path!("api" / "settings")
            .and(warp::patch())
            .and(Self::with_settings(store.clone()))
            .and(Self::with_session_manager(sessions.clone()))
            .and(Self::json_body::<handlers::UpdateFieldRequest>())
            .and_then(
                |store: Arc<SettingsStore>,
                 sessions: Arc<SessionManager>,
                 request: handlers::UpdateFieldRequest| async move {
                    Ok::<_, Infallible>(handlers::update_field(store, sessions, request).await)
                },
            );

        let reset = warp::path!("api" / "settings" / "reset")
            .and(warp::post())
            .and(Self::with_settings(store))
            .and(Self::with_session_manager(sessions))
            .and_then(
                |store: Arc<SettingsStore>, sessions: Arc<SessionManager>| async move {
                    Ok::<_, Infallible>(handlers::reset_settings(store, sessions).await)
                },
            );

        get.or(put)
            .unify()
            .or(patch)
            .unify()
            .or(reset)
            .unify()
            .boxed()
    }

    fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
    where
        T: serde::de::DeserializeOwned + Send,
    {
        warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
    }

    fn with_static_handler(
        handler: Arc<StaticHandler>,
    ) -> impl Filter<Extract = (Arc<StaticHandler>,), Error = Infallible> + Clone {
        warp::any().map(move || handler.clone())
    }

    fn with_session_manager(
        sessions: Arc<SessionManager>,
    ) -> impl Filter<Extract = (Arc<SessionManager>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&sessions))
    }

    fn with_event_bus(
        event_bus: Arc<EventBus>,
    ) -> impl Filter<Extract = (Arc<EventBus>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&event_bus))
    }

    fn with_history_store(
        history: Arc<HistoryStore>,
    ) -> impl Filter<Extract = (Arc<HistoryStore>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&history))
    }

    fn with_settings(
        settings: Arc<SettingsStore>,
    ) -> impl Filter<Extract = (Arc<SettingsStore>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&settings))
    }
}

/// Turns warp's rejections into the same JSON error body the handlers use.
async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, code, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found", "no route matches".to_string())
    } else if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "bad_request", err.to_string())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            "request body too large".to_string(),
        )
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "length_required",
            "request body needs a content length".to_string(),
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "method not allowed".to_string(),
        )
    } else {
        tracing::error!(rejection = ?rejection, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "internal server error".to_string(),
        )
    };
    tracing::debug!(status = status.as_u16(), error = code, "request rejected");
    Ok(ErrorResponse::new(code, message).into_response(status))
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    sweeper: Option<JoinHandle<()>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        sweeper: JoinHandle<()>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            sweeper: Some(sweeper),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        tracing::info!(address = %self.addr, "web server stopped");
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
