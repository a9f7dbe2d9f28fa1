use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{
    CloudSttEngine, CloudTextPolisher, CpalAudioCapture, NoopServiceController,
    SqliteHistoryStore, TomlConfigStore,
};
use crate::app::pipeline::TranscriptionPipeline;
use crate::app::session::RecordingSessionManager;
use crate::domain::{AppConfig, DomainError};
use crate::infrastructure::init_logging;
use crate::ports::{ConfigStore, HistoryStore, ServiceController};

/// Application controller that wires the default adapter stack and
/// owns global state.
///
/// Embeddings that need platform-specific pieces (a real foreground
/// service, a different engine) construct `RecordingSessionManager`
/// themselves; this is the batteries-included path.
pub struct AppController {
    config: RwLock<AppConfig>,
    config_store: Arc<TomlConfigStore>,
    session: Arc<RecordingSessionManager>,
    history: Arc<dyn HistoryStore>,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Initialize the application controller.
    /// Sets up configuration, logging, and the full recording stack.
    pub fn new() -> Result<Self, DomainError> {
        let config_store = Arc::new(TomlConfigStore::new()?);
        let config = config_store.load()?;

        let log_guard = init_logging(
            &config_store.logs_dir(),
            &config.logging.level,
            config.logging.file_logging,
        )?;

        info!("Voxnote starting up");

        let service: Arc<dyn ServiceController> = Arc::new(NoopServiceController::new());
        Self::with_service_controller(config, config_store, log_guard, service)
    }

    /// Same wiring, but with a caller-provided foreground controller.
    pub fn with_service_controller(
        config: AppConfig,
        config_store: Arc<TomlConfigStore>,
        log_guard: Option<WorkerGuard>,
        service: Arc<dyn ServiceController>,
    ) -> Result<Self, DomainError> {
        let capture = Arc::new(CpalAudioCapture::with_config(config.audio.clone())?);
        let engine = Arc::new(CloudSttEngine::new(config.cloud.clone())?);
        let polisher = Arc::new(CloudTextPolisher::new(config.cloud.clone())?);
        let history: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::open(
            &config_store.data_dir().join("history.db"),
        )?);

        let pipeline = TranscriptionPipeline::new(engine, polisher, config.session.clone());
        let session = Arc::new(RecordingSessionManager::new(
            capture,
            pipeline,
            Arc::clone(&history),
            service,
        ));

        info!("AppController initialized");

        Ok(Self {
            config: RwLock::new(config),
            config_store,
            session,
            history,
            _log_guard: log_guard,
        })
    }

    /// The recording session manager.
    pub fn session(&self) -> Arc<RecordingSessionManager> {
        Arc::clone(&self.session)
    }

    /// The transcript history store.
    pub fn history(&self) -> Arc<dyn HistoryStore> {
        Arc::clone(&self.history)
    }

    /// Get the current configuration.
    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// Update the configuration.
    ///
    /// The new values are persisted and apply to components constructed
    /// afterwards; the running session keeps the stack it was built
    /// with.
    pub fn update_config(&self, config: AppConfig) -> Result<(), DomainError> {
        self.config_store.save(&config)?;
        *self.config.write() = config;

        info!("Configuration updated");
        Ok(())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> String {
        self.config_store.data_dir().to_string_lossy().to_string()
    }

    /// Get the logs directory path.
    pub fn logs_dir(&self) -> String {
        self.config_store.logs_dir().to_string_lossy().to_string()
    }

    /// Get the config file path.
    pub fn config_path(&self) -> String {
        self.config_store.config_path().to_string_lossy().to_string()
    }
}
