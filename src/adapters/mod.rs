pub mod capture_cpal;
pub mod config_store;
pub mod engine_cloud;
pub mod history_sqlite;
pub mod polish_cloud;
pub mod service_noop;

pub use capture_cpal::CpalAudioCapture;
pub use config_store::TomlConfigStore;
pub use engine_cloud::CloudSttEngine;
pub use history_sqlite::SqliteHistoryStore;
pub use polish_cloud::CloudTextPolisher;
pub use service_noop::NoopServiceController;
