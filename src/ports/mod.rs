pub mod capture;
pub mod config;
pub mod engine;
pub mod history;
pub mod polish;
pub mod service;

pub use capture::AudioCapture;
pub use config::ConfigStore;
pub use engine::{EngineState, SpeechToText};
pub use history::HistoryStore;
pub use polish::TextPolisher;
pub use service::ServiceController;
