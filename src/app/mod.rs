pub mod controller;
pub mod pipeline;
pub mod session;

pub use controller::AppController;
pub use pipeline::TranscriptionPipeline;
pub use session::RecordingSessionManager;
