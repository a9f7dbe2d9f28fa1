use tracing::debug;

use crate::ports::ServiceController;

/// No-op foreground controller for desktop embeddings.
///
/// Desktop platforms have no foreground-service notification; mobile
/// shells supply their own `ServiceController` implementation when
/// wiring the session manager.
#[derive(Debug, Default)]
pub struct NoopServiceController;

impl NoopServiceController {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceController for NoopServiceController {
    fn start_foreground(&self) {
        debug!("Foreground signal requested (no-op on this platform)");
    }

    fn stop_foreground(&self) {
        debug!("Foreground signal released (no-op on this platform)");
    }
}
