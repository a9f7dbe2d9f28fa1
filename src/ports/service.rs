/// Port for the platform foreground-execution signal.
///
/// While engaged, the platform keeps recording-related work alive when
/// the UI is backgrounded (a foreground service notification on mobile,
/// a no-op on desktop). Both calls are best-effort and infallible; the
/// session manager may call `stop_foreground` more than once.
pub trait ServiceController: Send + Sync {
    fn start_foreground(&self);
    fn stop_foreground(&self);
}
