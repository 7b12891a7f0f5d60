//! Utility which is needed to initialize logging.

/// Enables printing logs to the console.
pub fn enable_console_log() {
    let _ = env_logger::Builder::new()
        .filter_level(::log::LevelFilter::Debug)
        .is_test(cfg!(test))
        .try_init();
}

/// Enables printing of the event trace to the console.
pub fn enable_tracing() {
    let _ = env_logger::Builder::new()
        .filter_level(::log::LevelFilter::Trace)
        .try_init();
}
