use env_logger::Env;

/// Initialise logging from `RUST_LOG`, `info` when unset. Safe to call
/// more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
