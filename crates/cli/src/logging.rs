/// Install the stderr log subscriber.
///
/// Library crates log through the `log` facade; `LogTracer` forwards those
/// records into tracing. `RUST_LOG` wins over `default_level`.
pub fn init(default_level: &str) {
    let _ = tracing_log::LogTracer::init();
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
