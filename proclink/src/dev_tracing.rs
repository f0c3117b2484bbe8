//! Opt-in log output for workers, tests and the demo binary.

/// Development helper: initialize tracing subscriber when `RUST_LOG` is set.
///
/// Workers and tests can call `proclink::dev_tracing::init_tracing()` to see
/// the `[PUB]` / `[SUB]` / `[IO]` / `[SUPERVISOR]` logs. This is a no-op when
/// `RUST_LOG` is not set or when a global subscriber is already installed.
pub fn init_tracing() {
    use std::env;

    if env::var("RUST_LOG").is_ok() {
        // Workers share the terminal with the supervisor; tag lines with the thread.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
