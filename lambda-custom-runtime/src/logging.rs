use crate::config::RUNTIME_API_VAR;
use std::env::var;
use tracing_subscriber::EnvFilter;

/// Initializes the tracing from RUST_LOG env var if present or sets minimal logging:
/// - INFO for the runtime and the binary it runs in
/// - ERROR for everything else
///
/// Colour codes are only used outside Lambda, they are noise in CloudWatch.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter())))
        .with_ansi(var(RUNTIME_API_VAR).is_err())
        .with_target(false)
        .without_time()
        .compact()
        .init();
}

/// E.g. `error,lambda_custom_runtime=info,hello_lambda=info`
fn default_filter() -> String {
    let mut filter = String::from("error,lambda_custom_runtime=info");

    // this replace is needed because tracing uses target names with underscores, e.g. `hello_lambda`
    if let Some(binary_name) = std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|name| name.to_string_lossy().replace('-', "_")))
    {
        filter.push(',');
        filter.push_str(&binary_name);
        filter.push_str("=info");
    }

    filter
}
