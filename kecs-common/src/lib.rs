pub mod access_log;
pub mod args;
pub mod cors;
pub mod request_context;
pub mod response;
pub mod security;
pub mod shutdown;

pub use request_context::{RequestContext, RequestContextExtractor};

/// Installs the rustls crypto provider and applies the `KECS_LOG`
/// (via `RUST_LOG`/`EnvFilter`) verbosity convention. Call once from `main`.
pub fn init() {
    let disable_colors = ["1", "true"].contains(
        &std::env::var("DISABLE_COLORS")
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
    );
    owo_colors::set_override(!disable_colors);

    install_rustls_provider();

    let filter = tracing_subscriber::EnvFilter::try_from_env("KECS_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn install_rustls_provider() {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("install aws-lc-rs provider");
}
