use crate::Result;

/// Initialize tracing for tgadd.
///
/// Logs go to stderr so stdout stays free for reports. Override the filter
/// with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    // Default: info everywhere, including our crates.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "info,tgadd=info,tgadd_core=info,tgadd_bridge=info,{}=info",
            service_name.replace('-', "_")
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| crate::Error::External(format!("logging init failed: {e}")))?;

    Ok(())
}
