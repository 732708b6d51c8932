use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Install structured logging for an embedding process.
///
/// `RUST_LOG` wins over `default_filter` when set. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), SetGlobalDefaultError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true));

    tracing::subscriber::set_global_default(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_only_once() {
        let _ = init_tracing("fakestore=trace");
        assert!(init_tracing("fakestore=trace").is_err());
        tracing::debug!("subscriber installed");
    }
}
