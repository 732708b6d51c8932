use clap::Parser;

/// Engine configuration, parseable from the command line or environment of
/// whatever harness embeds the store.
#[derive(Debug, Clone, Parser)]
#[command(name = "fakestore")]
pub struct Config {
    /// Number of logical databases a registry hands out (indices 0..N)
    #[arg(long, env = "FAKESTORE_DATABASES", default_value_t = 16)]
    pub databases: usize,

    /// Attempts made by `Client::transaction` before giving up on WATCH conflicts
    #[arg(long, env = "FAKESTORE_TRANSACTION_ATTEMPTS", default_value_t = 5)]
    pub transaction_attempts: usize,

    /// Default tracing filter used when RUST_LOG is unset
    #[arg(long, env = "FAKESTORE_LOG", default_value = "info,fakestore=debug")]
    pub log_filter: String,
}

impl Config {
    pub fn from_args() -> Self {
        Self::parse()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            databases: 16,
            transaction_attempts: 5,
            log_filter: "info,fakestore=debug".into(),
        }
    }
}
