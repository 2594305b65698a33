use tracing_subscriber::EnvFilter;

use crate::config::General;

/// Install the global subscriber. `RUST_LOG` wins over `general.log_level`.
pub fn init(general: &General) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&general.log_level));

    if general.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }
}
