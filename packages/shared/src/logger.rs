//! Logging setup utilities for the Switchboard binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// Both the Switchboard crates and the binary itself log at `default_log_level`.
/// The filter can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "switchboard_server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use switchboard_shared::logger::setup_logger;
///
/// setup_logger("switchboard_server", "info");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn default_filter(binary_name: &str, default_log_level: &str) -> String {
    let binary = binary_name.replace('-', "_");
    format!(
        "switchboard_shared={level},switchboard_server={level},switchboard_client={level},{binary}={level},tower_http=info",
        level = default_log_level,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_covers_all_crates() {
        // テスト項目: デフォルトのフィルタが全クレートとバイナリを同じレベルで含む
        // given (前提条件):
        let binary_name = "switchboard-server";

        // when (操作):
        let filter = default_filter(binary_name, "debug");

        // then (期待する結果):
        assert!(filter.contains("switchboard_server=debug"));
        assert!(filter.contains("switchboard_client=debug"));
        assert!(filter.contains("switchboard_shared=debug"));
        assert!(filter.ends_with("tower_http=info"));
    }
}
