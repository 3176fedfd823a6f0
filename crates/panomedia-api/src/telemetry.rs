use panomedia_core::Config;
use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_FILTER: &str = "panomedia=debug,tower_http=debug";

/// Installs the global subscriber. Production environments log JSON lines;
/// `LOG_FORMAT` (`json` or `compact`) overrides that and `RUST_LOG` overrides the
/// filter.
pub fn init_telemetry(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let json = json_output(
        std::env::var("LOG_FORMAT").ok().as_deref(),
        config.is_production(),
    );

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .init();
    } else {
        let console_fmt = tracing_subscriber::fmt::layer().event_format(
            Format::default()
                .compact()
                .with_target(false)
                .without_time(),
        );
        tracing_subscriber::registry()
            .with(filter)
            .with(console_fmt)
            .init();
    }

    tracing::info!(json, environment = %config.environment, "Tracing initialized");
}

fn json_output(log_format: Option<&str>, production: bool) -> bool {
    match log_format {
        Some(format) if !format.is_empty() => format.eq_ignore_ascii_case("json"),
        _ => production,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_defaults_to_json() {
        assert!(json_output(None, true));
        assert!(!json_output(None, false));
        assert!(json_output(Some(""), true));
    }

    #[test]
    fn log_format_overrides_environment() {
        assert!(json_output(Some("JSON"), false));
        assert!(!json_output(Some("compact"), true));
    }
}
