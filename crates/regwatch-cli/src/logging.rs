//! Log output on stderr.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CRATES: [&str; 4] = ["regwatch", "regwatch_check", "regwatch_core", "regwatch_registry"];

/// Returns the directives used when `RUST_LOG` is unset.
pub fn default_directives(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    CRATES
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs the global subscriber. Stdout is left to the response.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_info() {
        let directives = default_directives(false);
        assert!(directives.starts_with("regwatch=info,"));
        assert!(directives.contains("regwatch_registry=info"));
        assert!(!directives.contains("debug"));
    }

    #[test]
    fn test_default_directives_debug() {
        assert!(default_directives(true).split(',').all(|d| d.ends_with("=debug")));
    }

    #[test]
    fn test_directives_parse() {
        assert!(EnvFilter::try_new(default_directives(true)).is_ok());
    }
}
