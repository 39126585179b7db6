//! Tracing setup for programs using api-crawler

use tracing::Level;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

/// Install a stderr subscriber at `level`
///
/// `RUST_LOG` directives take precedence when set. HTTP and browser internals
/// stay at `warn` so adapter logs remain readable. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(level: Level) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hyper=warn,reqwest=warn,chromiumoxide=warn,html5ever=warn,{level}"
        ))
    });

    registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        let _ = init_tracing(Level::DEBUG);

        assert!(init_tracing(Level::DEBUG).is_err());
    }
}
