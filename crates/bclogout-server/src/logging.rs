//! Logging initialization
//!
//! `RUST_LOG` takes precedence over the configured level. Each `-v` on the
//! command line raises the configured level by one step.

use std::io;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;
use crate::error::ServerError;

impl LoggingConfig {
    /// Install the global tracing subscriber
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Logging`] if a global subscriber is already set.
    pub fn init(&self, verbosity: u8) -> Result<(), ServerError> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.effective_level(verbosity)));
        let subscriber = tracing_subscriber::registry().with(filter);

        let result = if self.json {
            subscriber
                .with(fmt::layer().json().with_writer(io::stderr))
                .try_init()
        } else {
            subscriber
                .with(fmt::layer().with_writer(io::stderr))
                .try_init()
        };
        result.map_err(|e| ServerError::Logging(e.to_string()))
    }

    /// The filter directive after applying `verbosity`
    ///
    /// Every level in the directive moves `verbosity` steps towards `trace`.
    /// Directives without a recognizable level are kept as written.
    pub fn effective_level(&self, verbosity: u8) -> String {
        if verbosity == 0 {
            return self.level.clone();
        }

        self.level
            .split(',')
            .map(|directive| raise_directive(directive.trim(), verbosity))
            .collect::<Vec<_>>()
            .join(",")
    }
}

const LEVELS: [LevelFilter; 6] = [
    LevelFilter::OFF,
    LevelFilter::ERROR,
    LevelFilter::WARN,
    LevelFilter::INFO,
    LevelFilter::DEBUG,
    LevelFilter::TRACE,
];

fn raise_directive(directive: &str, verbosity: u8) -> String {
    let (target, level) = match directive.rsplit_once('=') {
        Some((target, level)) => (Some(target), level),
        None => (None, directive),
    };

    let Some(position) = level
        .parse::<LevelFilter>()
        .ok()
        .and_then(|parsed| LEVELS.iter().position(|l| *l == parsed))
    else {
        return directive.to_string();
    };
    let raised = LEVELS[(position + usize::from(verbosity)).min(LEVELS.len() - 1)];
    let raised = raised.to_string().to_lowercase();

    match target {
        Some(target) => format!("{target}={raised}"),
        None => raised,
    }
}
