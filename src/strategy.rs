//! Per-invocation strategy selection.
//!
//! [`select_strategy`] decides, once per conversion, whether to run
//! *oneshot* (create a browser, render once, destroy with process-level
//! certainty) or *pooled* (borrow from the managed pool). It is a pure
//! function of the environment and the invocation's signals — stateless
//! and idempotent — so the same inputs always pick the same strategy.
//!
//! Decision order:
//!
//! 1. An explicit override (env var or config) wins.
//! 2. Batch-class invocations go to the pool.
//! 3. CLI single-shot runs, test environments, container/orchestrator
//!    hosts and serverless platforms go oneshot.
//! 4. Everything else (a resident server/API context) goes to the pool.

use crate::config::Environment;

/// How a conversion obtains its browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Create, render once, destroy.
    Oneshot,
    /// Borrow from the managed pool.
    Pool,
}

impl Strategy {
    /// Parse the `PRINTEER_BROWSER_STRATEGY` grammar.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "oneshot" => Some(Strategy::Oneshot),
            "pool" => Some(Strategy::Pool),
            _ => None,
        }
    }
}

/// What the current invocation looks like.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvocationSignals {
    /// URLs requested in this invocation.
    pub url_count: usize,
    /// A batch file was supplied.
    pub has_batch_file: bool,
    /// Explicit batch markers: a `batch` subcommand, `--concurrency`,
    /// `--continue-on-error`.
    pub explicit_batch_flags: bool,
    /// A plain CLI single-shot invocation.
    pub cli_single_shot: bool,
    /// Running inside a resident server/API process.
    pub server_context: bool,
}

impl InvocationSignals {
    /// Signals for one CLI conversion.
    pub fn single_shot() -> Self {
        Self {
            url_count: 1,
            cli_single_shot: true,
            ..Self::default()
        }
    }

    /// Signals for a batch run over `url_count` jobs.
    pub fn batch(url_count: usize) -> Self {
        Self {
            url_count,
            explicit_batch_flags: true,
            ..Self::default()
        }
    }

    /// Signals for an embedded server context.
    pub fn server() -> Self {
        Self {
            url_count: 1,
            server_context: true,
            ..Self::default()
        }
    }
}

/// Host-derived signals, split out so selection stays a pure function.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSignals {
    /// `PRINTEER_BROWSER_STRATEGY` or a config override.
    pub strategy_override: Option<Strategy>,
    /// `PRINTEER_BATCH_MODE=1`.
    pub batch_mode_env: bool,
    /// Container/orchestrator markers present.
    pub container: bool,
    /// Serverless platform markers present.
    pub serverless: bool,
}

impl HostSignals {
    /// Read the host signals from the process environment.
    pub fn from_env() -> Self {
        Self {
            strategy_override: std::env::var("PRINTEER_BROWSER_STRATEGY")
                .ok()
                .and_then(|v| Strategy::parse(&v)),
            batch_mode_env: matches!(
                std::env::var("PRINTEER_BATCH_MODE").ok().as_deref(),
                Some("1") | Some("true")
            ),
            container: std::path::Path::new("/.dockerenv").exists()
                || std::env::var_os("KUBERNETES_SERVICE_HOST").is_some(),
            serverless: ["AWS_LAMBDA_FUNCTION_NAME", "FUNCTIONS_WORKER_RUNTIME", "K_SERVICE", "VERCEL"]
                .iter()
                .any(|name| std::env::var_os(name).is_some()),
        }
    }
}

/// Pick the strategy for one invocation.
pub fn select_strategy(
    environment: Environment,
    invocation: &InvocationSignals,
    host: &HostSignals,
) -> Strategy {
    if let Some(strategy) = host.strategy_override {
        return strategy;
    }

    let batch_class = invocation.url_count > 1
        || invocation.has_batch_file
        || invocation.explicit_batch_flags
        || host.batch_mode_env;
    if batch_class {
        return Strategy::Pool;
    }

    if invocation.cli_single_shot
        || environment == Environment::Test
        || host.container
        || host.serverless
    {
        return Strategy::Oneshot;
    }

    // A resident server context amortizes browser startup across calls.
    Strategy::Pool
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies an explicit override beats every other signal.
    #[test]
    fn test_override_wins() {
        let host = HostSignals {
            strategy_override: Some(Strategy::Oneshot),
            batch_mode_env: true, // would otherwise force Pool
            ..HostSignals::default()
        };
        assert_eq!(
            select_strategy(Environment::Production, &InvocationSignals::batch(10), &host),
            Strategy::Oneshot
        );
    }

    /// Verifies every batch-class marker selects the pool.
    #[test]
    fn test_batch_class_pools() {
        let host = HostSignals::default();
        for invocation in [
            InvocationSignals::batch(10),
            InvocationSignals {
                url_count: 3,
                ..InvocationSignals::default()
            },
            InvocationSignals {
                url_count: 1,
                has_batch_file: true,
                ..InvocationSignals::default()
            },
        ] {
            assert_eq!(
                select_strategy(Environment::Development, &invocation, &host),
                Strategy::Pool
            );
        }

        let env_batch = HostSignals {
            batch_mode_env: true,
            ..HostSignals::default()
        };
        assert_eq!(
            select_strategy(
                Environment::Development,
                &InvocationSignals::single_shot(),
                &env_batch
            ),
            Strategy::Pool
        );
    }

    /// Verifies oneshot conditions: CLI single shot, test env,
    /// container, serverless.
    #[test]
    fn test_oneshot_conditions() {
        let host = HostSignals::default();
        assert_eq!(
            select_strategy(Environment::Production, &InvocationSignals::single_shot(), &host),
            Strategy::Oneshot
        );
        assert_eq!(
            select_strategy(Environment::Test, &InvocationSignals::server(), &host),
            Strategy::Oneshot
        );

        let container = HostSignals {
            container: true,
            ..HostSignals::default()
        };
        assert_eq!(
            select_strategy(Environment::Production, &InvocationSignals::server(), &container),
            Strategy::Oneshot
        );

        let serverless = HostSignals {
            serverless: true,
            ..HostSignals::default()
        };
        assert_eq!(
            select_strategy(Environment::Production, &InvocationSignals::server(), &serverless),
            Strategy::Oneshot
        );
    }

    /// Verifies a plain server context defaults to the pool.
    #[test]
    fn test_server_defaults_to_pool() {
        assert_eq!(
            select_strategy(
                Environment::Production,
                &InvocationSignals::server(),
                &HostSignals::default()
            ),
            Strategy::Pool
        );
    }

    /// Verifies idempotence: repeated calls agree.
    #[test]
    fn test_idempotent() {
        let invocation = InvocationSignals::server();
        let host = HostSignals::default();
        let first = select_strategy(Environment::Development, &invocation, &host);
        for _ in 0..5 {
            assert_eq!(
                select_strategy(Environment::Development, &invocation, &host),
                first
            );
        }
    }
}
