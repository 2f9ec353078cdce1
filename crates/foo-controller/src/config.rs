use std::time::Duration;

use clap::Args;

/// Tunables for the Foo control loop
#[derive(Debug, Clone, Args)]
pub struct ControllerConfig {
    /// Required value of the `myapp.my.domain/use-for` label
    #[arg(long, env = "FOO_LABEL_VALUE", default_value = "kubebuilder-demo")]
    pub label_value: String,

    /// Only watch Foos in this namespace
    #[arg(long, env = "FOO_NAMESPACE")]
    pub namespace: Option<String>,

    /// Number of Foos reconciled in parallel
    #[arg(long, env = "FOO_CONCURRENCY", default_value_t = 4)]
    pub concurrency: u16,

    /// Delay before a converged Foo is checked for drift again
    #[arg(long, env = "FOO_RESYNC_SECS", default_value_t = 300)]
    pub resync_secs: u64,

    /// Delay before a failed pass is retried
    #[arg(long, env = "FOO_ERROR_REQUEUE_SECS", default_value_t = 10)]
    pub error_requeue_secs: u64,

    /// Upper bound on a single API call
    #[arg(long, env = "FOO_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl ControllerConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            label_value: "kubebuilder-demo".to_string(),
            namespace: None,
            concurrency: 4,
            resync_secs: 300,
            error_requeue_secs: 10,
            request_timeout_secs: 30,
        }
    }
}
