use clap::Parser;

/// Flags common to the KECS control-plane binary: k8s target, LocalStack
/// endpoint, instance identity, and the GC knobs left open by the spec.
#[derive(Parser, Debug, Clone)]
pub struct ServerArgs {
    /// Port the AWS-wire-protocol front door listens on.
    #[arg(long, env = "KECS_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Named kubeconfig context to use; empty string means "current context".
    #[arg(long, env = "KECS_KUBE_CONTEXT", default_value = "")]
    pub kube_context: String,

    /// Base URL of the colocated LocalStack instance.
    #[arg(long, env = "KECS_LOCALSTACK_ENDPOINT", default_value = "http://localhost:4566")]
    pub localstack_endpoint: String,

    /// Region embedded in minted ARNs and passed to AWS SDK clients.
    #[arg(long, env = "KECS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Account id embedded in minted ARNs.
    #[arg(long, env = "KECS_ACCOUNT_ID", default_value = "000000000000")]
    pub account_id: String,

    /// Instance name; persisted state lives under `<home>/.kecs/instances/<name>/`.
    #[arg(long, env = "KECS_INSTANCE_NAME", default_value = "default")]
    pub instance_name: String,

    /// Overrides `$HOME` for locating the instance data directory (mainly for tests).
    #[arg(long, env = "KECS_HOME")]
    pub home: Option<String>,

    /// Skip deleting the k8s namespaces/objects belonging to registered
    /// clusters when the process shuts down.
    #[arg(long, env = "KECS_KEEP_CLUSTERS_ON_SHUTDOWN", default_value_t = false)]
    pub keep_clusters_on_shutdown: bool,

    /// Interval between background GC sweeps.
    #[arg(long, env = "KECS_GC_INTERVAL_SECS", default_value_t = 300)]
    pub gc_interval_secs: u64,

    /// How long a STOPPED task is kept before GC deletes it.
    #[arg(long, env = "KECS_TASK_RETENTION_SECS", default_value_t = 3600)]
    pub task_retention_secs: u64,

    /// Inbound request deadline; `router.rs::dispatch` returns 504 once it
    /// elapses instead of leaving the caller hanging.
    #[arg(long, env = "KECS_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Max time startup recovery waits for the Kubernetes API to become
    /// reachable before giving up on a cluster (`reconciler/startup.rs`).
    #[arg(long, env = "KECS_CLUSTER_READY_TIMEOUT_SECS", default_value_t = 60)]
    pub cluster_ready_timeout_secs: u64,

    /// Max time to wait for LocalStack to become reachable at startup.
    #[arg(long, env = "KECS_LOCALSTACK_READY_TIMEOUT_SECS", default_value_t = 120)]
    pub localstack_ready_timeout_secs: u64,
}

impl ServerArgs {
    pub fn home_dir(&self) -> std::path::PathBuf {
        match &self.home {
            Some(h) => std::path::PathBuf::from(h),
            None => std::env::var("HOME")
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|_| std::path::PathBuf::from(".")),
        }
    }

    pub fn instance_dir(&self) -> std::path::PathBuf {
        self.home_dir()
            .join(".kecs")
            .join("instances")
            .join(&self.instance_name)
    }

    pub fn data_dir(&self) -> std::path::PathBuf {
        self.instance_dir().join("data")
    }
}
