//! Composition root: one `AppState` aggregates every component a handler
//! might need, cloned cheaply per request the way the teacher's `App`
//! structs (e.g. `iam::app::App`) bundle a pool + config behind an `Arc`.

use std::sync::Arc;

use kecs_aws::AwsClients;
use kecs_common::args::ServerArgs;
use kecs_elbv2::Elbv2Manager;
use kecs_events::EventBus;
use kecs_k8s::ClientCache;
use kecs_sd::SdManager;
use kecs_store::Store;
use kecs_types::KecsResult;
use tokio_util::sync::CancellationToken;

pub struct Inner {
    pub args: ServerArgs,
    pub store: Store,
    pub client_cache: ClientCache,
    pub elbv2: Elbv2Manager,
    pub sd: SdManager,
    pub aws: AwsClients,
    pub secret_cache: kecs_aws::SecretCache,
    pub events: EventBus,
    pub http: reqwest::Client,
    pub cancel: CancellationToken,
}

#[derive(Clone)]
pub struct AppState(pub Arc<Inner>);

impl std::ops::Deref for AppState {
    type Target = Inner;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AppState {
    pub async fn new(args: ServerArgs, cancel: CancellationToken) -> KecsResult<Self> {
        let store = Store::open(&args.data_dir()).await?;
        let client_cache = ClientCache::new();
        let aws = AwsClients::new(&args.region, &args.localstack_endpoint).await;

        let elbv2 = Elbv2Manager::new(store.elbv2.clone(), client_cache.clone());
        let sd = SdManager::new(store.service_discovery.clone(), client_cache.clone());

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| kecs_types::KecsError::internal(format!("build http client: {e}")))?;

        Ok(AppState(Arc::new(Inner {
            args,
            store,
            client_cache,
            elbv2,
            sd,
            aws,
            secret_cache: kecs_aws::SecretCache::default(),
            events: EventBus::default(),
            http,
            cancel,
        })))
    }

    /// `k8sClusterName` derivation is 1:1 with the ECS cluster name
    /// (spec.md §3); kept here so every handler derives it the same way.
    pub fn k8s_cluster_name(&self, ecs_cluster_name: &str) -> String {
        format!("kecs-{ecs_cluster_name}")
    }
}
