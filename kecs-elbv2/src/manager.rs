//! The in-memory ELBv2 emulator (spec.md §4.4): a coarse `RwLock`-guarded
//! working set backed by [`Elbv2Store`] for durability, with per-listener
//! write serialization so a rule change never interleaves with another on
//! the same listener (spec.md §5).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use kecs_k8s::ingressroute::{apply_ingress_route, build_ingress_route, delete_ingress_route};
use kecs_k8s::ClientCache;
use kecs_store::Elbv2Store;
use kecs_translate::arn;
use kecs_types::{
    Action, KecsError, KecsResult, Listener, LoadBalancer, LoadBalancerState, LoadBalancerType,
    Rule, RuleCondition, Scheme, TargetGroup, TargetHealth, TargetHealthState,
};
use tokio::sync::Mutex;

use crate::conflict::find_conflict;
use crate::health::HealthScheduler;
use crate::priority::find_priority_for_conditions;
use crate::route::rule_to_route;

fn entry_point_for(protocol: &str) -> String {
    if protocol.eq_ignore_ascii_case("https") {
        "websecure".to_string()
    } else {
        "web".to_string()
    }
}

/// The three k8s coordinates every listener/rule mutation needs: which
/// cluster to reconnect (`ClientCache` is keyed by `k8sClusterName`), which
/// kubeconfig context backs it, and which namespace the owning ECS cluster
/// maps onto (spec.md §4.1/§4.3).
pub struct K8sTarget<'a> {
    pub cluster_name: &'a str,
    pub kube_context: &'a str,
    pub namespace: &'a str,
}

pub struct Elbv2Manager {
    store: Elbv2Store,
    client_cache: ClientCache,
    listener_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    health: Mutex<HealthScheduler>,
}

impl Elbv2Manager {
    pub fn new(store: Elbv2Store, client_cache: ClientCache) -> Self {
        Elbv2Manager {
            store,
            client_cache,
            listener_locks: Mutex::new(HashMap::new()),
            health: Mutex::new(HealthScheduler::new()),
        }
    }

    async fn listener_lock(&self, listener_arn: &str) -> Arc<Mutex<()>> {
        self.listener_locks
            .lock()
            .await
            .entry(listener_arn.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn create_load_balancer(
        &self,
        region: &str,
        account: &str,
        name: &str,
        lb_type: LoadBalancerType,
        scheme: Scheme,
        vpc_id: String,
        availability_zones: Vec<String>,
    ) -> KecsResult<LoadBalancer> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let lb = LoadBalancer {
            arn: arn::load_balancer(region, account, name, &id),
            name: name.to_string(),
            dns_name: format!("{name}-{id}.kecs.local"),
            state: LoadBalancerState::Active,
            lb_type,
            scheme,
            vpc_id,
            availability_zones,
            created_at: chrono::Utc::now(),
        };
        self.store.put_load_balancer(lb).await
    }

    pub async fn delete_load_balancer(&self, lb_arn: &str, k8s: &K8sTarget<'_>) -> KecsResult<()> {
        for listener in self.store.listeners_for_load_balancer(lb_arn).await {
            self.delete_listener(&listener.arn, k8s).await?;
        }
        self.store.delete_load_balancer(lb_arn).await
    }

    pub async fn create_target_group(&self, tg: TargetGroup) -> KecsResult<TargetGroup> {
        self.store.put_target_group(tg).await
    }

    pub async fn bind_target_group(
        &self,
        tg_arn: &str,
        bound: kecs_types::BoundService,
    ) -> KecsResult<TargetGroup> {
        let mut tg = self.store.get_target_group(tg_arn).await?;
        tg.bound_service = Some(bound);
        self.store.put_target_group(tg).await
    }

    pub async fn delete_target_group(&self, tg_arn: &str) -> KecsResult<()> {
        self.store.delete_target_group(tg_arn).await
    }

    pub async fn create_listener(
        &self,
        region: &str,
        account: &str,
        lb_arn: &str,
        port: u16,
        protocol: String,
        default_actions: Vec<Action>,
        k8s: &K8sTarget<'_>,
    ) -> KecsResult<Listener> {
        let lb = self.store.get_load_balancer(lb_arn).await?;
        let listener_id = uuid::Uuid::new_v4().simple().to_string();
        let lb_id = lb
            .arn
            .rsplit('/')
            .next()
            .unwrap_or(&listener_id)
            .to_string();
        let listener = Listener {
            arn: arn::listener(&lb.arn, &lb.name, &lb_id, &listener_id),
            load_balancer_arn: lb_arn.to_string(),
            port,
            protocol,
            default_actions,
        };
        let listener = self.store.put_listener(listener).await?;
        let _ = (region, account);
        self.sync_listener_route(&listener.arn, k8s).await?;
        Ok(listener)
    }

    pub async fn delete_listener(&self, listener_arn: &str, k8s: &K8sTarget<'_>) -> KecsResult<()> {
        let listener = self.store.get_listener(listener_arn).await?;
        for rule in self.store.rules_for_listener(listener_arn).await {
            self.store.delete_rule(&rule.arn).await?;
        }
        self.store.delete_listener(listener_arn).await?;
        let clients = self
            .client_cache
            .get_or_connect(k8s.cluster_name, k8s.kube_context)
            .await?;
        delete_ingress_route(&clients.client, k8s.namespace, &format!("lb-{}", listener.port)).await
    }

    pub async fn create_rule(
        &self,
        listener_arn: &str,
        priority: Option<u32>,
        conditions: Vec<RuleCondition>,
        actions: Vec<Action>,
        k8s: &K8sTarget<'_>,
    ) -> KecsResult<Rule> {
        let existing = self.store.rules_for_listener(listener_arn).await;
        if let Some(conflicting) = find_conflict(&existing, &conditions) {
            return Err(KecsError::invalid(format!(
                "rule conditions overlap existing rule {} on listener {listener_arn}",
                conflicting.arn
            )));
        }
        let used: BTreeSet<u32> = existing.iter().map(|r| r.priority).collect();

        let priority = match priority {
            Some(p) => {
                if used.contains(&p) {
                    return Err(KecsError::invalid(format!(
                        "priority {p} already in use on listener {listener_arn}"
                    )));
                }
                p
            }
            None => find_priority_for_conditions(&used, &conditions)?,
        };

        let rule_id = uuid::Uuid::new_v4().simple().to_string();
        let rule = Rule {
            arn: arn::rule(listener_arn, &rule_id),
            listener_arn: listener_arn.to_string(),
            priority,
            conditions,
            actions,
            is_default: false,
        };
        let rule = self.store.put_rule(rule).await?;
        self.sync_listener_route(listener_arn, k8s).await?;
        Ok(rule)
    }

    pub async fn delete_rule(&self, rule_arn: &str, k8s: &K8sTarget<'_>) -> KecsResult<()> {
        let rule = self.store.get_rule(rule_arn).await?;
        self.store.delete_rule(rule_arn).await?;
        self.sync_listener_route(&rule.listener_arn, k8s).await
    }

    /// Loads every rule on the listener, sorts by priority ascending,
    /// converts each to a route, appends the catch-all, and writes the
    /// listener's whole `IngressRoute` in one apply (spec.md §4.4).
    pub async fn sync_listener_route(
        &self,
        listener_arn: &str,
        k8s: &K8sTarget<'_>,
    ) -> KecsResult<()> {
        let lock = self.listener_lock(listener_arn).await;
        let _guard = lock.lock().await;

        let listener = self.store.get_listener(listener_arn).await?;
        let mut rules = self.store.rules_for_listener(listener_arn).await;
        rules.sort_by_key(|r| r.priority);

        let referenced_tgs: BTreeSet<String> = rules
            .iter()
            .flat_map(|r| &r.actions)
            .filter_map(|a| match &a.action_type {
                kecs_types::ActionType::Forward(f) => {
                    Some(f.target_groups.iter().map(|t| t.target_group_arn.clone()))
                }
                _ => None,
            })
            .flatten()
            .collect();
        let mut target_groups = HashMap::with_capacity(referenced_tgs.len());
        for tg_arn in referenced_tgs {
            let tg = self.store.get_target_group(&tg_arn).await?;
            target_groups.insert(tg_arn, tg);
        }

        let routes = rules
            .iter()
            .map(|r| {
                rule_to_route(r, |arn| {
                    target_groups
                        .get(arn)
                        .cloned()
                        .ok_or_else(|| KecsError::not_found("TargetGroup", arn))
                })
            })
            .collect::<KecsResult<Vec<_>>>()?;

        let ingress_name = format!("lb-{}", listener.port);
        let clients = self
            .client_cache
            .get_or_connect(k8s.cluster_name, k8s.kube_context)
            .await?;

        let object = build_ingress_route(
            &ingress_name,
            k8s.namespace,
            &[entry_point_for(&listener.protocol)],
            &routes,
        );
        apply_ingress_route(&clients.client, &object).await
    }

    pub async fn register_targets(
        &self,
        tg_arn: &str,
        targets: Vec<(String, u16)>,
        k8s: &K8sTarget<'_>,
    ) -> KecsResult<()> {
        let client = self
            .client_cache
            .get_or_connect(k8s.cluster_name, k8s.kube_context)
            .await
            .ok()
            .map(|c| c.client);
        for (target_id, port) in targets {
            self.store
                .put_target_health(TargetHealth {
                    target_group_arn: tg_arn.to_string(),
                    target_id: target_id.clone(),
                    target_port: port,
                    state: TargetHealthState::Initial,
                    reason: "Elb.RegistrationInProgress".to_string(),
                    registered_at: chrono::Utc::now(),
                })
                .await?;
            self.health.lock().await.schedule_settle(
                self.store.clone(),
                client.clone(),
                k8s.namespace.to_string(),
                tg_arn.to_string(),
                target_id,
                port,
            );
        }
        Ok(())
    }

    pub async fn deregister_targets(
        &self,
        tg_arn: &str,
        target_ids: &[String],
    ) -> KecsResult<()> {
        self.store.deregister_targets(tg_arn, target_ids).await?;
        Ok(())
    }

    pub async fn describe_target_health(&self, tg_arn: &str) -> Vec<TargetHealth> {
        self.store.target_health_for_group(tg_arn).await
    }

    /// Aborts every pending target-health settle transition (spec.md §5:
    /// service shutdown cancels pending work rather than letting it race
    /// a torn-down store).
    pub async fn shutdown(&self) {
        self.health.lock().await.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_point_defaults_to_web() {
        assert_eq!(entry_point_for("HTTP"), "web");
        assert_eq!(entry_point_for("HTTPS"), "websecure");
    }
}
