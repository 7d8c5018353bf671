use std::path::Path;

use kecs_types::{KecsError, KecsResult, LoadBalancer, Listener, Rule, TargetGroup, TargetHealth};

use crate::collection::Collection;

/// Durable rows backing C4's in-memory working set (spec.md §4.4: the
/// emulator itself is a `RwLock`-guarded cache; this is what survives a
/// restart).
#[derive(Clone)]
pub struct Elbv2Store {
    pub load_balancers: Collection<LoadBalancer>,
    pub target_groups: Collection<TargetGroup>,
    pub listeners: Collection<Listener>,
    pub rules: Collection<Rule>,
    pub target_health: Collection<TargetHealth>,
}

fn target_health_key(tg_arn: &str, target_id: &str, port: u16) -> String {
    format!("{tg_arn}::{target_id}::{port}")
}

impl Elbv2Store {
    pub async fn open(dir: &Path) -> KecsResult<Self> {
        Ok(Elbv2Store {
            load_balancers: Collection::open(dir, "elbv2_load_balancers").await?,
            target_groups: Collection::open(dir, "elbv2_target_groups").await?,
            listeners: Collection::open(dir, "elbv2_listeners").await?,
            rules: Collection::open(dir, "elbv2_rules").await?,
            target_health: Collection::open(dir, "elbv2_target_health").await?,
        })
    }

    pub async fn put_load_balancer(&self, lb: LoadBalancer) -> KecsResult<LoadBalancer> {
        self.load_balancers.put(lb.arn.clone(), lb).await
    }

    pub async fn get_load_balancer(&self, arn: &str) -> KecsResult<LoadBalancer> {
        self.load_balancers
            .get(arn)
            .await
            .ok_or_else(|| KecsError::not_found("LoadBalancer", arn))
    }

    pub async fn delete_load_balancer(&self, arn: &str) -> KecsResult<()> {
        self.load_balancers.delete(arn).await
    }

    pub async fn list_load_balancers(&self) -> Vec<LoadBalancer> {
        self.load_balancers.list_all().await
    }

    pub async fn put_target_group(&self, tg: TargetGroup) -> KecsResult<TargetGroup> {
        self.target_groups.put(tg.arn.clone(), tg).await
    }

    pub async fn get_target_group(&self, arn: &str) -> KecsResult<TargetGroup> {
        self.target_groups
            .get(arn)
            .await
            .ok_or_else(|| KecsError::not_found("TargetGroup", arn))
    }

    pub async fn delete_target_group(&self, arn: &str) -> KecsResult<()> {
        self.target_groups.delete(arn).await
    }

    pub async fn target_groups_for_load_balancer(&self, lb_arn: &str) -> Vec<TargetGroup> {
        let listeners = self.listeners_for_load_balancer(lb_arn).await;
        let listener_arns: std::collections::HashSet<_> =
            listeners.iter().map(|l| l.arn.clone()).collect();
        let tg_arns: std::collections::HashSet<String> = self
            .rules
            .list_all()
            .await
            .into_iter()
            .filter(|r| listener_arns.contains(&r.listener_arn))
            .flat_map(|r| r.actions)
            .filter_map(|a| match a.action_type {
                kecs_types::ActionType::Forward(f) => {
                    Some(f.target_groups.into_iter().map(|t| t.target_group_arn))
                }
                _ => None,
            })
            .flatten()
            .collect();
        self.target_groups
            .list_all()
            .await
            .into_iter()
            .filter(|tg| tg_arns.contains(&tg.arn))
            .collect()
    }

    pub async fn put_listener(&self, l: Listener) -> KecsResult<Listener> {
        self.listeners.put(l.arn.clone(), l).await
    }

    pub async fn get_listener(&self, arn: &str) -> KecsResult<Listener> {
        self.listeners
            .get(arn)
            .await
            .ok_or_else(|| KecsError::not_found("Listener", arn))
    }

    pub async fn delete_listener(&self, arn: &str) -> KecsResult<()> {
        self.listeners.delete(arn).await
    }

    pub async fn listeners_for_load_balancer(&self, lb_arn: &str) -> Vec<Listener> {
        self.listeners
            .list_all()
            .await
            .into_iter()
            .filter(|l| l.load_balancer_arn == lb_arn)
            .collect()
    }

    pub async fn put_rule(&self, r: Rule) -> KecsResult<Rule> {
        self.rules.put(r.arn.clone(), r).await
    }

    pub async fn get_rule(&self, arn: &str) -> KecsResult<Rule> {
        self.rules
            .get(arn)
            .await
            .ok_or_else(|| KecsError::not_found("Rule", arn))
    }

    pub async fn delete_rule(&self, arn: &str) -> KecsResult<()> {
        self.rules.delete(arn).await
    }

    pub async fn rules_for_listener(&self, listener_arn: &str) -> Vec<Rule> {
        self.rules
            .list_all()
            .await
            .into_iter()
            .filter(|r| r.listener_arn == listener_arn)
            .collect()
    }

    pub async fn put_target_health(&self, th: TargetHealth) -> KecsResult<TargetHealth> {
        let key = target_health_key(&th.target_group_arn, &th.target_id, th.target_port);
        self.target_health.put(key, th).await
    }

    pub async fn target_health_for_group(&self, tg_arn: &str) -> Vec<TargetHealth> {
        self.target_health
            .list_all()
            .await
            .into_iter()
            .filter(|th| th.target_group_arn == tg_arn)
            .collect()
    }

    pub async fn deregister_targets(
        &self,
        tg_arn: &str,
        target_ids: &[String],
    ) -> KecsResult<usize> {
        self.target_health
            .retain(|_, th| {
                !(th.target_group_arn == tg_arn && target_ids.contains(&th.target_id))
            })
            .await
    }
}
