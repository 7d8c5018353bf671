//! Rule conflict detection (spec.md §4.4): two rules on the same listener
//! conflict when their path-pattern condition sets overlap, since a request
//! matching both would have no deterministic listener-level tiebreak beyond
//! priority (which `CreateRule`'s caller may not control when letting KECS
//! auto-assign one).

use kecs_types::{Rule, RuleCondition};

fn path_values(conditions: &[RuleCondition]) -> Option<&[String]> {
    conditions.iter().find_map(|c| match c {
        RuleCondition::PathPattern(p) => Some(p.values.as_slice()),
        _ => None,
    })
}

/// `/api/*` overlaps `/api/users` (prefix contains it), `/api/*` overlaps
/// `/api/*` (identical), but `/api/*` does not overlap `/health`.
fn values_overlap(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (a.strip_suffix('*'), b.strip_suffix('*')) {
        (Some(ap), Some(bp)) => ap.starts_with(bp) || bp.starts_with(ap),
        (Some(ap), None) => b.starts_with(ap),
        (None, Some(bp)) => a.starts_with(bp),
        (None, None) => false,
    }
}

/// Rules with no `PathPattern` condition at all carry no path constraint to
/// compare, so they never conflict on this axis.
pub fn conditions_conflict(a: &[RuleCondition], b: &[RuleCondition]) -> bool {
    match (path_values(a), path_values(b)) {
        (Some(av), Some(bv)) => av.iter().any(|x| bv.iter().any(|y| values_overlap(x, y))),
        _ => false,
    }
}

/// The first existing rule on the listener whose path patterns overlap the
/// candidate conditions, if any.
pub fn find_conflict<'a>(existing: &'a [Rule], conditions: &[RuleCondition]) -> Option<&'a Rule> {
    existing.iter().find(|r| conditions_conflict(&r.conditions, conditions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kecs_types::{Action, ActionType, ForwardConfig, PathPatternConfig};

    fn path_rule(arn: &str, priority: u32, values: &[&str]) -> Rule {
        Rule {
            arn: arn.to_string(),
            listener_arn: "listener-1".to_string(),
            priority,
            conditions: vec![RuleCondition::PathPattern(PathPatternConfig {
                values: values.iter().map(|v| v.to_string()).collect(),
            })],
            actions: vec![Action {
                order: 1,
                action_type: ActionType::Forward(ForwardConfig {
                    target_groups: vec![],
                    target_group_stickiness_config: None,
                }),
            }],
            is_default: false,
        }
    }

    #[test]
    fn identical_paths_conflict() {
        let existing = vec![path_rule("r1", 100, &["/api/users"])];
        let candidate = vec![RuleCondition::PathPattern(PathPatternConfig {
            values: vec!["/api/users".to_string()],
        })];
        assert!(find_conflict(&existing, &candidate).is_some());
    }

    #[test]
    fn prefix_overlaps_specific_path_beneath_it() {
        let existing = vec![path_rule("r1", 100, &["/api/*"])];
        let candidate = vec![RuleCondition::PathPattern(PathPatternConfig {
            values: vec!["/api/users".to_string()],
        })];
        assert!(find_conflict(&existing, &candidate).is_some());
    }

    #[test]
    fn disjoint_paths_do_not_conflict() {
        let existing = vec![path_rule("r1", 100, &["/api/*"])];
        let candidate = vec![RuleCondition::PathPattern(PathPatternConfig {
            values: vec!["/health".to_string()],
        })];
        assert!(find_conflict(&existing, &candidate).is_none());
    }

    #[test]
    fn rules_without_path_patterns_never_conflict() {
        let existing = vec![Rule {
            arn: "r1".to_string(),
            listener_arn: "listener-1".to_string(),
            priority: 100,
            conditions: vec![],
            actions: vec![],
            is_default: false,
        }];
        let candidate = vec![RuleCondition::PathPattern(PathPatternConfig {
            values: vec!["/x".to_string()],
        })];
        assert!(find_conflict(&existing, &candidate).is_none());
    }
}
