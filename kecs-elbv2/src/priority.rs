//! Priority manager (spec.md §4.4). Priorities live in `[1,49999]`, split
//! by convention into critical/specific/general/catchall bands; a rule's
//! band is picked from a specificity score over its conditions, then the
//! lowest free priority in that band is assigned.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use kecs_types::{KecsError, KecsResult, PathPatternConfig, RuleCondition};

pub const CRITICAL: RangeInclusive<u32> = 1..=99;
pub const SPECIFIC: RangeInclusive<u32> = 100..=999;
pub const GENERAL: RangeInclusive<u32> = 1000..=9999;
pub const CATCHALL: RangeInclusive<u32> = 10000..=49999;

fn is_exact_path(p: &PathPatternConfig) -> bool {
    p.values.iter().all(|v| !v.contains('*') && !v.contains('?'))
}

fn is_prefix_path(p: &PathPatternConfig) -> bool {
    p.values
        .iter()
        .all(|v| v.ends_with("/*") && v.matches('*').count() == 1)
}

/// `exact path 15, prefix 5, complex 3, exact host 8, wildcard host 4, http
/// header 6, query 7, source-ip 5, method 2, plus 2×number-of-conditions`.
pub fn specificity_score(conditions: &[RuleCondition]) -> u32 {
    let mut score = 2 * conditions.len() as u32;
    for c in conditions {
        score += match c {
            RuleCondition::PathPattern(p) if is_exact_path(p) => 15,
            RuleCondition::PathPattern(p) if is_prefix_path(p) => 5,
            RuleCondition::PathPattern(_) => 3,
            RuleCondition::HostHeader(h) if h.values.iter().all(|v| !v.contains('*')) => 8,
            RuleCondition::HostHeader(_) => 4,
            RuleCondition::HttpHeader(_) => 6,
            RuleCondition::QueryString(_) => 7,
            RuleCondition::SourceIp(_) => 5,
            RuleCondition::HttpRequestMethod(_) => 2,
        };
    }
    score
}

/// No conditions at all (a listener's default rule) scores zero and lands
/// in the catchall band; everything else is scored into critical/specific/
/// general by thresholds calibrated against the example scores in spec.md
/// §4.4 (a lone exact-path condition scores 17 and should land in
/// `specific`, two or more high-specificity conditions should land in
/// `critical`).
pub fn priority_range(score: u32) -> RangeInclusive<u32> {
    match score {
        0 => CATCHALL,
        1..=9 => GENERAL,
        10..=24 => SPECIFIC,
        _ => CRITICAL,
    }
}

fn lowest_free(used: &BTreeSet<u32>, range: RangeInclusive<u32>) -> Option<u32> {
    range.into_iter().find(|p| !used.contains(p))
}

/// `used` must contain only priorities already assigned on the *same*
/// listener (spec.md §3: priorities are pairwise distinct per listener,
/// not globally).
pub fn find_priority_for_conditions(
    used: &BTreeSet<u32>,
    conditions: &[RuleCondition],
) -> KecsResult<u32> {
    let score = specificity_score(conditions);
    let primary = priority_range(score);
    lowest_free(used, primary.clone())
        .or_else(|| {
            // Spill into the neighboring, less specific bands rather than
            // fail outright once one band fills up.
            [GENERAL, SPECIFIC, CATCHALL, CRITICAL]
                .into_iter()
                .find_map(|r| lowest_free(used, r))
        })
        .ok_or_else(|| KecsError::invalid("no free rule priority available in [1,49999]"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kecs_types::{HostHeaderConfig, PathPatternConfig};

    #[test]
    fn exact_path_lands_in_specific() {
        let conditions = vec![RuleCondition::PathPattern(PathPatternConfig {
            values: vec!["/api/v1/users".to_string()],
        })];
        let score = specificity_score(&conditions);
        assert_eq!(score, 15 + 2);
        assert_eq!(priority_range(score), SPECIFIC);
    }

    #[test]
    fn no_conditions_lands_in_catchall() {
        assert_eq!(priority_range(specificity_score(&[])), CATCHALL);
    }

    #[test]
    fn picks_lowest_free_priority_in_band() {
        let used: BTreeSet<u32> = [100, 101].into_iter().collect();
        let conditions = vec![RuleCondition::PathPattern(PathPatternConfig {
            values: vec!["/x".to_string()],
        })];
        let p = find_priority_for_conditions(&used, &conditions).unwrap();
        assert_eq!(p, 102);
    }

    #[test]
    fn multiple_high_specificity_conditions_land_in_critical() {
        let conditions = vec![
            RuleCondition::PathPattern(PathPatternConfig {
                values: vec!["/x".to_string()],
            }),
            RuleCondition::HostHeader(HostHeaderConfig {
                values: vec!["api.example.com".to_string()],
            }),
        ];
        assert_eq!(priority_range(specificity_score(&conditions)), CRITICAL);
    }
}
