//! Cloud Map namespace <-> Kubernetes namespace derivation (spec.md §4.5).

const STRIPPED_SUFFIXES: &[&str] = &[".local", ".ecs", ".internal"];
const MAX_NAME_LEN: usize = 63;

/// Strips a trailing `.local`/`.ecs`/`.internal` suffix, replaces `.` with
/// `-`, lowercases, and clamps to 63 characters (the k8s DNS label limit).
pub fn derive_k8s_namespace(sd_namespace_name: &str) -> String {
    let mut name = sd_namespace_name;
    for suffix in STRIPPED_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped;
            break;
        }
    }
    let mut derived = name.to_lowercase().replace('.', "-");
    derived.truncate(MAX_NAME_LEN);
    let trimmed = derived.trim_end_matches('-');
    if trimmed.is_empty() {
        "sd".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_suffixes() {
        assert_eq!(derive_k8s_namespace("corp.local"), "corp");
        assert_eq!(derive_k8s_namespace("svc.internal"), "svc");
        assert_eq!(derive_k8s_namespace("teams.ecs"), "teams");
    }

    #[test]
    fn replaces_dots_and_lowercases() {
        assert_eq!(derive_k8s_namespace("Billing.Prod"), "billing-prod");
    }

    #[test]
    fn clamps_to_63_chars() {
        let long = "a".repeat(100);
        assert_eq!(derive_k8s_namespace(&long).len(), 63);
    }
}
