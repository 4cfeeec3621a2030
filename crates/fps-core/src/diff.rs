//! Difference between two snapshots of the resolved sets
//!
//! The diff drives data clearing, so it errs on the side of including a site:
//! only leaving a set or changing owner counts, joining never does.

use std::collections::BTreeSet;

use crate::resolve::find_owner;
use crate::site::Site;
use crate::types::{PolicyCustomization, SetsMap};

/// Sites whose effective owner changed between the old and current state.
///
/// Returns an empty set if the old state has no sets and no policy at all.
pub fn compute_sets_diff(
    old_sets: &SetsMap,
    old_policy: &PolicyCustomization,
    current_sets: &SetsMap,
    current_policy: &PolicyCustomization,
) -> BTreeSet<Site> {
    if old_sets.is_empty() && old_policy.is_empty() {
        return BTreeSet::new();
    }

    let owner_changed = |site: &Site, old_owner: &Site| {
        find_owner(site, current_sets, current_policy).map(|entry| entry.owner()) != Some(old_owner)
    };

    let mut result = BTreeSet::new();

    for (site, old_entry) in old_sets {
        if old_policy.contains_key(site) {
            continue;
        }
        if owner_changed(site, old_entry.owner()) {
            result.insert(site.clone());
        }
    }

    for (site, old_entry) in old_policy {
        let Some(old_entry) = old_entry else {
            continue;
        };
        if owner_changed(site, old_entry.owner()) {
            result.insert(site.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::SetEntry;

    fn site(origin: &str) -> Site {
        Site::canonicalize(origin, false).unwrap()
    }

    fn sets(pairs: &[(&str, &str)]) -> SetsMap {
        pairs
            .iter()
            .map(|(member, owner)| {
                let entry = if member == owner {
                    SetEntry::primary(site(owner))
                } else {
                    SetEntry::associated(site(owner), None)
                };
                (site(member), entry)
            })
            .collect()
    }

    fn sites(origins: &[&str]) -> BTreeSet<Site> {
        origins.iter().map(|o| site(o)).collect()
    }

    fn no_policy() -> PolicyCustomization {
        PolicyCustomization::new()
    }

    #[test]
    fn empty_old_state_yields_nothing() {
        let current = sets(&[("https://a.test", "https://a.test"), ("https://b.test", "https://a.test")]);
        assert!(compute_sets_diff(&SetsMap::new(), &no_policy(), &current, &no_policy()).is_empty());
    }

    #[test]
    fn departure_is_captured() {
        let old = sets(&[("https://owner.test", "https://owner.test"), ("https://a.test", "https://owner.test")]);
        let diff = compute_sets_diff(&old, &no_policy(), &SetsMap::new(), &no_policy());
        assert_eq!(diff, sites(&["https://owner.test", "https://a.test"]));
    }

    #[test]
    fn pure_join_is_not_a_change() {
        let old = sets(&[("https://owner.test", "https://owner.test"), ("https://a.test", "https://owner.test")]);
        let current = sets(&[
            ("https://owner.test", "https://owner.test"),
            ("https://a.test", "https://owner.test"),
            ("https://b.test", "https://owner.test"),
            ("https://x.test", "https://x.test"),
            ("https://y.test", "https://x.test"),
        ]);
        assert!(compute_sets_diff(&old, &no_policy(), &current, &no_policy()).is_empty());
    }

    #[test]
    fn owner_change_is_captured() {
        let old = sets(&[
            ("https://owner.test", "https://owner.test"),
            ("https://a.test", "https://owner.test"),
            ("https://b.test", "https://owner.test"),
        ]);
        let current = sets(&[
            ("https://owner.test", "https://owner.test"),
            ("https://a.test", "https://owner.test"),
            ("https://new.test", "https://new.test"),
            ("https://b.test", "https://new.test"),
        ]);
        let diff = compute_sets_diff(&old, &no_policy(), &current, &no_policy());
        assert_eq!(diff, sites(&["https://b.test"]));
    }

    #[test]
    fn owner_member_rotation_over_includes() {
        let old = sets(&[
            ("https://a.test", "https://a.test"),
            ("https://b.test", "https://a.test"),
            ("https://c.test", "https://a.test"),
        ]);
        let current = sets(&[
            ("https://b.test", "https://b.test"),
            ("https://a.test", "https://b.test"),
            ("https://c.test", "https://b.test"),
        ]);
        let diff = compute_sets_diff(&old, &no_policy(), &current, &no_policy());
        assert_eq!(diff, sites(&["https://a.test", "https://b.test", "https://c.test"]));
    }

    #[test]
    fn policy_removal_is_captured() {
        let old = sets(&[("https://owner.test", "https://owner.test"), ("https://a.test", "https://owner.test")]);
        let current_policy = PolicyCustomization::from([
            (site("https://a.test"), None),
            (site("https://owner.test"), None),
        ]);
        let diff = compute_sets_diff(&old, &no_policy(), &old, &current_policy);
        assert_eq!(diff, sites(&["https://owner.test", "https://a.test"]));
    }

    #[test]
    fn old_policy_entries_are_compared() {
        let public = sets(&[("https://owner.test", "https://owner.test"), ("https://a.test", "https://owner.test")]);
        let old_policy = PolicyCustomization::from([
            (site("https://p.test"), Some(SetEntry::primary(site("https://p.test")))),
            (site("https://a.test"), Some(SetEntry::associated(site("https://p.test"), None))),
            (site("https://gone.test"), None),
        ]);

        // Dropping the policy sends a.test back to its public owner and p.test out of FPS.
        let diff = compute_sets_diff(&public, &old_policy, &public, &no_policy());
        assert_eq!(diff, sites(&["https://a.test", "https://p.test"]));
    }

    #[test]
    fn unchanged_state_yields_nothing() {
        let public = sets(&[("https://owner.test", "https://owner.test"), ("https://a.test", "https://owner.test")]);
        let policy = PolicyCustomization::from([(site("https://a.test"), None)]);
        assert!(compute_sets_diff(&public, &policy, &public, &policy).is_empty());
    }
}
