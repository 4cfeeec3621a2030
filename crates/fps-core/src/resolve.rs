//! Ownership lookup and enterprise-policy customization
//!
//! Lookups always follow one precedence order: a policy customization wins,
//! then the public sets, then nothing.

use std::collections::{BTreeMap, BTreeSet};

use crate::site::Site;
use crate::types::{GlobalSets, ParsedPolicySetLists, PolicyCustomization, SetEntry, SetsMap, SingleSet};
use crate::union_find::UnionFind;

// =============================================================================
// Lookup
// =============================================================================

/// Resolve the entry for `site`.
///
/// A key present in `policy` decides the answer even when its value is `None`
/// (the site was explicitly removed).
pub fn find_owner<'a>(
    site: &Site,
    public_sets: &'a SetsMap,
    policy: &'a PolicyCustomization,
) -> Option<&'a SetEntry> {
    match policy.get(site) {
        Some(overridden) => overridden.as_ref(),
        None => public_sets.get(site),
    }
}

/// Batch form of [`find_owner`]; sites without an owner are left out.
pub fn find_owners<'s, I>(sites: I, public_sets: &SetsMap, policy: &PolicyCustomization) -> BTreeMap<Site, SetEntry>
where
    I: IntoIterator<Item = &'s Site>,
{
    sites
        .into_iter()
        .filter_map(|site| find_owner(site, public_sets, policy).map(|entry| (site.clone(), entry.clone())))
        .collect()
}

// =============================================================================
// Addition Set Normalization
// =============================================================================

/// Merge addition sets that overlap the same existing owner.
///
/// Within each group of transitively overlapping sets, the set with the lowest
/// list index absorbs the others and re-owns all of their sites.
pub fn normalize_addition_sets(public_sets: &SetsMap, additions: &[SingleSet]) -> Vec<SingleSet> {
    // Existing owner -> indices of addition sets that touch its set, ascending.
    let mut overlaps: BTreeMap<&Site, Vec<usize>> = BTreeMap::new();
    for (index, set) in additions.iter().enumerate() {
        for site in set.sites() {
            if let Some(entry) = public_sets.get(site) {
                let indices = overlaps.entry(entry.owner()).or_default();
                if indices.last() != Some(&index) {
                    indices.push(index);
                }
            }
        }
    }

    let mut union_find = UnionFind::new(additions.len());
    for indices in overlaps.values() {
        if let Some((&first, rest)) = indices.split_first() {
            for &other in rest {
                union_find.union(first, other);
            }
        }
    }

    union_find
        .sets_mapping()
        .into_iter()
        .map(|(representative, absorbed)| {
            let mut base = additions[representative].clone();
            for child in absorbed {
                for site in additions[child].sites() {
                    base.insert_member(site.clone(), None);
                }
            }
            base
        })
        .collect()
}

// =============================================================================
// Enterprise Customizations
// =============================================================================

/// Compute the per-profile customization an Overrides policy applies on top
/// of the public sets.
pub fn compute_enterprise_customizations(
    public_sets: &SetsMap,
    policy: &ParsedPolicySetLists,
) -> PolicyCustomization {
    let additions = normalize_addition_sets(public_sets, &policy.additions);

    // Policy sets always take effect verbatim.
    let mut site_to_entry: PolicyCustomization = policy
        .replacements
        .iter()
        .chain(additions.iter())
        .flat_map(|set| set.iter())
        .map(|(site, entry)| (site.clone(), Some(entry.clone())))
        .collect();

    // Existing owner -> the members it loses to policy sets.
    let mut potential_singletons: BTreeMap<Site, BTreeSet<Site>> = BTreeMap::new();
    // Existing owners that were themselves moved into a replacement set.
    let mut replaced_existing_owners: BTreeSet<Site> = BTreeSet::new();
    for site in policy.replacements.iter().flat_map(SingleSet::sites) {
        if let Some(entry) = public_sets.get(site) {
            if entry.owner() == site {
                replaced_existing_owners.insert(site.clone());
            } else {
                potential_singletons
                    .entry(entry.owner().clone())
                    .or_default()
                    .insert(site.clone());
            }
        }
    }

    // Existing owner -> the addition owner that absorbs its whole set.
    let mut absorbed_owners: BTreeMap<Site, Site> = BTreeMap::new();
    for set in &additions {
        for site in set.sites() {
            let Some(entry) = public_sets.get(site) else {
                continue;
            };
            if entry.owner() == site {
                absorbed_owners.insert(site.clone(), set.owner().clone());
            } else {
                potential_singletons
                    .entry(entry.owner().clone())
                    .or_default()
                    .insert(site.clone());
            }
        }
    }
    for owner in absorbed_owners.keys() {
        potential_singletons.remove(owner);
    }

    for (site, entry) in public_sets {
        if site_to_entry.contains_key(site) {
            continue;
        }
        let owner = entry.owner();

        if let Some(new_owner) = absorbed_owners.get(owner) {
            site_to_entry.insert(site.clone(), Some(SetEntry::associated(new_owner.clone(), None)));
            continue;
        }

        if replaced_existing_owners.contains(owner) {
            site_to_entry.insert(site.clone(), None);
            continue;
        }

        // A remaining member keeps its owner's set alive.
        if site != owner {
            let keeps_owner = potential_singletons
                .get(owner)
                .is_some_and(|lost| !lost.contains(site));
            if keeps_owner {
                potential_singletons.remove(owner);
            }
        }
    }

    for owner in potential_singletons.into_keys() {
        site_to_entry.entry(owner).or_insert(None);
    }

    site_to_entry
}

// =============================================================================
// Manual Set
// =============================================================================

/// Override `sets` with `manual_set`, dropping every public entry it touches.
pub fn apply_manually_specified_set(sets: &mut GlobalSets, manual_set: &SingleSet) {
    let GlobalSets { sets: map, aliases } = sets;
    let manual_owner = manual_set.owner();
    let touches_manual_set = |site: &Site, owner: &Site| {
        site == manual_owner
            || owner == manual_owner
            || manual_set.contains(site)
            || manual_set.contains(owner)
            || aliases.get(site).is_some_and(|canonical| manual_set.contains(canonical))
    };
    map.retain(|site, entry| !touches_manual_set(site, entry.owner()));

    for (site, entry) in manual_set {
        map.insert(site.clone(), entry.clone());
    }

    // Removals above can leave an owner without members.
    let owners_with_members: BTreeSet<Site> = map
        .values()
        .filter(|entry| !entry.is_primary())
        .map(|entry| entry.owner().clone())
        .collect();
    map.retain(|site, entry| !entry.is_primary() || owners_with_members.contains(site));

    aliases.retain(|alias, canonical| {
        !manual_set.contains(alias) && !manual_set.contains(canonical) && map.contains_key(canonical)
    });
}
