//! Persisted sets format: a flat JSON object of member to owner.
//!
//! Owners are not written as keys of their own; they are rebuilt as primary
//! entries when the object is read back.

use std::collections::{BTreeMap, BTreeSet};

use fps_core::{SetEntry, SetsMap, Site};
use serde_json::{Map, Value};

/// Serialize member -> owner pairs. Primary entries are omitted.
pub fn serialize_first_party_sets(sets: &SetsMap) -> String {
    let flat: Map<String, Value> = sets
        .iter()
        .filter(|(site, entry)| entry.owner() != *site)
        .map(|(site, entry)| (site.to_string(), Value::String(entry.owner().to_string())))
        .collect();
    Value::Object(flat).to_string()
}

/// Read a persisted member -> owner object back into a mapping.
///
/// Any invalid key, value or overlap between owners and members yields an
/// empty mapping. Pairs where a member names itself as owner are ignored, and
/// a member repeated under another spelling keeps the owner read last.
pub fn deserialize_first_party_sets(json: &str) -> SetsMap {
    match try_deserialize(json) {
        Some(sets) => sets,
        None => {
            log::debug!("ignoring unreadable persisted sets");
            SetsMap::new()
        }
    }
}

fn try_deserialize(json: &str) -> Option<SetsMap> {
    if json.trim().is_empty() {
        return Some(SetsMap::new());
    }

    let Value::Object(object) = serde_json::from_str::<Value>(json).ok()? else {
        return None;
    };

    let mut member_to_owner: BTreeMap<Site, Site> = BTreeMap::new();
    let mut owners: BTreeSet<Site> = BTreeSet::new();
    for (member_value, owner_value) in &object {
        let member = Site::canonicalize(member_value, false).ok()?;
        let owner = Site::canonicalize(owner_value.as_str()?, false).ok()?;
        if member == owner {
            continue;
        }
        if owners.contains(&member) || member_to_owner.contains_key(&owner) {
            return None;
        }
        // Keys that canonicalize to the same member: the later one wins.
        if let Some(previous_owner) = member_to_owner.insert(member, owner.clone()) {
            if previous_owner != owner && !member_to_owner.values().any(|o| *o == previous_owner) {
                owners.remove(&previous_owner);
            }
        }
        owners.insert(owner);
    }

    let mut sets: SetsMap = owners
        .into_iter()
        .map(|owner| (owner.clone(), SetEntry::primary(owner)))
        .collect();
    sets.extend(
        member_to_owner
            .into_iter()
            .map(|(member, owner)| (member, SetEntry::associated(owner, None))),
    );
    Some(sets)
}
