//! Core type definitions for First-Party Sets
//!
//! These are value types: resolution never mutates a mapping in place, it
//! derives a new one.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::site::Site;

// =============================================================================
// Set Entries
// =============================================================================

/// Role of a site within its set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteType {
    /// The site owns the set.
    Primary,
    /// The site is owned by another site.
    Associated,
}

/// Position of a member within the "members" array of its declaring set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteIndex(pub u32);

/// One site's membership record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetEntry {
    owner: Site,
    site_type: SiteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<SiteIndex>,
}

impl SetEntry {
    /// Entry for a site that owns its set.
    pub fn primary(site: Site) -> Self {
        Self {
            owner: site,
            site_type: SiteType::Primary,
            index: None,
        }
    }

    /// Entry for a member of `owner`'s set.
    pub fn associated(owner: Site, index: Option<SiteIndex>) -> Self {
        Self {
            owner,
            site_type: SiteType::Associated,
            index,
        }
    }

    pub fn owner(&self) -> &Site {
        &self.owner
    }

    pub fn site_type(&self) -> SiteType {
        self.site_type
    }

    pub fn index(&self) -> Option<SiteIndex> {
        self.index
    }

    pub fn is_primary(&self) -> bool {
        self.site_type == SiteType::Primary
    }
}

// =============================================================================
// Mappings
// =============================================================================

/// Site to entry, across every known set. Keys are globally unique.
pub type SetsMap = BTreeMap<Site, SetEntry>;

/// ccTLD alias to its canonical representative within the same set.
pub type Aliases = BTreeMap<Site, Site>;

/// Per-profile override mapping. `None` means "explicitly removed".
pub type PolicyCustomization = BTreeMap<Site, Option<SetEntry>>;

// =============================================================================
// Single Set
// =============================================================================

/// One First-Party Set: an owner plus its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleSet {
    owner: Site,
    entries: BTreeMap<Site, SetEntry>,
}

impl SingleSet {
    /// A set containing only its owner. Not valid until a member is added.
    pub fn new(owner: Site) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(owner.clone(), SetEntry::primary(owner.clone()));
        Self { owner, entries }
    }

    pub fn owner(&self) -> &Site {
        &self.owner
    }

    /// Add `site` as a member owned by this set's owner.
    ///
    /// Returns `false` (and leaves the set unchanged) if the site is already in it.
    pub fn insert_member(&mut self, site: Site, index: Option<SiteIndex>) -> bool {
        if self.entries.contains_key(&site) {
            return false;
        }
        let entry = SetEntry::associated(self.owner.clone(), index);
        self.entries.insert(site, entry);
        true
    }

    pub fn contains(&self, site: &Site) -> bool {
        self.entries.contains_key(site)
    }

    pub fn get(&self, site: &Site) -> Option<&SetEntry> {
        self.entries.get(site)
    }

    /// Number of sites, owner included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Site, &SetEntry)> {
        self.entries.iter()
    }

    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.entries.keys()
    }

    /// Members only, owner excluded.
    pub fn members(&self) -> impl Iterator<Item = &Site> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_primary())
            .map(|(site, _)| site)
    }
}

impl<'a> IntoIterator for &'a SingleSet {
    type Item = (&'a Site, &'a SetEntry);
    type IntoIter = std::collections::btree_map::Iter<'a, Site, SetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// The two lists of an enterprise Overrides policy, already validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPolicySetLists {
    pub replacements: Vec<SingleSet>,
    pub additions: Vec<SingleSet>,
}

// =============================================================================
// Global Sets
// =============================================================================

/// The finalized public mapping, with the alias table it was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSets {
    pub sets: SetsMap,
    pub aliases: Aliases,
}

impl GlobalSets {
    pub fn new(sets: SetsMap, aliases: Aliases) -> Self {
        Self { sets, aliases }
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Entry for `site`, following an alias to its canonical site if needed.
    pub fn find_entry(&self, site: &Site) -> Option<&SetEntry> {
        self.sets
            .get(site)
            .or_else(|| self.aliases.get(site).and_then(|canonical| self.sets.get(canonical)))
    }

    /// Group the mapping by owner.
    pub fn owner_to_members(&self) -> BTreeMap<Site, BTreeSet<Site>> {
        owner_to_members(&self.sets)
    }
}

/// Group a mapping by owner; owners map to their non-owner members.
pub fn owner_to_members(sets: &SetsMap) -> BTreeMap<Site, BTreeSet<Site>> {
    let mut grouped: BTreeMap<Site, BTreeSet<Site>> = BTreeMap::new();
    for (site, entry) in sets {
        let members = grouped.entry(entry.owner().clone()).or_default();
        if !entry.is_primary() {
            members.insert(site.clone());
        }
    }
    grouped
}
