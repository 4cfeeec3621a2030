//! First-Party Sets Core Library
//!
//! This crate provides the data model and the pure resolution algorithms for
//! First-Party Sets: groups of sites owned by the same organization.
//!
//! # Architecture
//!
//! Every site is canonicalized to its https registrable domain. Parsed sets are
//! flattened into a [`SetsMap`] (site to owner entry), enterprise policy is
//! layered on top as a [`PolicyCustomization`], and lookups and diffs always
//! consult the policy before the public sets.
//!
//! # Modules
//!
//! - `psl`: Public Suffix List for eTLD+1 extraction
//! - `site`: Origin canonicalization
//! - `types`: Set entries, single sets and the flat mappings
//! - `union_find`: Disjoint-set union used to merge overlapping addition sets
//! - `resolve`: Owner lookup, enterprise-policy customization and the manual set override
//! - `diff`: Sites whose ownership changed between two snapshots

pub mod diff;
pub mod psl;
pub mod resolve;
pub mod site;
pub mod types;
pub mod union_find;

// Re-export commonly used types
pub use diff::compute_sets_diff;
pub use psl::{get_registrable_domain, init_psl, PslRules};
pub use resolve::{
    apply_manually_specified_set, compute_enterprise_customizations, find_owner, find_owners, normalize_addition_sets,
};
pub use site::{CanonicalizeError, Site};
pub use types::{
    Aliases, GlobalSets, ParsedPolicySetLists, PolicyCustomization, SetEntry, SetsMap, SingleSet, SiteIndex,
    SiteType,
};
pub use union_find::UnionFind;
