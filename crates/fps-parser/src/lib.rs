//! First-Party Sets Parser
//!
//! This crate turns raw declarations into validated sets: the public
//! newline-delimited list, enterprise Overrides policies, the manual set flag,
//! and the flat format used to persist sets across restarts.

pub mod error;
pub mod parser;
pub mod persisted;

pub use error::{ParseError, PolicyParsingError, SetType};
pub use parser::{
    parse_manually_specified_set, parse_sets_from_bytes, parse_sets_from_enterprise_policy, parse_sets_from_stream,
    parse_single_set,
};
pub use persisted::{deserialize_first_party_sets, serialize_first_party_sets};
