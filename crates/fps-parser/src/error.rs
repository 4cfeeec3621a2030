//! Parse error taxonomy.

use std::fmt;

/// Why a single set declaration was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ParseError {
    #[error("invalid type")]
    InvalidType,
    #[error("invalid origin")]
    InvalidOrigin,
    #[error("singleton set")]
    SingletonSet,
    #[error("non-disjoint sets")]
    NonDisjointSets,
    #[error("repeated domain")]
    RepeatedDomain,
}

/// Which list of an Overrides policy a set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetType {
    Replacement,
    Addition,
}

impl SetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replacement => "replacement",
            Self::Addition => "addition",
        }
    }
}

impl fmt::Display for SetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First error found in an Overrides policy, with its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("{set_type} set #{error_index}: {error}")]
pub struct PolicyParsingError {
    pub error: ParseError,
    pub set_type: SetType,
    pub error_index: usize,
}

impl PolicyParsingError {
    pub fn new(error: ParseError, set_type: SetType, error_index: usize) -> Self {
        Self {
            error,
            set_type,
            error_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_error_display_names_location() {
        let error = PolicyParsingError::new(ParseError::NonDisjointSets, SetType::Addition, 2);
        assert_eq!(error.to_string(), "addition set #2: non-disjoint sets");
    }
}
