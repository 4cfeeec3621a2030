use std::borrow::Cow;
use std::collections::HashSet;

use fps_core::{Aliases, GlobalSets, ParsedPolicySetLists, SetsMap, SingleSet, Site, SiteIndex};
use serde_json::Value;

use crate::error::{ParseError, PolicyParsingError, SetType};

pub const OWNER_FIELD: &str = "owner";
pub const MEMBERS_FIELD: &str = "members";
pub const CCTLDS_FIELD: &str = "ccTLDs";
pub const REPLACEMENTS_FIELD: &str = "replacements";
pub const ADDITIONS_FIELD: &str = "additions";

/// Parse one `{"owner", "members", "ccTLDs"}` declaration.
///
/// `running_elements` holds every site accepted by earlier declarations in the
/// same batch; it is only extended when this declaration is accepted.
pub fn parse_single_set(
    declaration: &Value,
    keep_indices: bool,
    running_elements: &mut HashSet<Site>,
) -> Result<(SingleSet, Aliases), ParseError> {
    let object = declaration.as_object().ok_or(ParseError::InvalidType)?;
    let owner_value = object
        .get(OWNER_FIELD)
        .and_then(Value::as_str)
        .ok_or(ParseError::InvalidType)?;
    let member_values = object
        .get(MEMBERS_FIELD)
        .and_then(Value::as_array)
        .ok_or(ParseError::InvalidType)?;

    let owner = canonicalize(owner_value)?;
    if running_elements.contains(&owner) {
        return Err(ParseError::NonDisjointSets);
    }
    if member_values.is_empty() {
        return Err(ParseError::SingletonSet);
    }

    let no_aliases = Aliases::new();
    let mut set = SingleSet::new(owner);
    for (index, member_value) in member_values.iter().enumerate() {
        let member = parse_site(member_value)?;
        check_new_site(&member, &set, &no_aliases, running_elements)?;
        let index = keep_indices.then(|| SiteIndex(index as u32));
        set.insert_member(member, index);
    }

    let aliases = match object.get(CCTLDS_FIELD) {
        Some(cctlds) => parse_cctld_aliases(cctlds, &set, running_elements)?,
        None => Aliases::new(),
    };

    for site in set.sites().chain(aliases.keys()) {
        let inserted = running_elements.insert(site.clone());
        debug_assert!(inserted, "{site} passed the disjointness check twice");
    }

    Ok((set, aliases))
}

fn parse_cctld_aliases(
    cctlds: &Value,
    set: &SingleSet,
    running_elements: &HashSet<Site>,
) -> Result<Aliases, ParseError> {
    let mut aliases = Aliases::new();
    let cctlds = cctlds.as_object().ok_or(ParseError::InvalidType)?;

    for (site_value, alias_values) in cctlds {
        let canonical = match Site::canonicalize(site_value, false) {
            Ok(site) if set.contains(&site) => site,
            _ => {
                log::debug!("ignoring ccTLD aliases for {site_value:?}: not in the set of {}", set.owner());
                continue;
            }
        };
        let alias_values = alias_values.as_array().ok_or(ParseError::InvalidType)?;
        let label = canonical.registrable_label();

        for alias_value in alias_values {
            let alias = parse_site(alias_value)?;
            check_new_site(&alias, set, &aliases, running_elements)?;
            if label.is_some() && alias.registrable_label() == label {
                aliases.insert(alias, canonical.clone());
            } else {
                log::debug!("dropping alias {alias} of {canonical}: differs in more than its TLD");
            }
        }
    }

    Ok(aliases)
}

fn check_new_site(
    site: &Site,
    set: &SingleSet,
    aliases: &Aliases,
    running_elements: &HashSet<Site>,
) -> Result<(), ParseError> {
    if set.contains(site) || aliases.contains_key(site) {
        return Err(ParseError::RepeatedDomain);
    }
    if running_elements.contains(site) {
        return Err(ParseError::NonDisjointSets);
    }
    Ok(())
}

fn parse_site(value: &Value) -> Result<Site, ParseError> {
    let origin = value.as_str().ok_or(ParseError::InvalidType)?;
    canonicalize(origin)
}

fn canonicalize(origin: &str) -> Result<Site, ParseError> {
    Site::canonicalize(origin, true).map_err(|_| ParseError::InvalidOrigin)
}

// =============================================================================
// Public Sets Stream
// =============================================================================

/// Parse the newline-delimited public sets list.
///
/// Lines that are not JSON, or that name an origin which no longer
/// canonicalizes, are skipped. Any other error discards the whole list.
pub fn parse_sets_from_stream(text: &str) -> GlobalSets {
    let mut running_elements = HashSet::new();
    let mut sets = SetsMap::new();
    let mut aliases = Aliases::new();

    for (line_number, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let declaration: Value = match serde_json::from_str(&strip_trailing_commas(line)) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("skipping line {}: {e}", line_number + 1);
                continue;
            }
        };

        match parse_single_set(&declaration, true, &mut running_elements) {
            Ok((set, set_aliases)) => {
                for (alias, canonical) in &set_aliases {
                    if let Some(entry) = set.get(canonical) {
                        sets.insert(alias.clone(), entry.clone());
                    }
                }
                sets.extend(set.iter().map(|(site, entry)| (site.clone(), entry.clone())));
                aliases.extend(set_aliases);
            }
            Err(ParseError::InvalidOrigin) => {
                log::debug!("skipping line {}: invalid origin", line_number + 1);
            }
            Err(e) => {
                log::warn!("discarding public sets: line {}: {e}", line_number + 1);
                return GlobalSets::default();
            }
        }
    }

    log::debug!("parsed {} public set entries and {} aliases", sets.len(), aliases.len());
    GlobalSets::new(sets, aliases)
}

/// Parse raw component bytes; invalid UTF-8 is replaced rather than rejected.
pub fn parse_sets_from_bytes(bytes: &[u8]) -> GlobalSets {
    parse_sets_from_stream(&String::from_utf8_lossy(bytes))
}

/// Remove commas that directly precede `]` or `}` outside of strings.
fn strip_trailing_commas(line: &str) -> Cow<'_, str> {
    if !line.contains(',') {
        return Cow::Borrowed(line);
    }

    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    Cow::Owned(out)
}

// =============================================================================
// Enterprise Policy
// =============================================================================

/// Parse an Overrides policy document.
///
/// Both lists share one disjointness check. The first error anywhere rejects
/// the whole document.
pub fn parse_sets_from_enterprise_policy(policy: &Value) -> Result<ParsedPolicySetLists, PolicyParsingError> {
    let object = policy
        .as_object()
        .ok_or_else(|| PolicyParsingError::new(ParseError::InvalidType, SetType::Replacement, 0))?;

    let mut running_elements = HashSet::new();
    let replacements = parse_policy_list(object.get(REPLACEMENTS_FIELD), SetType::Replacement, &mut running_elements)?;
    let additions = parse_policy_list(object.get(ADDITIONS_FIELD), SetType::Addition, &mut running_elements)?;

    Ok(ParsedPolicySetLists {
        replacements,
        additions,
    })
}

fn parse_policy_list(
    value: Option<&Value>,
    set_type: SetType,
    running_elements: &mut HashSet<Site>,
) -> Result<Vec<SingleSet>, PolicyParsingError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let declarations = value
        .as_array()
        .ok_or_else(|| PolicyParsingError::new(ParseError::InvalidType, set_type, 0))?;

    declarations
        .iter()
        .enumerate()
        .map(|(index, declaration)| {
            let (mut set, aliases) = parse_single_set(declaration, false, running_elements)
                .map_err(|error| PolicyParsingError::new(error, set_type, index))?;
            // Policy sets carry their aliases as ordinary members.
            for alias in aliases.into_keys() {
                set.insert_member(alias, None);
            }
            Ok(set)
        })
        .collect()
}

// =============================================================================
// Manual Set
// =============================================================================

/// Parse the comma-separated manual set flag: owner first, then members.
///
/// Invalid and repeated origins are skipped. Returns `None` when no valid
/// member remains.
pub fn parse_manually_specified_set(flag_value: &str) -> Option<SingleSet> {
    let mut origins = flag_value.split(',').map(str::trim).filter(|origin| !origin.is_empty());
    let owner = Site::canonicalize(origins.next()?, true).ok()?;

    let mut set = SingleSet::new(owner);
    for origin in origins {
        if let Ok(site) = Site::canonicalize(origin, true) {
            if !set.insert_member(site, None) {
                log::debug!("ignoring repeated site {origin} in manual set");
            }
        }
    }

    if set.member_count() == 0 {
        log::warn!("manual set owned by {} has no valid members", set.owner());
        return None;
    }
    Some(set)
}
