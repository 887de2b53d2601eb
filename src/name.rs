//! Domain name helpers.
//!
//! Names handled by this crate are plain strings. Zone names and fully
//! qualified names are compared case-insensitively and kept in a canonical
//! form: lower case with a terminating dot. Node names are kept lower case
//! without the terminating dot, with the zone apex represented by
//! [`APEX`].

use std::string::String;

//------------ Constants -----------------------------------------------------

/// The node name used for the apex of a zone.
pub const APEX: &str = "@";

//------------ Canonical forms -----------------------------------------------

/// Returns the canonical form of a fully qualified name.
///
/// Surrounding white space is removed, the name is lower cased and a
/// terminating dot is appended if missing. The empty name becomes the root
/// name `"."`.
pub fn normalize_fqdn(name: &str) -> String {
    let name = name.trim().trim_end_matches('.');
    let mut res = name.to_ascii_lowercase();
    res.push('.');
    res
}

/// Returns the canonical form of a node name relative to its zone.
///
/// Empty names and the root name map to [`APEX`].
pub fn normalize_label(name: &str) -> String {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() || name == APEX {
        APEX.into()
    } else {
        name.to_ascii_lowercase()
    }
}

/// Returns the name without its terminating dot.
pub fn strip_root(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

/// Returns whether the name consists of more than one label.
pub fn is_multi_label(name: &str) -> bool {
    strip_root(name.trim()).contains('.')
}

/// Returns the left-most label of a name.
pub fn first_label(name: &str) -> &str {
    let name = strip_root(name);
    match name.find('.') {
        Some(pos) => &name[..pos],
        None => name,
    }
}

/// Returns an iterator over the labels of a name from the root down.
///
/// The root label itself is not included.
pub fn labels_from_root(name: &str) -> impl Iterator<Item = &str> {
    strip_root(name).rsplit('.').filter(|label| !label.is_empty())
}

/// Compares two names for equality ignoring case and a terminating dot.
pub fn eq_ignore_case(left: &str, right: &str) -> bool {
    strip_root(left.trim()).eq_ignore_ascii_case(strip_root(right.trim()))
}

//============ Testing =======================================================
