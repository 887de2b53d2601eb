//! Objects of the directory backing the DNS service.
//!
//! Zones and nodes of a directory integrated DNS service are directory
//! objects like groups and users. All of them share a distinguished name
//! and creation and modification times, kept in [`CommonAttributes`].

use std::string::String;
use std::vec::Vec;

use chrono::{DateTime, Utc};

use crate::name::{self, APEX};
use crate::record::Node;
use crate::zone::Zone;

//------------ CommonAttributes ----------------------------------------------

/// The attributes every directory object has.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct CommonAttributes {
    distinguished_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    created: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "serde", serde(default))]
    modified: Option<DateTime<Utc>>,
}

impl CommonAttributes {
    pub fn new(distinguished_name: impl Into<String>) -> Self {
        CommonAttributes {
            distinguished_name: distinguished_name.into(),
            created: None,
            modified: None,
        }
    }

    pub fn with_times(
        mut self,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Self {
        self.created = created;
        self.modified = modified;
        self
    }

    pub fn distinguished_name(&self) -> &str {
        &self.distinguished_name
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }
}

//------------ Group and User ------------------------------------------------

/// A security group.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct Group {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub sid: Option<String>,

    /// The distinguished names of the members.
    #[cfg_attr(feature = "serde", serde(default))]
    pub members: Vec<String>,
}

/// A user account.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct User {
    pub account_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub display_name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub sid: Option<String>,

    /// The distinguished names of the groups the user belongs to.
    #[cfg_attr(feature = "serde", serde(default))]
    pub member_of: Vec<String>,
}

//------------ DirectoryObject -----------------------------------------------

/// An object read from the directory.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", rename_all = "lowercase")
)]
pub enum DirectoryObject {
    Zone {
        common: CommonAttributes,
        zone: Zone,
    },
    Node {
        common: CommonAttributes,
        node: Node,
    },
    Group {
        common: CommonAttributes,
        group: Group,
    },
    User {
        common: CommonAttributes,
        user: User,
    },
}

impl DirectoryObject {
    /// Creates the object for a zone stored below `partition`.
    pub fn from_zone(zone: Zone, partition: &str) -> Self {
        let common = CommonAttributes::new(zone_dn(zone.name(), partition))
            .with_times(zone.created_at(), zone.modified_at());
        DirectoryObject::Zone { common, zone }
    }

    /// Creates the object for a node stored below `partition`.
    pub fn from_node(node: Node, partition: &str) -> Self {
        let common =
            CommonAttributes::new(node_dn(node.name(), node.zone(), partition));
        DirectoryObject::Node { common, node }
    }

    pub fn common(&self) -> &CommonAttributes {
        match self {
            DirectoryObject::Zone { common, .. }
            | DirectoryObject::Node { common, .. }
            | DirectoryObject::Group { common, .. }
            | DirectoryObject::User { common, .. } => common,
        }
    }

    pub fn distinguished_name(&self) -> &str {
        self.common().distinguished_name()
    }

    /// Returns the security identifier of a group or user.
    pub fn sid(&self) -> Option<&str> {
        match self {
            DirectoryObject::Group { group, .. } => group.sid.as_deref(),
            DirectoryObject::User { user, .. } => user.sid.as_deref(),
            _ => None,
        }
    }

    /// Returns the name of the object if its SID is a well-known one.
    pub fn well_known_name(&self) -> Option<&'static str> {
        self.sid().and_then(well_known_sid_name)
    }
}

//------------ Distinguished names -------------------------------------------

/// The container holding DNS zones within an application partition.
const DNS_CONTAINER: &str = "CN=MicrosoftDNS";

/// Returns the distinguished name of a zone.
///
/// `partition` is the distinguished name of the directory partition the
/// zone is stored in, e.g. `DC=DomainDnsZones,DC=corp,DC=example`.
pub fn zone_dn(zone: &str, partition: &str) -> String {
    let zone = name::strip_root(zone.trim());
    let zone = if zone.is_empty() { "." } else { zone };
    format!("DC={},{DNS_CONTAINER},{partition}", escape_rdn(zone))
}

/// Returns the distinguished name of a node of a zone.
///
/// The apex node is stored as [`APEX`].
pub fn node_dn(node: &str, zone: &str, partition: &str) -> String {
    let node = name::normalize_label(node);
    format!("DC={},{}", escape_rdn(&node), zone_dn(zone, partition))
}

/// Escapes the special characters of an attribute value.
fn escape_rdn(value: &str) -> String {
    let mut res = String::with_capacity(value.len());
    for (idx, ch) in value.chars().enumerate() {
        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                res.push('\\');
                res.push(ch);
            }
            '#' | ' ' if idx == 0 => {
                res.push('\\');
                res.push(ch);
            }
            _ => res.push(ch),
        }
    }
    res
}

//------------ Well-known SIDs -----------------------------------------------

/// SIDs with a fixed value.
const FIXED_SIDS: &[(&str, &str)] = &[
    ("S-1-0-0", "Nobody"),
    ("S-1-1-0", "Everyone"),
    ("S-1-2-0", "Local"),
    ("S-1-3-0", "Creator Owner"),
    ("S-1-3-1", "Creator Group"),
    ("S-1-5-2", "Network"),
    ("S-1-5-4", "Interactive"),
    ("S-1-5-6", "Service"),
    ("S-1-5-7", "Anonymous Logon"),
    ("S-1-5-9", "Enterprise Domain Controllers"),
    ("S-1-5-10", "Principal Self"),
    ("S-1-5-11", "Authenticated Users"),
    ("S-1-5-18", "Local System"),
    ("S-1-5-19", "Local Service"),
    ("S-1-5-20", "Network Service"),
    ("S-1-5-32-544", "Administrators"),
    ("S-1-5-32-545", "Users"),
    ("S-1-5-32-546", "Guests"),
    ("S-1-5-32-547", "Power Users"),
    ("S-1-5-32-548", "Account Operators"),
    ("S-1-5-32-549", "Server Operators"),
    ("S-1-5-32-550", "Print Operators"),
    ("S-1-5-32-551", "Backup Operators"),
    ("S-1-5-32-552", "Replicator"),
    ("S-1-5-32-554", "Pre-Windows 2000 Compatible Access"),
    ("S-1-5-32-555", "Remote Desktop Users"),
];

/// Relative identifiers with a fixed meaning within every domain.
const DOMAIN_RIDS: &[(u32, &str)] = &[
    (500, "Administrator"),
    (501, "Guest"),
    (502, "krbtgt"),
    (512, "Domain Admins"),
    (513, "Domain Users"),
    (514, "Domain Guests"),
    (515, "Domain Computers"),
    (516, "Domain Controllers"),
    (517, "Cert Publishers"),
    (518, "Schema Admins"),
    (519, "Enterprise Admins"),
    (520, "Group Policy Creator Owners"),
    (521, "Read-only Domain Controllers"),
    (553, "RAS and IAS Servers"),
];

/// The prefix of SIDs relative to a domain.
const DOMAIN_PREFIX: [&str; 4] = ["S", "1", "5", "21"];

/// Returns the name of a well-known SID.
///
/// Domain SIDs of the form `S-1-5-21-a-b-c-rid` are well-known if their
/// relative identifier is.
pub fn well_known_sid_name(sid: &str) -> Option<&'static str> {
    let sid = sid.trim();
    if let Some((_, name)) = FIXED_SIDS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(sid))
    {
        return Some(name);
    }

    let parts: Vec<_> = sid.split('-').collect();
    if parts.len() != 8
        || !parts[..4]
            .iter()
            .zip(DOMAIN_PREFIX)
            .all(|(part, prefix)| part.eq_ignore_ascii_case(prefix))
    {
        return None;
    }
    let mut sub = parts[4..].iter().map(|part| part.parse::<u32>());
    let domain_ok = sub.by_ref().take(3).all(|part| part.is_ok());
    let rid = sub.next()?.ok()?;
    if !domain_ok {
        return None;
    }
    DOMAIN_RIDS
        .iter()
        .find(|(known, _)| *known == rid)
        .map(|(_, name)| *name)
}

//============ Testing =======================================================
