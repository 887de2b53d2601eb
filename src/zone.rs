//! Zones.

use std::fmt;
use std::net::IpAddr;
use std::string::String;

use chrono::{DateTime, Utc};
use ipnet::IpNet;

use crate::codec;
use crate::error::Error;
use crate::name;

//------------ ZoneKind ------------------------------------------------------

/// Whether a zone is keyed by host names or by address prefix.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "UPPERCASE")
)]
pub enum ZoneKind {
    /// A zone mapping host names to records.
    Forward,

    /// A zone mapping addresses of a network to PTR records.
    Reverse,
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneKind::Forward => f.write_str("forward"),
            ZoneKind::Reverse => f.write_str("reverse"),
        }
    }
}

//------------ Zone ----------------------------------------------------------

/// A single DNS zone.
///
/// Zones are identified by their name, which is case-insensitive and kept
/// in canonical form (see [`name::normalize_fqdn`]). A reverse zone always
/// knows the network it covers. The timestamps are assigned by the record
/// store and are never set by clients.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Zone {
    name: String,
    kind: ZoneKind,
    #[cfg_attr(feature = "serde", serde(default))]
    network: Option<IpNet>,
    #[cfg_attr(feature = "serde", serde(default))]
    is_default: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    created_at: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "serde", serde(default))]
    modified_at: Option<DateTime<Utc>>,
}

impl Zone {
    /// Creates a forward zone.
    pub fn forward(name: &str) -> Self {
        Zone {
            name: name::normalize_fqdn(name),
            kind: ZoneKind::Forward,
            network: None,
            is_default: false,
            created_at: None,
            modified_at: None,
        }
    }

    /// Creates a reverse zone for a network using its conventional name.
    pub fn reverse(network: IpNet) -> Self {
        let network = network.trunc();
        Self::reverse_named(&codec::reverse_zone_name(&network), network)
    }

    /// Creates a reverse zone with an explicit name.
    pub fn reverse_named(name: &str, network: IpNet) -> Self {
        Zone {
            name: name::normalize_fqdn(name),
            kind: ZoneKind::Reverse,
            network: Some(network.trunc()),
            is_default: false,
            created_at: None,
            modified_at: None,
        }
    }

    /// Creates a reverse zone, deriving the network from the zone name.
    ///
    /// The name must have the form `<labels>.in-addr.arpa.` or
    /// `<labels>.ip6.arpa.`, optionally with an RFC 2317 style range as
    /// its left-most label.
    pub fn reverse_from_name(name: &str) -> Result<Self, Error> {
        let network = codec::network_from_reverse_zone_name(name)?;
        Ok(Self::reverse_named(name, network))
    }

    /// Marks the zone as the default zone of its kind.
    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Sets the store assigned timestamps.
    pub fn with_timestamps(
        mut self,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        self.created_at = Some(created_at);
        self.modified_at = Some(modified_at);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ZoneKind {
        self.kind
    }

    pub fn is_forward(&self) -> bool {
        self.kind == ZoneKind::Forward
    }

    pub fn is_reverse(&self) -> bool {
        self.kind == ZoneKind::Reverse
    }

    /// The network covered by a reverse zone.
    pub fn network(&self) -> Option<&IpNet> {
        self.network.as_ref()
    }

    /// The prefix length of a reverse zone's network.
    pub fn prefix_len(&self) -> Option<u8> {
        self.network.as_ref().map(IpNet::prefix_len)
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_at
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.modified_at = Some(now);
    }

    /// Returns whether a reverse zone covers the given address.
    pub fn contains_addr(&self, addr: IpAddr) -> bool {
        self.network
            .as_ref()
            .map(|net| net.contains(&addr))
            .unwrap_or(false)
    }

    /// Returns whether the networks of two reverse zones overlap.
    pub fn overlaps(&self, other: &Zone) -> bool {
        match (&self.network, &other.network) {
            (Some(left), Some(right)) => {
                left.contains(&right.network())
                    || right.contains(&left.network())
            }
            _ => false,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.network {
            Some(net) => write!(f, "{} ({})", self.name, net),
            None => f.write_str(&self.name),
        }
    }
}

//============ Testing =======================================================
