//! DHCP leases.
//!
//! Leases are supplied wholesale by a [`LeaseSource`] for every request and
//! are never persisted by the engine. They are attached to records by the
//! correlation engine via [`LeaseRef`].

use std::boxed::Box;
use std::fmt::{self, Debug};
use std::future::{ready, Future};
use std::net::IpAddr;
use std::pin::Pin;
use std::string::String;
use std::sync::Arc;
use std::vec::Vec;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::error::StoreError;

//------------ DhcpLease -----------------------------------------------------

/// A time-bounded binding of a MAC address to an IP address and host name.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DhcpLease {
    mac: String,
    ip: IpAddr,
    #[cfg_attr(feature = "serde", serde(default))]
    hostname: Option<String>,
    begin: DateTime<Utc>,
    #[cfg_attr(feature = "serde", serde(default))]
    end: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "serde", serde(default))]
    manufacturer: Option<String>,
}

impl DhcpLease {
    /// Creates a new lease.
    ///
    /// The MAC address is brought into canonical form if it parses and the
    /// manufacturer is derived from its OUI.
    pub fn new(
        mac: &str,
        ip: IpAddr,
        hostname: Option<&str>,
        begin: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        let mac = normalize_mac(mac).unwrap_or_else(|| mac.trim().into());
        let manufacturer = manufacturer_for_mac(&mac).map(Into::into);
        DhcpLease {
            mac,
            ip,
            hostname: hostname
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| name.trim_end_matches('.').to_ascii_lowercase()),
            begin,
            end,
            manufacturer,
        }
    }

    /// Overrides the manufacturer supplied by the lease source.
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn begin(&self) -> DateTime<Utc> {
        self.begin
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn manufacturer(&self) -> Option<&str> {
        self.manufacturer.as_deref()
    }

    /// Returns whether the lease is active at the given time.
    ///
    /// A lease is active from its begin up to but excluding its end. A lease
    /// without an end never expires.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.begin <= now && self.end.map(|end| now < end).unwrap_or(true)
    }

    /// Returns the state of the lease at the given time.
    pub fn state_at(&self, now: DateTime<Utc>) -> LeaseState {
        if now < self.begin {
            LeaseState::Pending
        } else if self.is_active(now) {
            LeaseState::Active
        } else {
            LeaseState::Expired
        }
    }

    /// Returns whether the lease is for the given MAC address.
    pub fn has_mac(&self, mac: &str) -> bool {
        match normalize_mac(mac) {
            Some(mac) => mac == self.mac,
            None => false,
        }
    }

    /// Returns whether the lease host name refers to the given name.
    ///
    /// A fully qualified lease host name must match the whole name. A bare
    /// host name matches the first label of the name.
    pub fn has_hostname(&self, fqdn: &str) -> bool {
        let Some(hostname) = self.hostname.as_deref() else {
            return false;
        };
        let fqdn = crate::name::strip_root(fqdn.trim());
        if hostname.contains('.') {
            hostname.eq_ignore_ascii_case(fqdn)
        } else {
            hostname.eq_ignore_ascii_case(crate::name::first_label(fqdn))
        }
    }
}

//------------ LeaseState ----------------------------------------------------

/// The state of a lease at evaluation time.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "UPPERCASE")
)]
pub enum LeaseState {
    /// The lease has not started yet.
    Pending,

    /// The lease is active.
    Active,

    /// The lease has ended.
    Expired,
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LeaseState::Pending => "pending",
            LeaseState::Active => "active",
            LeaseState::Expired => "expired",
        })
    }
}

//------------ LeaseRef ------------------------------------------------------

/// A lease attached to a record.
///
/// Attached leases only live as long as the result they were attached to.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeaseRef {
    lease: Arc<DhcpLease>,
    state: LeaseState,
}

impl LeaseRef {
    pub fn new(lease: Arc<DhcpLease>, state: LeaseState) -> Self {
        LeaseRef { lease, state }
    }

    pub fn lease(&self) -> &DhcpLease {
        &self.lease
    }

    pub fn state(&self) -> LeaseState {
        self.state
    }

    pub fn is_expired(&self) -> bool {
        self.state == LeaseState::Expired
    }
}

//------------ LeaseSource ---------------------------------------------------

/// The future returned by [`LeaseSource::list_leases`].
pub type LeaseFuture<'a> = Pin<
    Box<dyn Future<Output = Result<Vec<DhcpLease>, StoreError>> + Send + 'a>,
>;

/// A provider of DHCP leases.
pub trait LeaseSource: Debug + Send + Sync {
    /// Returns the current leases, including expired ones if asked to.
    fn list_leases(&self, include_expired: bool) -> LeaseFuture<'_>;
}

/// Fetches leases.
///
/// A failing lease source is logged and treated as having no leases.
pub async fn load_leases(
    source: &dyn LeaseSource,
    include_expired: bool,
) -> Vec<Arc<DhcpLease>> {
    match source.list_leases(include_expired).await {
        Ok(leases) => {
            trace!("Loaded {} leases", leases.len());
            leases.into_iter().map(Arc::new).collect()
        }
        Err(err) => {
            warn!("Lease source failed, continuing without leases: {err}");
            Vec::new()
        }
    }
}

//------------ StaticLeases --------------------------------------------------

/// A lease source serving a fixed, replaceable set of leases.
#[derive(Debug, Default)]
pub struct StaticLeases {
    leases: RwLock<Vec<DhcpLease>>,
}

impl StaticLeases {
    pub fn new(leases: impl IntoIterator<Item = DhcpLease>) -> Self {
        StaticLeases {
            leases: RwLock::new(leases.into_iter().collect()),
        }
    }

    /// Replaces the served leases.
    pub fn replace(&self, leases: impl IntoIterator<Item = DhcpLease>) {
        *self.leases.write() = leases.into_iter().collect();
    }
}

impl LeaseSource for StaticLeases {
    fn list_leases(&self, include_expired: bool) -> LeaseFuture<'_> {
        let now = Utc::now();
        let leases = self
            .leases
            .read()
            .iter()
            .filter(|lease| include_expired || lease.is_active(now))
            .cloned()
            .collect();
        Box::pin(ready(Ok(leases)))
    }
}

//------------ MAC addresses -------------------------------------------------

/// Returns the canonical form of a MAC address.
///
/// Accepts groups of hexadecimal digits separated by `:`, `-` or `.`, or an
/// unseparated string of twelve digits. The canonical form is upper case pairs
/// separated by colons. Returns `None` if the input is not a MAC address.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let mac = mac.trim();
    let digits: Vec<u8> = mac
        .bytes()
        .filter(|ch| !matches!(ch, b':' | b'-' | b'.'))
        .collect();
    if digits.len() < 4
        || digits.len() > 16
        || digits.len() % 2 != 0
        || !digits.iter().all(u8::is_ascii_hexdigit)
    {
        return None;
    }
    if digits.len() == mac.len() {
        if digits.len() != 12 {
            return None;
        }
    } else if !has_regular_groups(mac) {
        return None;
    }
    let pairs: Vec<String> = digits
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|ch| char::from(ch.to_ascii_uppercase()))
                .collect()
        })
        .collect();
    Some(pairs.join(":"))
}

fn has_regular_groups(mac: &str) -> bool {
    let Some(sep) = mac.chars().find(|ch| matches!(ch, ':' | '-' | '.'))
    else {
        return false;
    };
    let mut groups = mac.split(sep).map(str::len);
    let Some(first) = groups.next() else {
        return false;
    };
    (first == 2 || first == 4) && groups.all(|len| len == first)
}

/// Well known organizationally unique identifiers.
const OUI_TABLE: &[(&str, &str)] = &[
    ("00:05:69", "VMware"),
    ("00:0C:29", "VMware"),
    ("00:15:5D", "Microsoft"),
    ("00:16:3E", "Xensource"),
    ("00:1B:21", "Intel"),
    ("00:50:56", "VMware"),
    ("08:00:27", "PCS Systemtechnik (VirtualBox)"),
    ("3C:FD:FE", "Intel"),
    ("52:54:00", "QEMU/KVM"),
    ("B8:27:EB", "Raspberry Pi Foundation"),
    ("DC:A6:32", "Raspberry Pi Trading"),
    ("F4:5C:89", "Apple"),
];

/// Returns the manufacturer for a MAC address from its OUI.
///
/// Locally administered addresses have no manufacturer.
pub fn manufacturer_for_mac(mac: &str) -> Option<&'static str> {
    let mac = normalize_mac(mac)?;
    let first = u8::from_str_radix(mac.get(..2)?, 16).ok()?;
    if first & 0x02 != 0 {
        return None;
    }
    let oui = mac.get(..8)?;
    OUI_TABLE
        .iter()
        .find(|(prefix, _)| *prefix == oui)
        .map(|(_, name)| *name)
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn lease(begin: DateTime<Utc>, end: Option<DateTime<Utc>>) -> DhcpLease {
        DhcpLease::new(
            "aa-bb-cc-00-11-22",
            "10.0.1.5".parse().unwrap(),
            Some("WS01"),
            begin,
            end,
        )
    }

    #[test]
    fn activity_window() {
        let t0 = Utc::now();
        let lease = lease(t0, Some(t0 + Duration::seconds(3600)));
        assert!(!lease.is_active(t0 - Duration::seconds(1)));
        assert!(lease.is_active(t0));
        assert!(lease.is_active(t0 + Duration::seconds(3599)));
        assert!(!lease.is_active(t0 + Duration::seconds(3600)));
        assert_eq!(lease.state_at(t0 - Duration::seconds(1)), LeaseState::Pending);
        assert_eq!(lease.state_at(t0 + Duration::seconds(3700)), LeaseState::Expired);
    }

    #[test]
    fn unbounded_lease_never_expires() {
        let t0 = Utc::now();
        let lease = lease(t0, None);
        assert!(lease.is_active(t0 + Duration::days(10_000)));
    }

    #[test]
    fn mac_forms() {
        assert_eq!(
            normalize_mac("aa-bb-cc-00-11-22").as_deref(),
            Some("AA:BB:CC:00:11:22")
        );
        assert_eq!(
            normalize_mac("aabb.cc00.1122").as_deref(),
            Some("AA:BB:CC:00:11:22")
        );
        assert_eq!(normalize_mac("AABBCC001122").as_deref(), Some("AA:BB:CC:00:11:22"));
        assert_eq!(normalize_mac("AA:BB").as_deref(), Some("AA:BB"));
        assert_eq!(normalize_mac("host-01"), None);
        assert_eq!(normalize_mac("a:bb:cc"), None);
        assert_eq!(normalize_mac("cafe"), None);
    }

    #[test]
    fn hostnames() {
        let t0 = Utc::now();
        let lease = lease(t0, None);
        assert_eq!(lease.hostname(), Some("ws01"));
        assert!(lease.has_hostname("ws01.example.com."));
        assert!(lease.has_hostname("WS01"));
        assert!(!lease.has_hostname("ws02.example.com."));
        assert!(lease.has_mac("AA:BB:CC:00:11:22"));
    }

    #[test]
    fn manufacturers() {
        assert_eq!(manufacturer_for_mac("00:50:56:01:02:03"), Some("VMware"));
        assert_eq!(manufacturer_for_mac("02:50:56:01:02:03"), None);
        assert_eq!(manufacturer_for_mac("00:00:00:01:02:03"), None);
    }

    #[tokio::test]
    async fn static_source_filters_expired() {
        let now = Utc::now();
        let source = StaticLeases::new([
            lease(now - Duration::hours(2), Some(now - Duration::hours(1))),
            lease(now - Duration::hours(1), None),
        ]);
        assert_eq!(source.list_leases(true).await.unwrap().len(), 2);
        assert_eq!(load_leases(&source, false).await.len(), 1);
    }
}
