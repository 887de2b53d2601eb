//! Sorted and paginated views of zones, nodes, records and leases.
//!
//! All listings follow the same pipeline: collect, deduplicate, attach
//! leases, apply the unknown record filter, sort and slice. Sorting is
//! stable and nodes enter it ordered by name, so nodes with equal sort
//! keys are always returned in name order. Consecutive pages of the same
//! listing therefore partition the full result without gaps or repeats.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::net::IpAddr;
use std::string::{String, ToString};
use std::sync::Arc;
use std::vec::Vec;

use chrono::{DateTime, Utc};
use futures_util::future::{join, join_all};
use tracing::{debug, trace};

use crate::catalog::ZoneCatalog;
use crate::config::Config;
use crate::correlate::{self, AddMode, UnknownFilter};
use crate::error::{Error, NotFound, StoreError};
use crate::lease::{self, normalize_mac, DhcpLease, LeaseSource};
use crate::name;
use crate::record::{Node, Record};
use crate::store::RecordStore;
use crate::sync::relative_name;
use crate::zone::{Zone, ZoneKind};

//------------ PageRequest ---------------------------------------------------

/// Which page of a result to return.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageRequest {
    /// The zero based page number.
    page: usize,

    /// The number of items per page.
    size: usize,
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        PageRequest { page, size }
    }

    pub fn first(size: usize) -> Self {
        Self::new(0, size)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The index of the first item of the page.
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    /// Returns the request for the following page.
    pub fn next(&self) -> Self {
        Self::new(self.page.saturating_add(1), self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(20)
    }
}

//------------ Page ----------------------------------------------------------

/// One page of a sorted result.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Page<T> {
    items: Vec<T>,
    page: usize,
    size: usize,

    /// The number of items in the full result.
    total: usize,
}

impl<T> Page<T> {
    /// Cuts a page out of a complete, sorted result.
    pub fn from_sorted(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len();
        let items = items
            .into_iter()
            .skip(request.offset())
            .take(request.size())
            .collect();
        Page {
            items,
            page: request.page(),
            size: request.size(),
            total,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// The number of pages needed for the full result.
    pub fn total_pages(&self) -> usize {
        if self.size == 0 {
            0
        } else {
            (self.total + self.size - 1) / self.size
        }
    }

    pub fn is_last(&self) -> bool {
        self.page.saturating_add(1) >= self.total_pages()
    }

    pub fn map<U>(self, op: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(op).collect(),
            page: self.page,
            size: self.size,
            total: self.total,
        }
    }
}

//------------ Sort ----------------------------------------------------------

/// What to sort a listing by.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum SortKey {
    #[default]
    NodeName,
    ZoneName,
    RecordCount,
}

/// A sort order.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sort {
    key: SortKey,
    #[cfg_attr(feature = "serde", serde(default))]
    descending: bool,
}

impl Sort {
    pub fn new(key: SortKey, descending: bool) -> Self {
        Sort { key, descending }
    }

    pub fn ascending(key: SortKey) -> Self {
        Self::new(key, false)
    }

    pub fn descending(key: SortKey) -> Self {
        Self::new(key, true)
    }

    pub fn key(&self) -> SortKey {
        self.key
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    fn directed(&self, order: Ordering) -> Ordering {
        if self.descending {
            order.reverse()
        } else {
            order
        }
    }

    /// Sorts nodes by this order.
    ///
    /// Nodes are first put in name order, then stably sorted by the key.
    pub fn sort_nodes(&self, nodes: &mut [Node]) {
        nodes.sort_by(|left, right| natural_node_order(left, right));
        match self.key {
            SortKey::NodeName => {
                if self.descending {
                    nodes.reverse()
                }
            }
            SortKey::ZoneName => nodes.sort_by(|left, right| {
                self.directed(left.zone().cmp(right.zone()))
            }),
            SortKey::RecordCount => nodes.sort_by(|left, right| {
                self.directed(left.len().cmp(&right.len()))
            }),
        }
    }

    /// Sorts zones by name.
    ///
    /// Zones have no node name or record count, so every key sorts by
    /// zone name and only the direction applies.
    pub fn sort_zones(&self, zones: &mut [Zone]) {
        zones.sort_by(|left, right| self.directed(left.name().cmp(right.name())))
    }
}

fn natural_node_order(left: &Node, right: &Node) -> Ordering {
    left.name()
        .cmp(right.name())
        .then_with(|| left.zone().cmp(right.zone()))
}

//------------ ListOptions ---------------------------------------------------

/// How to shape a listing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListOptions {
    /// A free text filter.
    #[cfg_attr(feature = "serde", serde(default))]
    query: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    unknown_filter: UnknownFilter,
    #[cfg_attr(feature = "serde", serde(default))]
    add_mode: AddMode,
    #[cfg_attr(feature = "serde", serde(default))]
    page: PageRequest,
    #[cfg_attr(feature = "serde", serde(default))]
    sort: Sort,

    /// The evaluation time for lease activity. Defaults to now.
    #[cfg_attr(feature = "serde", serde(skip))]
    now: Option<DateTime<Utc>>,
}

impl ListOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_unknown_filter(mut self, filter: UnknownFilter) -> Self {
        self.unknown_filter = filter;
        self
    }

    pub fn with_add_mode(mut self, mode: AddMode) -> Self {
        self.add_mode = mode;
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn unknown_filter(&self) -> UnknownFilter {
        self.unknown_filter
    }

    pub fn add_mode(&self) -> AddMode {
        self.add_mode
    }

    pub fn page(&self) -> PageRequest {
        self.page
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }
}

//------------ QueryTerm -----------------------------------------------------

/// A classified search term.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QueryTerm {
    Address(IpAddr),

    /// A MAC address in canonical form and the term as text.
    Mac { mac: String, text: String },
    Text(String),
}

impl QueryTerm {
    /// Classifies a search term.
    ///
    /// A term is an address if it parses as one, else a MAC address if it
    /// has the form of one, else free text.
    pub fn classify(term: &str) -> Self {
        let term = term.trim();
        if let Ok(addr) = term.parse::<IpAddr>() {
            QueryTerm::Address(addr)
        } else if let Some(mac) = normalize_mac(term) {
            QueryTerm::Mac {
                mac,
                text: term.to_ascii_lowercase(),
            }
        } else {
            QueryTerm::Text(term.to_ascii_lowercase())
        }
    }
}

//------------ QueryEngine ---------------------------------------------------

/// Answers read requests.
#[derive(Clone, Debug)]
pub struct QueryEngine {
    store: Arc<dyn RecordStore>,
    catalog: Arc<ZoneCatalog>,
    leases: Arc<dyn LeaseSource>,
    config: Config,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        catalog: Arc<ZoneCatalog>,
        leases: Arc<dyn LeaseSource>,
        config: Config,
    ) -> Self {
        QueryEngine {
            store,
            catalog,
            leases,
            config,
        }
    }

    /// Searches all zones for nodes matching a term.
    ///
    /// An address finds its reverse node and the forward nodes with an
    /// address record for it. A MAC address finds the forward nodes named
    /// by the host names of its leases; if there are none, the term is
    /// searched as text. Text matches node names and record values.
    pub async fn query(
        &self,
        term: &str,
        options: &ListOptions,
    ) -> Result<Page<Node>, Error> {
        let term = QueryTerm::classify(term);
        trace!("Query for {term:?}");
        let add_mode = options.add_mode();

        let (nodes, leases) = match term {
            QueryTerm::Address(addr) => {
                join(self.nodes_for_address(addr), self.leases_for(add_mode))
                    .await
            }
            QueryTerm::Mac { mac, text } => {
                let leases = lease::load_leases(
                    self.leases.as_ref(),
                    self.include_expired(add_mode),
                )
                .await;
                let nodes = match self.nodes_for_mac(&mac, &leases).await? {
                    nodes if nodes.is_empty() => {
                        debug!("No lease nodes for {mac}, searching as text");
                        self.nodes_for_text(&text).await
                    }
                    nodes => Ok(nodes),
                };
                let leases = match add_mode {
                    AddMode::None => Vec::new(),
                    _ => leases,
                };
                (nodes, leases)
            }
            QueryTerm::Text(text) => {
                join(self.nodes_for_text(&text), self.leases_for(add_mode))
                    .await
            }
        };
        Ok(self.shape_nodes(nodes?, &leases, options))
    }

    /// Returns the zones, optionally of one kind, matching a text query.
    pub fn list_zones(
        &self,
        kind: Option<ZoneKind>,
        options: &ListOptions,
    ) -> Page<Zone> {
        let query = options
            .query()
            .map(|query| query.trim().trim_end_matches('.').to_ascii_lowercase());
        let mut zones: Vec<Zone> = self
            .catalog
            .list_zones(kind)
            .into_iter()
            .filter(|zone| match &query {
                Some(query) => zone.name().contains(query.as_str()),
                None => true,
            })
            .collect();
        options.sort().sort_zones(&mut zones);
        Page::from_sorted(zones, options.page())
    }

    /// Returns the nodes of a zone.
    pub async fn list_nodes(
        &self,
        zone: &str,
        options: &ListOptions,
    ) -> Result<Page<Node>, Error> {
        let zone = self.zone(zone)?;
        let (nodes, leases) = join(
            self.store.list_nodes(zone.name(), options.query()),
            self.leases_for(options.add_mode()),
        )
        .await;
        Ok(self.shape_nodes(nodes?, &leases, options))
    }

    /// Returns the records of a node in record order.
    ///
    /// The sort direction applies, the sort key does not.
    pub async fn list_records(
        &self,
        zone: &str,
        node: &str,
        options: &ListOptions,
    ) -> Result<Page<Record>, Error> {
        let zone = self.zone(zone)?;
        let node = relative_name(node, zone.name())?;
        let (node, leases) = join(
            self.store.get_node(zone.name(), &node),
            self.leases_for(options.add_mode()),
        )
        .await;
        let records = node?.into_records().into_iter().collect();
        let records = correlate::correlate(
            records,
            &leases,
            options.add_mode(),
            options.now(),
        );
        let mut records =
            correlate::apply_unknown_filter(records, options.unknown_filter());
        if options.sort().is_descending() {
            records.reverse();
        }
        Ok(Page::from_sorted(records, options.page()))
    }

    /// Returns the leases ordered by address and begin.
    ///
    /// With `active_only` only leases active at the evaluation time of the
    /// options are returned. A text query filters by MAC address, host name
    /// or address.
    pub async fn list_leases(
        &self,
        active_only: bool,
        options: &ListOptions,
    ) -> Page<Arc<DhcpLease>> {
        let now = options.now();
        let query = options.query().map(|query| query.trim().to_ascii_lowercase());
        let mut leases: Vec<_> =
            lease::load_leases(self.leases.as_ref(), !active_only)
                .await
                .into_iter()
                .filter(|lease| !active_only || lease.is_active(now))
                .filter(|lease| match &query {
                    Some(query) => lease_matches_text(lease, query),
                    None => true,
                })
                .collect();
        leases.sort_by(|left, right| {
            left.ip()
                .cmp(&right.ip())
                .then_with(|| left.begin().cmp(&right.begin()))
        });
        if options.sort().is_descending() {
            leases.reverse();
        }
        Page::from_sorted(leases, options.page())
    }

    /// Deduplicates, correlates, filters, sorts and pages nodes.
    fn shape_nodes(
        &self,
        nodes: Vec<Node>,
        leases: &[Arc<DhcpLease>],
        options: &ListOptions,
    ) -> Page<Node> {
        let now = options.now();
        let filter = options.unknown_filter();
        let mut seen = HashSet::new();
        let mut nodes: Vec<Node> = nodes
            .into_iter()
            .filter(|node| {
                seen.insert((node.zone().to_string(), node.name().to_string()))
            })
            .filter_map(|mut node| {
                correlate::correlate_node(
                    &mut node,
                    leases,
                    options.add_mode(),
                    now,
                );
                correlate::filter_node(&mut node, filter);
                if node.is_empty() {
                    None
                } else {
                    Some(node)
                }
            })
            .collect();
        options.sort().sort_nodes(&mut nodes);
        Page::from_sorted(nodes, options.page())
    }

    async fn nodes_for_address(&self, addr: IpAddr) -> Result<Vec<Node>, Error> {
        let mut nodes = Vec::new();
        if let Ok((zone, label)) = self.catalog.resolve_reverse_zone(addr) {
            if let Some(node) = self.find_node(zone.name(), &label).await? {
                nodes.push(node);
            }
        }
        let forward = self.catalog.list_zones(Some(ZoneKind::Forward));
        for node in self.search_zones(&forward, None).await? {
            if node.iter().any(|record| record.addr() == Some(addr)) {
                nodes.push(node)
            }
        }
        Ok(nodes)
    }

    async fn nodes_for_mac(
        &self,
        mac: &str,
        leases: &[Arc<DhcpLease>],
    ) -> Result<Vec<Node>, Error> {
        let mut nodes = Vec::new();
        let hostnames: HashSet<&str> = leases
            .iter()
            .filter(|lease| lease.has_mac(mac))
            .filter_map(|lease| lease.hostname())
            .collect();
        for hostname in hostnames {
            if name::is_multi_label(hostname) {
                if let Ok((zone, label)) =
                    self.catalog.resolve_forward_zone(hostname)
                {
                    if let Some(node) = self.find_node(zone.name(), &label).await? {
                        nodes.push(node);
                    }
                }
            } else {
                for zone in self.catalog.list_zones(Some(ZoneKind::Forward)) {
                    if let Some(node) = self.find_node(zone.name(), hostname).await? {
                        nodes.push(node);
                    }
                }
            }
        }
        Ok(nodes)
    }

    async fn nodes_for_text(&self, text: &str) -> Result<Vec<Node>, Error> {
        let zones = self.catalog.list_zones(None);
        self.search_zones(&zones, Some(text)).await
    }

    /// Searches zones concurrently.
    ///
    /// A zone that disappeared since the catalog was loaded is skipped.
    async fn search_zones(
        &self,
        zones: &[Zone],
        text: Option<&str>,
    ) -> Result<Vec<Node>, Error> {
        let results = join_all(
            zones
                .iter()
                .map(|zone| self.store.list_nodes(zone.name(), text)),
        )
        .await;
        let mut nodes = Vec::new();
        for res in results {
            match res {
                Ok(found) => nodes.extend(found),
                Err(StoreError::NotFound(NotFound::Zone(zone))) => {
                    debug!("Zone '{zone}' vanished during search");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(nodes)
    }

    async fn find_node(
        &self,
        zone: &str,
        node: &str,
    ) -> Result<Option<Node>, Error> {
        match self.store.get_node(zone, node).await {
            Ok(node) => Ok(Some(node)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn include_expired(&self, mode: AddMode) -> bool {
        mode.needs_expired() || self.config.include_expired_leases()
    }

    /// Loads the leases needed to attach to records in the given mode.
    async fn leases_for(&self, mode: AddMode) -> Vec<Arc<DhcpLease>> {
        if mode == AddMode::None {
            return Vec::new();
        }
        lease::load_leases(self.leases.as_ref(), self.include_expired(mode))
            .await
    }

    fn zone(&self, name: &str) -> Result<Zone, Error> {
        self.catalog
            .get_zone(name)
            .ok_or_else(|| Error::zone_not_found(name::normalize_fqdn(name)))
    }
}

fn lease_matches_text(lease: &DhcpLease, query: &str) -> bool {
    lease.mac().to_ascii_lowercase().contains(query)
        || lease.ip().to_string().contains(query)
        || lease
            .hostname()
            .map(|host| host.contains(query))
            .unwrap_or(false)
}

//============ Testing =======================================================
