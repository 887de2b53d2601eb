//! The operations offered to callers.
//!
//! A [`DnsService`] bundles a [`Synchronizer`] for writes and a
//! [`QueryEngine`] for reads over the same store and zone catalog and
//! applies the defaults of a [`Config`] to every request.

use std::string::String;
use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::catalog::ZoneCatalog;
use crate::config::Config;
use crate::error::Error;
use crate::lease::{DhcpLease, LeaseSource};
use crate::query::{ListOptions, Page, PageRequest, QueryEngine};
use crate::record::{Node, Record, RecordType};
use crate::store::RecordStore;
use crate::sync::{
    Action, Deadline, RecordRequest, Synchronizer, UpdateRequest, WriteReport,
};
use crate::zone::{Zone, ZoneKind};

//------------ DnsService ----------------------------------------------------

#[derive(Clone, Debug)]
pub struct DnsService {
    sync: Synchronizer,
    query: QueryEngine,
    config: Config,
}

impl DnsService {
    /// Creates a service with an empty zone catalog.
    ///
    /// Call [`refresh_catalog()`][Self::refresh_catalog] before use unless
    /// the store starts out empty.
    pub fn new(
        store: Arc<dyn RecordStore>,
        leases: Arc<dyn LeaseSource>,
        config: Config,
    ) -> Self {
        let catalog = Arc::new(ZoneCatalog::new());
        DnsService {
            sync: Synchronizer::new(store.clone(), catalog.clone()),
            query: QueryEngine::new(store, catalog, leases, config.clone()),
            config,
        }
    }

    /// Creates a service and loads the zone catalog from the store.
    pub async fn open(
        store: Arc<dyn RecordStore>,
        leases: Arc<dyn LeaseSource>,
        config: Config,
    ) -> Result<Self, Error> {
        let service = Self::new(store, leases, config);
        service.refresh_catalog().await?;
        Ok(service)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<ZoneCatalog> {
        self.sync.catalog()
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    pub fn query_engine(&self) -> &QueryEngine {
        &self.query
    }

    /// Returns list options carrying the configured defaults.
    pub fn list_options(&self) -> ListOptions {
        ListOptions::new()
            .with_add_mode(self.config.add_mode())
            .with_unknown_filter(self.config.unknown_filter())
            .with_page(PageRequest::first(self.config.page_size(None)))
    }

    /// Returns a record request mirroring as configured.
    pub fn record_request(
        &self,
        action: Action,
        name: &str,
        rtype: RecordType,
        data: &str,
    ) -> RecordRequest {
        RecordRequest::new(action, name, rtype, data)
            .with_mirror_reverse(self.config.mirror_reverse())
    }

    fn deadline(&self) -> Deadline {
        Deadline::from_timeout(self.config.operation_timeout())
    }

    /// Caps the page size of the options.
    fn limit(&self, options: &ListOptions) -> ListOptions {
        let page = options.page();
        options.clone().with_page(PageRequest::new(
            page.page(),
            self.config.page_size(Some(page.size())),
        ))
    }

    //--- Zones

    pub async fn create_zone(&self, zone: Zone) -> Result<Zone, Error> {
        self.sync.create_zone(zone, self.deadline()).await
    }

    pub async fn delete_zone(&self, zone: &str) -> Result<(), Error> {
        self.sync.delete_zone(zone, self.deadline()).await
    }

    pub fn list_zones(
        &self,
        kind: Option<ZoneKind>,
        options: &ListOptions,
    ) -> Page<Zone> {
        self.query.list_zones(kind, &self.limit(options))
    }

    /// Reloads the zone catalog from the store.
    pub async fn refresh_catalog(&self) -> Result<usize, Error> {
        self.catalog().refresh(self.sync.store().as_ref()).await
    }

    /// Reloads the zone catalog periodically.
    ///
    /// Zones created or deleted directly in the backend become visible this
    /// way. A failed reload keeps the previous catalog. The returned future
    /// never completes.
    pub async fn run_refresh(&self) {
        let mut timer = interval(self.config.refresh_interval());
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            timer.tick().await;
            match self.refresh_catalog().await {
                Ok(count) => debug!("Periodic refresh loaded {count} zones"),
                Err(err) => warn!("Periodic catalog refresh failed: {err}"),
            }
        }
    }

    //--- Records

    /// Creates or deletes a record and its mirror.
    pub async fn create_or_delete_record(
        &self,
        request: &RecordRequest,
    ) -> Result<WriteReport, Error> {
        self.sync.apply_record(request, self.deadline()).await
    }

    /// Replaces the data of a record and its mirror.
    pub async fn update_record(
        &self,
        request: &UpdateRequest,
    ) -> Result<WriteReport, Error> {
        self.sync.apply_update(request, self.deadline()).await
    }

    //--- Nodes

    pub async fn get_node(&self, zone: &str, name: &str) -> Result<Node, Error> {
        self.sync.get_node(zone, name).await
    }

    pub async fn save_node(
        &self,
        zone: &str,
        name: &str,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<Option<Node>, Error> {
        self.sync
            .save_node(zone, name, records, self.deadline())
            .await
    }

    pub async fn delete_node(&self, zone: &str, name: &str) -> Result<(), Error> {
        self.sync.delete_node(zone, name, self.deadline()).await
    }

    /// Deletes the given nodes of a zone, or all of them if `names` is empty.
    pub async fn delete_all_nodes(
        &self,
        zone: &str,
        names: &[String],
    ) -> Result<WriteReport, Error> {
        self.sync
            .delete_all_nodes(zone, names, self.deadline())
            .await
    }

    pub async fn list_nodes(
        &self,
        zone: &str,
        options: &ListOptions,
    ) -> Result<Page<Node>, Error> {
        self.query.list_nodes(zone, &self.limit(options)).await
    }

    pub async fn list_records(
        &self,
        zone: &str,
        node: &str,
        options: &ListOptions,
    ) -> Result<Page<Record>, Error> {
        self.query
            .list_records(zone, node, &self.limit(options))
            .await
    }

    /// Searches all zones by address, MAC address or text.
    pub async fn query(
        &self,
        term: &str,
        options: &ListOptions,
    ) -> Result<Page<Node>, Error> {
        self.query.query(term, &self.limit(options)).await
    }

    //--- Leases

    pub async fn list_leases(
        &self,
        active_only: bool,
        options: &ListOptions,
    ) -> Page<Arc<DhcpLease>> {
        self.query
            .list_leases(active_only, &self.limit(options))
            .await
    }
}

//============ Testing =======================================================
