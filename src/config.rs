//! Engine configuration.

use core::cmp;
use std::time::Duration;

use crate::correlate::{AddMode, UnknownFilter};

//------------ DefMinMax -----------------------------------------------------

/// A configuration item with a default value and a valid range.
#[derive(Clone, Copy, Debug)]
struct DefMinMax<T> {
    def: T,
    min: T,
    max: T,
}

impl<T> DefMinMax<T> {
    const fn new(def: T, min: T, max: T) -> Self {
        Self { def, min, max }
    }

    fn default(self) -> T {
        self.def
    }

    /// Trims the given value to fit into the minimum/maximum range.
    fn limit(self, value: T) -> T
    where
        T: Ord,
    {
        cmp::max(self.min, cmp::min(self.max, value))
    }
}

//------------ Constants -----------------------------------------------------

/// The page size used when a request asks for none.
const DEFAULT_PAGE_SIZE: DefMinMax<usize> = DefMinMax::new(20, 1, 1000);

/// The largest page size a request may ask for.
const MAX_PAGE_SIZE: DefMinMax<usize> = DefMinMax::new(1000, 1, 100_000);

/// The time after which an operation is cancelled.
const OPERATION_TIMEOUT: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(30),
    Duration::from_millis(1),
    Duration::from_secs(3600),
);

/// The interval between reloads of the zone catalog.
const REFRESH_INTERVAL: DefMinMax<Duration> = DefMinMax::new(
    Duration::from_secs(300),
    Duration::from_secs(1),
    Duration::from_secs(86400),
);

//------------ Config --------------------------------------------------------

/// Configuration of a [`DnsService`][crate::service::DnsService].
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Config {
    /// Whether record writes mirror unless told otherwise.
    mirror_reverse: bool,

    /// Which leases are attached to DNS results by default.
    add_mode: AddMode,

    /// Which records DNS results keep by default.
    unknown_filter: UnknownFilter,

    /// Whether lease listings include expired leases by default.
    include_expired_leases: bool,

    default_page_size: usize,
    max_page_size: usize,

    /// The deadline for mutating operations, if any.
    operation_timeout: Option<Duration>,

    refresh_interval: Duration,
}

impl Config {
    /// Creates a new, default config.
    pub fn new() -> Self {
        Default::default()
    }

    pub fn mirror_reverse(&self) -> bool {
        self.mirror_reverse
    }

    pub fn add_mode(&self) -> AddMode {
        self.add_mode
    }

    pub fn unknown_filter(&self) -> UnknownFilter {
        self.unknown_filter
    }

    pub fn include_expired_leases(&self) -> bool {
        self.include_expired_leases
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Sets whether record writes mirror by default.
    ///
    /// The default is `true`.
    pub fn set_mirror_reverse(&mut self, value: bool) {
        self.mirror_reverse = value;
    }

    /// Sets which leases are attached to DNS results by default.
    ///
    /// The default is [`AddMode::None`].
    pub fn set_add_mode(&mut self, value: AddMode) {
        self.add_mode = value;
    }

    /// Sets the default unknown record filter.
    ///
    /// The default is [`UnknownFilter::All`].
    pub fn set_unknown_filter(&mut self, value: UnknownFilter) {
        self.unknown_filter = value;
    }

    pub fn set_include_expired_leases(&mut self, value: bool) {
        self.include_expired_leases = value;
    }

    /// Sets the page size used when a request does not give one.
    ///
    /// The value has to be between 1 and 1,000 and is capped by the maximum
    /// page size. The default is 20.
    pub fn set_default_page_size(&mut self, value: usize) {
        self.default_page_size = DEFAULT_PAGE_SIZE.limit(value);
    }

    /// Sets the largest page size a request may ask for.
    ///
    /// The value has to be between 1 and 100,000. The default is 1,000.
    pub fn set_max_page_size(&mut self, value: usize) {
        self.max_page_size = MAX_PAGE_SIZE.limit(value);
    }

    /// Sets the deadline for mutating operations.
    ///
    /// The value has to be between 1ms and one hour. The default is no
    /// deadline; [`Config::DEFAULT_OPERATION_TIMEOUT`] is a sensible value.
    pub fn set_operation_timeout(&mut self, value: Option<Duration>) {
        self.operation_timeout = value.map(|value| OPERATION_TIMEOUT.limit(value));
    }

    /// Sets the interval between reloads of the zone catalog.
    ///
    /// The value has to be between one second and one day. The default is
    /// five minutes.
    pub fn set_refresh_interval(&mut self, value: Duration) {
        self.refresh_interval = REFRESH_INTERVAL.limit(value);
    }

    /// A reasonable operation timeout for backends reached over a network.
    pub const DEFAULT_OPERATION_TIMEOUT: Duration = OPERATION_TIMEOUT.def;

    /// Returns the page size to use for a requested size.
    ///
    /// No size means the default page size. Larger sizes are capped.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
    }
}

//--- Default

impl Default for Config {
    fn default() -> Self {
        Self {
            mirror_reverse: true,
            add_mode: AddMode::None,
            unknown_filter: UnknownFilter::All,
            include_expired_leases: false,
            default_page_size: DEFAULT_PAGE_SIZE.default(),
            max_page_size: MAX_PAGE_SIZE.default(),
            operation_timeout: None,
            refresh_interval: REFRESH_INTERVAL.default(),
        }
    }
}

//============ Testing =======================================================
