//! Report stream contract and catalog
//!
//! A [`ReportStream`] defines one logical GAQL report: its name, query
//! template, ordering, and error policy. The shared request, pagination,
//! and truncation behavior lives in [`pager::RecordPager`]; the account
//! discovery streams that feed contexts to the catalog live in
//! [`discovery`].

pub mod discovery;
pub mod pager;
pub mod reports;

pub use discovery::CustomerHierarchy;
pub use pager::RecordPager;
pub use reports::{
    AdGroups, AdGroupsPerformance, Campaigns, CampaignPerformance,
    CampaignPerformanceByAgeRangeAndDevice, CampaignPerformanceByGenderAndDevice,
    CampaignPerformanceByLocation, ClickViewReport, GeoPerformance, Geotargets,
};

use crate::config::Config;
use reqwest::StatusCode;
use serde_json::Value;

/// Per-invocation binding of the customer account a stream runs against.
///
/// Discovery streams emit one context per discovered account; the runner
/// then invokes each dependent stream once per context.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Context {
    pub customer_id: String,
}

impl Context {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
        }
    }
}

/// Contract for one logical report stream.
///
/// The query template is a required method: a stream without a query cannot
/// exist, which moves the original "unimplemented query" failure from
/// runtime to compile time. Everything else has a default that matches the
/// common date-windowed report shape.
pub trait ReportStream: Send + Sync {
    /// Output stream name, also used as the sink file name.
    fn name(&self) -> &'static str;

    /// Fields that uniquely identify a record, for downstream consumers.
    fn primary_keys(&self) -> &'static [&'static str];

    /// The GAQL query template for this stream.
    fn gaql(&self, config: &Config) -> String;

    /// Query windows for one invocation; one pagination sequence runs per
    /// window. Default: the single window from [`ReportStream::gaql`].
    fn queries(&self, config: &Config) -> Vec<String> {
        vec![self.gaql(config)]
    }

    /// Field used to request stable ascending ordering across pages.
    fn replication_key(&self) -> Option<&'static str> {
        None
    }

    /// Whether to attach `sort=asc&order_by=<replication key>` to requests.
    fn sorted(&self) -> bool {
        true
    }

    /// True when the stream's rows are identical for every account, so one
    /// invocation per run suffices.
    fn sync_once(&self) -> bool {
        false
    }

    /// Whether a response status belongs to this stream's resumable class.
    fn is_resumable(&self, _status: StatusCode) -> bool {
        false
    }

    /// Warning message for a resumable response.
    fn resumable_message(&self, context: &Context, status: StatusCode, _body: &Value) -> String {
        format!(
            "{} request for customer {} returned {}, ending stream early",
            self.name(),
            context.customer_id,
            status
        )
    }

    /// Per-record hook applied before the record reaches the sink.
    fn post_process(&self, record: Value) -> Value {
        record
    }
}

/// Build the active stream list for a config.
///
/// Pure selection: the click view report stream is included only when
/// enabled, and the returned list is freshly built on every call.
pub fn select_streams(config: &Config) -> Vec<Box<dyn ReportStream>> {
    let mut streams: Vec<Box<dyn ReportStream>> = vec![
        Box::new(Campaigns),
        Box::new(AdGroups),
        Box::new(AdGroupsPerformance),
        Box::new(CampaignPerformance),
        Box::new(CampaignPerformanceByAgeRangeAndDevice),
        Box::new(CampaignPerformanceByGenderAndDevice),
        Box::new(CampaignPerformanceByLocation),
        Box::new(Geotargets),
        Box::new(GeoPerformance),
    ];
    if config.enable_click_view_report_stream {
        streams.push(Box::new(ClickViewReport));
    }
    streams
}
