//! Sync orchestration
//!
//! Drives a full extraction run: resolve the customer contexts (explicit
//! config or account discovery), then invoke every active report stream
//! once per context, serially, delivering records to the sink as each page
//! is parsed.

use crate::client::GoogleAdsClient;
use crate::config::Config;
use crate::storage::RecordSink;
use crate::streams::discovery::{self, ACCESSIBLE_CUSTOMERS_STREAM, CustomerHierarchy};
use crate::streams::{Context, RecordPager, ReportStream, select_streams};
use eyre::Result;
use std::collections::HashSet;

/// Per-stream result of a run.
///
/// `truncated` is the explicit partial-success signal: it is set when any
/// invocation of the stream ended early on a resumable error, so consumers
/// can tell a complete extract from a shortened one.
#[derive(Clone, Debug)]
pub struct StreamOutcome {
    pub stream: String,
    pub invocations: usize,
    pub records: usize,
    pub truncated: bool,
}

/// Aggregated results of one sync run.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub outcomes: Vec<StreamOutcome>,
}

impl SyncSummary {
    fn add(&mut self, stream: &str, records: usize, truncated: bool) {
        match self.outcomes.iter_mut().find(|o| o.stream == stream) {
            Some(outcome) => {
                outcome.invocations += 1;
                outcome.records += records;
                outcome.truncated |= truncated;
            }
            None => self.outcomes.push(StreamOutcome {
                stream: stream.to_string(),
                invocations: 1,
                records,
                truncated,
            }),
        }
    }

    pub fn total_records(&self) -> usize {
        self.outcomes.iter().map(|o| o.records).sum()
    }

    /// Names of streams whose output was shortened by a resumable error.
    pub fn truncated_streams(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.truncated)
            .map(|o| o.stream.as_str())
            .collect()
    }
}

/// Executes a sync run against one client and sink.
///
/// Invocations are strictly sequential; the only state shared between them
/// is the client's token cache.
pub struct SyncRunner<S> {
    client: GoogleAdsClient,
    sink: S,
}

impl<S: RecordSink> SyncRunner<S> {
    pub fn new(client: GoogleAdsClient, sink: S) -> Self {
        Self { client, sink }
    }

    /// Consume the runner and return the sink, for callers that want to
    /// inspect buffered output.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Run every active stream and return the per-stream outcomes.
    ///
    /// # Errors
    /// The first non-resumable failure aborts the run; everything written to
    /// the sink so far stays written.
    pub async fn sync(&mut self) -> Result<SyncSummary> {
        let config = self.client.config().clone();
        let mut summary = SyncSummary::default();

        let contexts = self.resolve_contexts(&config, &mut summary).await?;
        if contexts.is_empty() {
            log::warn!("No customer accounts to sync");
        }

        for stream in select_streams(&config) {
            self.run_stream(&config, stream.as_ref(), &contexts, &mut summary)
                .await?;
        }

        self.sink.flush()?;

        log::info!(
            "Sync complete: {} record(s) across {} stream(s)",
            summary.total_records(),
            summary.outcomes.len()
        );
        for stream in summary.truncated_streams() {
            log::warn!("Stream '{}' output was truncated by a resumable error", stream);
        }
        Ok(summary)
    }

    /// Resolve the contexts the report streams fan out over.
    ///
    /// Explicitly configured customer ids bypass discovery entirely; the
    /// check runs fresh on every sync. Otherwise the discovery streams run
    /// here, and their records are emitted like any other stream's.
    async fn resolve_contexts(
        &mut self,
        config: &Config,
        summary: &mut SyncSummary,
    ) -> Result<Vec<Context>> {
        if let Some(ids) = config.configured_customer_ids() {
            log::info!(
                "Using {} configured customer id(s), skipping account discovery",
                ids.len()
            );
            return Ok(ids.into_iter().map(Context::new).collect());
        }

        log::info!("Discovering accessible customer accounts...");
        let accessible = self.client.list_accessible_customers().await?;
        self.sink
            .write(ACCESSIBLE_CUSTOMERS_STREAM, &serde_json::to_value(&accessible)?)?;
        summary.add(ACCESSIBLE_CUSTOMERS_STREAM, 1, false);

        let parents = discovery::accessible_customer_contexts(&accessible);
        log::info!("{} accessible account(s)", parents.len());

        let hierarchy = CustomerHierarchy;
        let mut seen = HashSet::new();
        let mut contexts = Vec::new();
        for parent in &parents {
            let mut pager = RecordPager::new(&self.client, &hierarchy, parent, config);
            let mut records = 0;
            while let Some(page) = pager.next_page().await? {
                for record in page {
                    contexts.extend(CustomerHierarchy::child_contexts(&record, &mut seen));
                    self.sink.write(hierarchy.name(), &record)?;
                    records += 1;
                }
            }
            summary.add(hierarchy.name(), records, pager.truncated());
        }

        log::info!("Discovered {} child account(s)", contexts.len());
        Ok(contexts)
    }

    async fn run_stream(
        &mut self,
        config: &Config,
        stream: &dyn ReportStream,
        contexts: &[Context],
        summary: &mut SyncSummary,
    ) -> Result<()> {
        // Account-invariant streams only need the first context
        let targets = match stream.sync_once() {
            true => &contexts[..contexts.len().min(1)],
            false => contexts,
        };

        log::info!(
            "Syncing stream '{}' across {} account(s)",
            stream.name(),
            targets.len()
        );

        for context in targets {
            let mut pager = RecordPager::new(&self.client, stream, context, config);
            let mut records = 0;
            while let Some(page) = pager.next_page().await? {
                for record in page {
                    self.sink.write(stream.name(), &record)?;
                    records += 1;
                }
            }
            log::debug!(
                "Stream '{}': {} record(s) for customer {}",
                stream.name(),
                records,
                context.customer_id
            );
            summary.add(stream.name(), records, pager.truncated());
        }
        Ok(())
    }
}
