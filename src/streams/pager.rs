//! Page-by-page record fetching
//!
//! One `RecordPager` drives a single stream invocation: it walks the
//! stream's query windows, follows `nextPageToken` cursors within each
//! window, and applies the stream's resumable-error policy. Pages are
//! fetched lazily; the sequence is restartable per run, not mid-run.

use super::{Context, ReportStream};
use crate::client::{GoogleAdsClient, ResumableError, SearchResponse};
use crate::config::Config;
use eyre::{Context as _, Result};
use serde_json::Value;
use std::collections::VecDeque;

/// Lazy pager over one stream invocation.
///
/// State machine per window: `FETCHING_PAGE -> (has token) -> FETCHING_PAGE`,
/// `FETCHING_PAGE -> (no token) -> next window or DONE`. A resumable error
/// short-circuits to DONE with [`RecordPager::truncated`] set; any other
/// failure propagates and poisons the invocation.
pub struct RecordPager<'a> {
    client: &'a GoogleAdsClient,
    stream: &'a dyn ReportStream,
    context: &'a Context,
    pending: VecDeque<String>,
    current: Option<String>,
    page_token: Option<String>,
    truncated: bool,
    done: bool,
}

impl<'a> RecordPager<'a> {
    pub fn new(
        client: &'a GoogleAdsClient,
        stream: &'a dyn ReportStream,
        context: &'a Context,
        config: &Config,
    ) -> Self {
        Self {
            client,
            stream,
            context,
            pending: stream.queries(config).into(),
            current: None,
            page_token: None,
            truncated: false,
            done: false,
        }
    }

    /// Whether the record sequence ended early on a resumable error.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Fetch the next page of records, or `None` when the invocation is
    /// complete.
    ///
    /// A resumable response logs a warning and completes the sequence as if
    /// pagination had finished normally.
    ///
    /// # Errors
    /// Any non-resumable HTTP or parse failure.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        if self.done {
            return Ok(None);
        }

        let query = match &self.current {
            Some(query) => query.clone(),
            None => match self.pending.pop_front() {
                Some(query) => {
                    self.page_token = None;
                    self.current = Some(query.clone());
                    query
                }
                None => {
                    self.done = true;
                    return Ok(None);
                }
            },
        };

        let order_by = match self.stream.sorted() {
            true => self.stream.replication_key(),
            false => None,
        };
        let response = self
            .client
            .search_page(self.context, &query, self.page_token.as_deref(), order_by)
            .await?;

        let page = match self.validate(response).await {
            Ok(page) => page,
            Err(err) => {
                if let Some(resumable) = err.downcast_ref::<ResumableError>() {
                    log::warn!("{}", resumable);
                    self.truncated = true;
                    self.done = true;
                    return Ok(None);
                }
                return Err(err);
            }
        };

        let records: Vec<Value> = page
            .results
            .into_iter()
            .map(|record| self.stream.post_process(record))
            .collect();

        match page.next_page_token {
            Some(token) if !token.is_empty() => self.page_token = Some(token),
            _ => {
                // Window exhausted; the next call starts the next one
                self.current = None;
                self.page_token = None;
            }
        }

        Ok(Some(records))
    }

    /// Drain the pager into a single vector, page order preserved.
    pub async fn collect_records(&mut self) -> Result<Vec<Value>> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page);
        }
        Ok(records)
    }

    /// Apply the stream's status policy and parse a successful page.
    async fn validate(&self, response: reqwest::Response) -> Result<SearchResponse> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<SearchResponse>()
                .await
                .with_context(|| format!("Failed to parse {} response", self.stream.name()));
        }

        let body = response.text().await.unwrap_or_default();
        if self.stream.is_resumable(status) {
            let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let message = self.stream.resumable_message(self.context, status, &body);
            return Err(ResumableError::new(status, message).into());
        }

        eyre::bail!(
            "{} search for customer {} failed ({}): {}",
            self.stream.name(),
            self.context.customer_id,
            status,
            body
        )
    }
}
