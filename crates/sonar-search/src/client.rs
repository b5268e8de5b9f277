//! Search client driving pagination and row post-processing.
//!
//! [`SearchClient`] owns the shared services (API, prober) while every call
//! builds its own [`FieldPlan`] and [`RowProcessor`], so dedup state is never
//! shared between concurrent calls.

use crate::api::{HostStatsData, SearchAllRequest, SearchApi, SearchNextRequest};
use crate::error::{Result, SearchError};
use crate::fields::{FieldPlan, DEFAULT_FIELDS};
use crate::filter::FilterExpr;
use crate::postprocess::{fix_urls, trim};
use crate::probe::{HttpProber, Prober};
use crate::processor::{ProcessedRow, RowProcessor};
use crate::quota;
use crate::reducer::dedup_host;
use crate::Row;
use sonar_core::{AccountQuota, AppConfig, FetchSize, SearchOptions, MAX_PAGE_SIZE};
use std::error::Error;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Column name appended to results when reachability probing is enabled.
pub const ACTIVE_FIELD: &str = "is_active";

/// Largest accepted batch size for [`SearchClient::dump_search`].
pub const MAX_BATCH_SIZE: usize = 100_000;

/// Callback invoked with each page's rows as they are processed.
pub type PageHook = Arc<dyn Fn(&[Row]) + Send + Sync>;

/// Final rows of a counted search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Column names, one per cell of every row
    pub fields: Vec<String>,
    /// Post-processed rows
    pub rows: Vec<Row>,
    /// Total match count reported by the service
    pub total: Option<u64>,
}

/// Asset search client.
pub struct SearchClient {
    /// Remote search service
    api: Arc<dyn SearchApi>,
    /// Reachability probe used for `is_active`
    prober: Arc<dyn Prober>,
    /// Account allowance checked by counted searches
    quota: AccountQuota,
    /// Fields used when a call requests none
    default_fields: Vec<String>,
    /// Rows per offset page
    page_size: usize,
    /// Probes in flight per page
    probe_concurrency: usize,
    /// Cooperative cancellation, checked before each fetch
    cancel: CancellationToken,
    /// Progress callback, called once per non-empty page
    on_page: Option<PageHook>,
}

impl SearchClient {
    /// Create a client with default paging and an [`HttpProber`].
    #[must_use]
    pub fn new(api: Arc<dyn SearchApi>, quota: AccountQuota) -> Self {
        Self {
            api,
            prober: Arc::new(HttpProber::default()),
            quota,
            default_fields: DEFAULT_FIELDS.iter().map(ToString::to_string).collect(),
            page_size: MAX_PAGE_SIZE,
            probe_concurrency: 1,
            cancel: CancellationToken::new(),
            on_page: None,
        }
    }

    /// Create a client configured from the `[search]` and `[probe]` sections.
    ///
    /// The configured deduction mode overrides `quota.mode`.
    #[must_use]
    pub fn from_config(api: Arc<dyn SearchApi>, quota: AccountQuota, config: &AppConfig) -> Self {
        let quota = AccountQuota {
            mode: config.search.deduct_mode,
            ..quota
        };
        Self::new(api, quota)
            .with_prober(Arc::new(HttpProber::new(&config.probe)))
            .with_probe_concurrency(config.probe.concurrency)
            .with_page_size(config.search.page_size)
            .with_default_fields(config.search.default_fields.clone())
    }

    /// Replace the reachability prober.
    #[must_use]
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    /// Set how many probes may run at once within a page.
    #[must_use]
    pub fn with_probe_concurrency(mut self, concurrency: usize) -> Self {
        self.probe_concurrency = concurrency.max(1);
        self
    }

    /// Set the fields used when a call requests none.
    #[must_use]
    pub fn with_default_fields(mut self, fields: Vec<String>) -> Self {
        self.default_fields = fields;
        self
    }

    /// Set the offset page size, capped at [`MAX_PAGE_SIZE`].
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Use `token` for cooperative cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report every processed page to `hook`.
    ///
    /// Offset pages are reported trimmed to the returned columns but before
    /// link dedup and URL rebuilding; cursor batches are reported exactly as
    /// delivered to the consumer.
    #[must_use]
    pub fn with_on_page(mut self, hook: PageHook) -> Self {
        self.on_page = Some(hook);
        self
    }

    /// Handle that cancels every in-progress and future call on this client.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Account allowance used by the quota gate.
    #[must_use]
    pub fn quota(&self) -> &AccountQuota {
        &self.quota
    }

    /// Run a counted search with offset pagination.
    ///
    /// The filter is compiled and the field plan built before anything is
    /// fetched. Rows are processed page by page as they arrive; link dedup,
    /// URL reconstruction and trimming run once over the accumulated set.
    ///
    /// # Errors
    /// - [`SearchError::Compile`] / [`SearchError::MissingField`] before any fetch
    /// - [`SearchError::QuotaExceeded`] before any fetch
    /// - [`SearchError::Server`] / [`SearchError::Cancelled`] with the rows
    ///   processed so far
    pub async fn host_search<S: AsRef<str> + Sync>(
        &self,
        query: &str,
        size: FetchSize,
        fields: &[S],
        options: &SearchOptions,
    ) -> Result<SearchResults> {
        let filter = options.filter_expr().map(FilterExpr::compile).transpose()?;
        let plan = FieldPlan::build(fields, &self.default_fields, options, filter.as_ref())?;
        let size = quota::gate(&self.quota, size)?;
        let returned = returned_fields(&plan, options);

        let per_page = match size {
            FetchSize::CountOnly => {
                let total = self.count(query, plan.fields()).await?;
                return Ok(SearchResults {
                    fields: returned,
                    rows: Vec::new(),
                    total: Some(total),
                });
            }
            FetchSize::Limit(n) => n.min(self.page_size),
            FetchSize::All => self.page_size,
        };

        tracing::debug!(query, fields = ?plan.fields(), per_page, "starting host search");

        let mut processor = RowProcessor::new(&plan, options, filter);
        let mut accumulated: Vec<ProcessedRow> = Vec::new();
        let mut total = None;
        let mut page = 1;

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(rows = accumulated.len(), "host search cancelled");
                return Err(SearchError::Cancelled {
                    partial: finish(accumulated, &plan, options),
                });
            }

            let request = SearchAllRequest {
                query: query.to_string(),
                size: per_page,
                page,
                fields: plan.fields().to_vec(),
                full: options.full,
            };
            let envelope = match self.api.search_all(&request).await {
                Ok(envelope) => envelope,
                Err(SearchError::Server { message, .. }) => {
                    return Err(SearchError::Server {
                        message,
                        partial: finish(accumulated, &plan, options),
                    });
                }
                Err(e) => return Err(e),
            };

            if let Some(message) = envelope.error_message() {
                tracing::warn!(page, "search aborted by server: {}", message);
                return Err(SearchError::Server {
                    message: message.to_string(),
                    partial: finish(accumulated, &plan, options),
                });
            }
            total = Some(envelope.size);

            let rows = match envelope.rows() {
                Some(rows) if !rows.is_empty() => rows,
                _ => break,
            };
            let fetched = rows.len();

            let processed = processor
                .process_page(rows, self.prober.as_ref(), self.probe_concurrency)
                .await;
            if let Some(hook) = &self.on_page {
                hook(&trim(processed.clone(), &plan));
            }
            accumulated.extend(processed);
            tracing::debug!(page, fetched, kept = accumulated.len(), "processed page");

            if let FetchSize::Limit(n) = size {
                if accumulated.len() >= n {
                    accumulated.truncate(n);
                    break;
                }
            }
            if fetched < per_page {
                break;
            }
            page += 1;
        }

        let rows = finish(accumulated, &plan, options);
        tracing::info!(query, rows = rows.len(), pages = page, "host search finished");

        Ok(SearchResults {
            fields: returned,
            rows,
            total,
        })
    }

    /// Stream a search with cursor pagination, handing each processed batch to
    /// `on_batch` together with the service's total match count.
    ///
    /// `all_size` caps the number of delivered rows; zero or negative means
    /// no cap. Link dedup is not applied since rows are never held together.
    /// Returns the number of rows delivered.
    ///
    /// # Errors
    /// - [`SearchError::BatchSize`] when `batch_size` is outside `1..=100000`
    /// - [`SearchError::Sink`] when `on_batch` fails
    /// - [`SearchError::Server`] / [`SearchError::Cancelled`]; rows already
    ///   delivered stay with the consumer
    pub async fn dump_search<S, F>(
        &self,
        query: &str,
        all_size: i64,
        batch_size: usize,
        fields: &[S],
        options: &SearchOptions,
        mut on_batch: F,
    ) -> Result<usize>
    where
        S: AsRef<str> + Sync,
        F: FnMut(Vec<Row>, u64) -> std::result::Result<(), Box<dyn Error + Send + Sync>> + Send,
    {
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(SearchError::BatchSize(batch_size));
        }

        let filter = options.filter_expr().map(FilterExpr::compile).transpose()?;
        let plan = FieldPlan::build(fields, &self.default_fields, options, filter.as_ref())?;
        let limit = usize::try_from(all_size).ok().filter(|&n| n > 0);

        let mut processor = RowProcessor::new(&plan, options, filter);
        let mut delivered = 0usize;
        let mut next = String::new();

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(delivered, "dump cancelled");
                return Err(SearchError::Cancelled {
                    partial: Vec::new(),
                });
            }

            let request = SearchNextRequest {
                query: query.to_string(),
                size: batch_size,
                fields: plan.fields().to_vec(),
                full: options.full,
                next: next.clone(),
            };
            let envelope = self.api.search_next(&request).await?;

            if let Some(message) = envelope.error_message() {
                tracing::warn!(delivered, "dump aborted by server: {}", message);
                return Err(SearchError::Server {
                    message: message.to_string(),
                    partial: Vec::new(),
                });
            }

            let rows = match envelope.rows() {
                Some(rows) if !rows.is_empty() => rows,
                _ => break,
            };
            let fetched = rows.len();

            let mut processed = processor
                .process_page(rows, self.prober.as_ref(), self.probe_concurrency)
                .await;
            if let Some(limit) = limit {
                processed.truncate(limit.saturating_sub(delivered));
            }
            if options.fix_url {
                fix_urls(&mut processed, &plan, &options.url_prefix);
            }
            let batch = trim(processed, &plan);

            if !batch.is_empty() {
                if let Some(hook) = &self.on_page {
                    hook(&batch);
                }
                delivered += batch.len();
                on_batch(batch, envelope.size).map_err(SearchError::Sink)?;
            }
            tracing::debug!(fetched, delivered, "dumped batch");

            if limit.is_some_and(|limit| delivered >= limit)
                || fetched < batch_size
                || envelope.next.is_empty()
            {
                break;
            }
            next = envelope.next;
        }

        tracing::info!(query, delivered, "dump finished");
        Ok(delivered)
    }

    /// Total number of matches for `query`.
    pub async fn host_size(&self, query: &str) -> Result<u64> {
        self.count(query, &["host".to_string()]).await
    }

    /// Aggregated view of one host.
    ///
    /// # Errors
    /// [`SearchError::Server`] when the service flags the lookup as failed.
    pub async fn host_stats(&self, host: &str) -> Result<HostStatsData> {
        let stats = self.api.host_stats(host).await?;
        if stats.error {
            let message = if stats.errmsg.is_empty() {
                "unknown server error".to_string()
            } else {
                stats.errmsg
            };
            tracing::warn!(host, "host lookup failed: {}", message);
            return Err(SearchError::Server {
                message,
                partial: Vec::new(),
            });
        }
        Ok(stats)
    }

    async fn count(&self, query: &str, fields: &[String]) -> Result<u64> {
        let request = SearchAllRequest {
            query: query.to_string(),
            size: 1,
            page: 1,
            fields: fields.to_vec(),
            full: false,
        };
        let envelope = self.api.search_all(&request).await?;
        if let Some(message) = envelope.error_message() {
            return Err(SearchError::Server {
                message: message.to_string(),
                partial: Vec::new(),
            });
        }
        Ok(envelope.size)
    }
}

/// Column names of the final rows.
fn returned_fields(plan: &FieldPlan, options: &SearchOptions) -> Vec<String> {
    let mut fields = plan.requested_fields().to_vec();
    if options.is_active > 0 {
        fields.push(ACTIVE_FIELD.to_string());
    }
    fields
}

/// Reduce, rebuild URLs and trim an accumulated set.
fn finish(rows: Vec<ProcessedRow>, plan: &FieldPlan, options: &SearchOptions) -> Vec<Row> {
    let mut rows = if options.dedup_host {
        dedup_host(rows, plan)
    } else {
        rows
    };
    if options.fix_url {
        fix_urls(&mut rows, plan, &options.url_prefix);
    }
    trim(rows, plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returned_fields_append_active() {
        let options = SearchOptions {
            is_active: 2,
            uniq_by_ip: true,
            ..SearchOptions::default()
        };
        let plan = FieldPlan::build(&["host"], &[], &options, None).expect("plan");
        assert_eq!(returned_fields(&plan, &options), vec!["host", ACTIVE_FIELD]);
    }

    #[test]
    fn test_finish_without_options_only_trims() {
        let options = SearchOptions::default();
        let plan = FieldPlan::build(&["host", "ip"], &[], &options, None).expect("plan");
        let rows = vec![ProcessedRow {
            cells: vec!["a.com".into(), "1.1.1.1".into()],
            active: None,
        }];
        assert_eq!(
            finish(rows, &plan, &options),
            vec![vec!["a.com".to_string(), "1.1.1.1".to_string()]]
        );
    }
}
