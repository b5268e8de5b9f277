//! Ingestion-time row transforms.
//!
//! A [`RowProcessor`] is created per search call and owns all dedup state for
//! that call, so concurrent calls on one client never share it. Steps run in
//! a fixed order: IP dedup, wildcard dedup, filter, then the reachability
//! probe on the survivors.

use crate::fields::FieldPlan;
use crate::filter::FilterExpr;
use crate::probe::Prober;
use crate::Row;
use futures::stream::{self, StreamExt};
use sonar_core::SearchOptions;
use std::collections::{HashMap, HashSet};

/// Occurrences of one wildcard key kept before further rows are dropped.
pub const WILDCARD_CAP: u32 = 3;

/// A row that survived ingestion, plus its probe verdict when probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedRow {
    /// Cells aligned to the effective field list
    pub cells: Row,
    /// Reachability verdict, appended after trimming
    pub active: Option<bool>,
}

impl ProcessedRow {
    fn cell(&self, idx: Option<usize>) -> &str {
        idx.and_then(|i| self.cells.get(i)).map_or("", String::as_str)
    }
}

#[derive(Debug)]
struct WildcardColumns {
    ip: usize,
    port: usize,
    domain: usize,
    title: usize,
    fid: usize,
}

#[derive(Debug)]
struct ProbeColumns {
    link: usize,
    status_code: usize,
    depth: u32,
}

/// Per-call ingestion state.
#[derive(Debug)]
pub struct RowProcessor {
    uniq_ip: Option<usize>,
    seen_ips: HashSet<String>,
    wildcard: Option<WildcardColumns>,
    wildcard_counts: HashMap<String, u32>,
    filter: Option<(FilterExpr, Vec<usize>)>,
    probe: Option<ProbeColumns>,
}

fn cell(row: &Row, idx: usize) -> &str {
    row.get(idx).map_or("", String::as_str)
}

impl RowProcessor {
    /// Resolve column positions from `plan` for every enabled step.
    ///
    /// `filter` must be the expression the plan was built with, so all of its
    /// variables have columns.
    #[must_use]
    pub fn new(plan: &FieldPlan, options: &SearchOptions, filter: Option<FilterExpr>) -> Self {
        let col = |name: &str| plan.index_of(name).unwrap_or(usize::MAX);

        let wildcard = (options.de_wildcard > 0).then(|| WildcardColumns {
            ip: col("ip"),
            port: col("port"),
            domain: col("domain"),
            title: col("title"),
            fid: col("fid"),
        });

        let probe = (options.is_active > 0).then(|| ProbeColumns {
            link: col("link"),
            status_code: col("status_code"),
            depth: options.is_active,
        });

        let filter = filter.map(|expr| {
            let positions = expr.vars().iter().map(|v| col(v.as_str())).collect();
            (expr, positions)
        });

        Self {
            uniq_ip: options.uniq_by_ip.then(|| col("ip")),
            seen_ips: HashSet::new(),
            wildcard,
            wildcard_counts: HashMap::new(),
            filter,
            probe,
        }
    }

    /// Whether survivors need a probe pass.
    #[must_use]
    pub fn probes(&self) -> bool {
        self.probe.is_some()
    }

    /// Run the dedup and filter steps; `false` means the row is dropped.
    pub fn admit(&mut self, row: &Row) -> bool {
        if let Some(ip) = self.uniq_ip {
            if !self.seen_ips.insert(cell(row, ip).to_string()) {
                return false;
            }
        }

        if let Some(cols) = &self.wildcard {
            let key = format!(
                "{}:{}:{}:{}:{}",
                cell(row, cols.ip),
                cell(row, cols.port),
                cell(row, cols.domain),
                cell(row, cols.title),
                cell(row, cols.fid),
            );
            let seen = self.wildcard_counts.entry(key).or_insert(0);
            if *seen >= WILDCARD_CAP {
                return false;
            }
            *seen += 1;
        }

        if let Some((expr, positions)) = &self.filter {
            let values: Vec<&str> = positions.iter().map(|&i| cell(row, i)).collect();
            if !expr.matches(&values) {
                return false;
            }
        }

        true
    }

    /// Admit every row of a page and probe the survivors.
    ///
    /// Probes run up to `concurrency` at a time; results are collected in row
    /// order so each verdict stays with its originating row.
    pub async fn process_page(
        &mut self,
        rows: Vec<Row>,
        prober: &dyn Prober,
        concurrency: usize,
    ) -> Vec<ProcessedRow> {
        let admitted: Vec<Row> = rows.into_iter().filter(|row| self.admit(row)).collect();

        let Some(probe) = &self.probe else {
            return admitted
                .into_iter()
                .map(|cells| ProcessedRow {
                    cells,
                    active: None,
                })
                .collect();
        };

        stream::iter(admitted)
            .map(|mut cells| async move {
                let link = cell(&cells, probe.link).to_string();
                let outcome = prober.probe(&link, probe.depth).await;
                if let Some(slot) = cells.get_mut(probe.status_code) {
                    *slot = outcome.status_code;
                }
                ProcessedRow {
                    cells,
                    active: Some(outcome.is_active),
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

/// Link and type columns read by the reducer.
pub(crate) fn link_and_type(
    row: &ProcessedRow,
    link: Option<usize>,
    kind: Option<usize>,
) -> (&str, &str) {
    (row.cell(link), row.cell(kind))
}
