//! URL reconstruction and transient-column trimming.

use crate::fields::FieldPlan;
use crate::processor::ProcessedRow;
use crate::Row;

/// Protocols that may be used verbatim as a URL scheme.
const URL_SCHEMES: [&str; 6] = ["socks5", "redis", "http", "https", "mongodb", "mysql"];

/// Turn a bare `host` cell into a URL.
///
/// Cells that already carry a scheme are left alone. Otherwise `prefix` wins
/// when non-empty, then a known `protocol`, then `http://`.
#[must_use]
pub fn fix_host(host: &str, prefix: &str, protocol: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else if !prefix.is_empty() {
        format!("{prefix}{host}")
    } else if URL_SCHEMES.contains(&protocol) {
        format!("{protocol}://{host}")
    } else {
        format!("http://{host}")
    }
}

/// Apply [`fix_host`] to the `host` column of every row.
pub fn fix_urls(rows: &mut [ProcessedRow], plan: &FieldPlan, prefix: &str) {
    let Some(host_idx) = plan.index_of("host") else {
        return;
    };
    let protocol_idx = plan.index_of("protocol");

    for row in rows {
        let protocol = protocol_idx
            .and_then(|i| row.cells.get(i))
            .map_or("", String::as_str);
        if let Some(host) = row.cells.get(host_idx) {
            let fixed = fix_host(host, prefix, protocol);
            row.cells[host_idx] = fixed;
        }
    }
}

/// Drop transient columns and append probe verdicts.
///
/// Rows are cut to the requested column count; the `is_active` verdict, when
/// present, is appended after the cut so it survives.
#[must_use]
pub fn trim(rows: Vec<ProcessedRow>, plan: &FieldPlan) -> Vec<Row> {
    let keep = plan.requested_len();
    rows.into_iter()
        .map(|ProcessedRow { mut cells, active }| {
            cells.truncate(keep);
            if let Some(active) = active {
                cells.push(active.to_string());
            }
            cells
        })
        .collect()
}
