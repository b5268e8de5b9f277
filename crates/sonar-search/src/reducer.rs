//! Link-level dedup preferring service rows over subdomain rows.

use crate::fields::FieldPlan;
use crate::processor::{link_and_type, ProcessedRow};
use std::collections::HashMap;

/// Keep one row per non-empty link.
///
/// A later row replaces the kept one for its link, except that a kept
/// `service` row is never displaced by a `subdomain` row. Rows with an empty
/// link are always kept. Output follows first appearance of each link.
#[must_use]
pub fn dedup_host(rows: Vec<ProcessedRow>, plan: &FieldPlan) -> Vec<ProcessedRow> {
    let link_idx = plan.index_of("link");
    let type_idx = plan.index_of("type");

    let mut kept: Vec<ProcessedRow> = Vec::with_capacity(rows.len());
    let mut slots: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let (link, kind) = link_and_type(&row, link_idx, type_idx);
        if link.is_empty() {
            kept.push(row);
            continue;
        }

        match slots.get(link) {
            Some(&slot) => {
                let (_, existing_kind) = link_and_type(&kept[slot], link_idx, type_idx);
                if existing_kind == "service" && kind == "subdomain" {
                    continue;
                }
                kept[slot] = row;
            }
            None => {
                slots.insert(link.to_string(), kept.len());
                kept.push(row);
            }
        }
    }

    tracing::debug!(remaining = kept.len(), links = slots.len(), "deduplicated hosts");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonar_core::SearchOptions;

    fn plan() -> FieldPlan {
        let options = SearchOptions {
            dedup_host: true,
            ..SearchOptions::default()
        };
        // host, type, link
        FieldPlan::build(&["host"], &[], &options, None).expect("plan")
    }

    fn row(host: &str, kind: &str, link: &str) -> ProcessedRow {
        ProcessedRow {
            cells: vec![host.to_string(), kind.to_string(), link.to_string()],
            active: None,
        }
    }

    #[test]
    fn test_service_beats_later_subdomain() {
        let rows = vec![
            row("a.com:80", "service", "http://a.com"),
            row("a.com", "subdomain", "http://a.com"),
        ];
        let out = dedup_host(rows, &plan());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].cells[1], "service");
    }

    #[test]
    fn test_later_service_replaces_subdomain() {
        let rows = vec![
            row("a.com", "subdomain", "http://a.com"),
            row("a.com:80", "service", "http://a.com"),
        ];
        let out = dedup_host(rows, &plan());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].cells[1], "service");
    }

    #[test]
    fn test_most_recent_wins_otherwise() {
        let rows = vec![
            row("first", "subdomain", "http://a.com"),
            row("second", "subdomain", "http://a.com"),
        ];
        let out = dedup_host(rows, &plan());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].cells[0], "second");
    }

    #[test]
    fn test_empty_links_always_kept() {
        let rows = vec![
            row("x", "service", ""),
            row("y", "service", ""),
            row("z", "service", "http://z.com"),
        ];
        let out = dedup_host(rows, &plan());
        assert_eq!(out.len(), 3);
    }
}
