//! Field planning: make every enabled option's column part of the request.
//!
//! The plan is the single source of column positions for a call. Rows stay
//! aligned to [`FieldPlan::fields`] until post-processing trims them back to
//! [`FieldPlan::requested_len`].

use crate::error::{Result, SearchError};
use crate::filter::FilterExpr;
use sonar_core::SearchOptions;
use std::collections::HashMap;

/// Fields used when the caller asks for none.
pub const DEFAULT_FIELDS: [&str; 3] = ["host", "ip", "port"];

/// Column layout of one search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPlan {
    fields: Vec<String>,
    index: HashMap<String, usize>,
    requested: usize,
}

impl FieldPlan {
    /// Build the effective field list for `requested` under `options`.
    ///
    /// An empty `requested` list falls back to `defaults`. Requested names are
    /// kept verbatim, repeats included, so trimmed rows have one cell per
    /// requested name; lookups resolve to the first occurrence. Transient
    /// columns are appended in a fixed order, each only when not already
    /// present.
    ///
    /// # Errors
    /// Returns [`SearchError::MissingField`] when `fix_url` is set on an
    /// explicit field list that lacks `host`.
    pub fn build<S: AsRef<str>>(
        requested: &[S],
        defaults: &[String],
        options: &SearchOptions,
        filter: Option<&FilterExpr>,
    ) -> Result<Self> {
        let explicit = !requested.is_empty();
        let mut fields: Vec<String> = if explicit {
            requested.iter().map(|f| f.as_ref().to_string()).collect()
        } else if defaults.is_empty() {
            DEFAULT_FIELDS.iter().map(ToString::to_string).collect()
        } else {
            defaults.to_vec()
        };

        if options.fix_url && !fields.iter().any(|f| f == "host") {
            if explicit {
                return Err(SearchError::MissingField {
                    field: "host",
                    option: "fix_url",
                });
            }
            fields.insert(0, "host".to_string());
        }

        let mut plan = Self {
            index: HashMap::new(),
            requested: 0,
            fields: Vec::with_capacity(fields.len()),
        };
        for field in fields {
            let idx = plan.fields.len();
            plan.index.entry(field.clone()).or_insert(idx);
            plan.fields.push(field);
        }
        plan.requested = plan.fields.len();

        if options.fix_url {
            plan.ensure("protocol");
        }
        if options.uniq_by_ip || options.de_wildcard > 0 {
            plan.ensure("ip");
        }
        if options.is_active > 0 {
            plan.ensure("link");
            plan.ensure("status_code");
        }
        if options.de_wildcard > 0 {
            for field in ["port", "domain", "title", "fid"] {
                plan.ensure(field);
            }
        }
        if let Some(expr) = filter {
            for var in expr.vars() {
                plan.ensure(var);
            }
        }
        if options.dedup_host {
            plan.ensure("type");
            plan.ensure("link");
        }

        Ok(plan)
    }

    /// Position of `field`, appending it when absent.
    fn ensure(&mut self, field: &str) -> usize {
        if let Some(&idx) = self.index.get(field) {
            return idx;
        }
        self.fields.push(field.to_string());
        let idx = self.fields.len() - 1;
        self.index.insert(field.to_string(), idx);
        idx
    }

    /// Effective field list sent to the service.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of columns the caller originally asked for.
    #[must_use]
    pub fn requested_len(&self) -> usize {
        self.requested
    }

    /// Column names returned to the caller after trimming.
    #[must_use]
    pub fn requested_fields(&self) -> &[String] {
        &self.fields[..self.requested]
    }

    /// Position of `field` in the effective list.
    #[must_use]
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.index.get(field).copied()
    }

    /// Whether the column at `idx` is dropped by trimming.
    #[must_use]
    pub fn is_transient(&self, idx: usize) -> bool {
        idx >= self.requested && idx < self.fields.len()
    }

    /// Name to position map.
    #[must_use]
    pub fn index_map(&self) -> &HashMap<String, usize> {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<String> {
        DEFAULT_FIELDS.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_empty_request_uses_defaults() {
        let plan =
            FieldPlan::build::<&str>(&[], &defaults(), &SearchOptions::default(), None).unwrap();
        assert_eq!(plan.fields(), &["host", "ip", "port"]);
        assert_eq!(plan.requested_len(), 3);
    }

    #[test]
    fn test_fix_url_appends_protocol() {
        let options = SearchOptions {
            fix_url: true,
            ..SearchOptions::default()
        };
        let plan = FieldPlan::build(&["host", "title"], &defaults(), &options, None).unwrap();
        assert_eq!(plan.fields(), &["host", "title", "protocol"]);
        assert_eq!(plan.requested_len(), 2);
        assert!(plan.is_transient(2));
        assert!(!plan.is_transient(0));
    }

    #[test]
    fn test_fix_url_without_host_fails() {
        let options = SearchOptions {
            fix_url: true,
            ..SearchOptions::default()
        };
        let err = FieldPlan::build(&["ip", "port"], &defaults(), &options, None).unwrap_err();
        assert!(matches!(err, SearchError::MissingField { field: "host", .. }));
    }

    #[test]
    fn test_fix_url_adds_host_to_default_list() {
        let options = SearchOptions {
            fix_url: true,
            ..SearchOptions::default()
        };
        let custom_defaults = vec!["ip".to_string()];
        let plan = FieldPlan::build::<&str>(&[], &custom_defaults, &options, None).unwrap();
        assert_eq!(plan.fields(), &["host", "ip", "protocol"]);
        assert_eq!(plan.requested_len(), 2);
    }

    #[test]
    fn test_transient_order_and_no_duplicates() {
        let filter = FilterExpr::compile(r#"server contains "nginx" && ip != """#).unwrap();
        let options = SearchOptions {
            fix_url: true,
            uniq_by_ip: true,
            is_active: 1,
            de_wildcard: 3,
            filter: Some(r#"server contains "nginx" && ip != """#.to_string()),
            dedup_host: true,
            ..SearchOptions::default()
        };
        let plan = FieldPlan::build(&["host", "port"], &defaults(), &options, Some(&filter)).unwrap();
        assert_eq!(
            plan.fields(),
            &[
                "host",
                "port",
                "protocol",
                "ip",
                "link",
                "status_code",
                "domain",
                "title",
                "fid",
                "server",
                "type"
            ]
        );
        assert_eq!(plan.requested_len(), 2);
        assert_eq!(plan.index_of("link"), Some(4));
        assert_eq!(plan.index_map().len(), plan.fields().len());
    }

    #[test]
    fn test_repeated_request_names_are_kept() {
        let options = SearchOptions {
            uniq_by_ip: true,
            ..SearchOptions::default()
        };
        let plan = FieldPlan::build(&["ip", "port", "ip"], &defaults(), &options, None).unwrap();
        assert_eq!(plan.fields(), &["ip", "port", "ip"]);
        assert_eq!(plan.requested_len(), 3);
        assert_eq!(plan.index_of("ip"), Some(0));
    }

    #[test]
    fn test_requested_fields_slice() {
        let options = SearchOptions {
            uniq_by_ip: true,
            ..SearchOptions::default()
        };
        let plan = FieldPlan::build(&["host"], &defaults(), &options, None).unwrap();
        assert_eq!(plan.requested_fields(), &["host"]);
        assert_eq!(plan.fields(), &["host", "ip"]);
    }
}
