//! `fetch`: run a host search and write one JSON object per row.

use crate::artifact;
use crate::error::Result;
use crate::operation::{Operation, StageContext, StageOutput};
use crate::plan::{DslCall, Invocation};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sonar_core::{FetchSize, SearchOptions};
use sonar_search::{SearchClient, ACTIVE_FIELD};
use std::sync::Arc;

pub(crate) const NAME: &str = "fetch";

const DEFAULT_SIZE: i64 = 10;

fn default_size() -> i64 {
    DEFAULT_SIZE
}

#[derive(Debug, Deserialize)]
struct FetchParams {
    query: String,
    #[serde(default = "default_size")]
    size: i64,
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    options: SearchOptions,
}

/// `fetch(query[, size[, "f1,f2"]])`
pub(crate) fn translate(call: &DslCall) -> Result<Invocation> {
    let query = call.str_arg(0, "query")?;
    let size = match call.arg(1) {
        None => DEFAULT_SIZE,
        Some(value) => value
            .as_i64()
            .ok_or_else(|| call.invalid(format!("size must be an integer, got {value}")))?,
    };
    let fields: Vec<String> = match call.arg(2) {
        None => Vec::new(),
        Some(Value::String(list)) => list
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(ToString::to_string)
            .collect(),
        Some(other) => {
            return Err(call.invalid(format!(
                "fields must be a comma-separated string, got {other}"
            )))
        }
    };

    Ok(Invocation::new(
        NAME,
        json!({ "query": query, "size": size, "fields": fields }),
    ))
}

/// Search operation backed by a shared [`SearchClient`].
pub struct Fetch {
    client: Arc<SearchClient>,
}

impl Fetch {
    /// Create the operation around `client`.
    #[must_use]
    pub fn new(client: Arc<SearchClient>) -> Self {
        Self { client }
    }
}

fn row_object(fields: &[String], row: &[String]) -> Value {
    let object: Map<String, Value> = fields
        .iter()
        .zip(row)
        .map(|(field, cell)| {
            let value = if field == ACTIVE_FIELD {
                Value::Bool(cell == "true")
            } else {
                Value::String(cell.clone())
            };
            (field.clone(), value)
        })
        .collect();
    Value::Object(object)
}

#[async_trait]
impl Operation for Fetch {
    async fn run(&self, ctx: &StageContext<'_>, params: &Value) -> Result<StageOutput> {
        let params: FetchParams = serde_json::from_value(params.clone())?;

        let results = self
            .client
            .host_search(
                &params.query,
                FetchSize::from_raw(params.size),
                &params.fields,
                &params.options,
            )
            .await?;

        let lines: Vec<String> = results
            .rows
            .iter()
            .map(|row| row_object(&results.fields, row).to_string())
            .collect();
        let work_dir = ctx.work_dir.to_path_buf();
        let path = artifact::blocking(move || artifact::write_lines(&work_dir, lines)).await?;

        tracing::info!(
            run_id = %ctx.run_id,
            query = %params.query,
            rows = results.rows.len(),
            "fetch stage finished"
        );
        Ok(StageOutput::artifact(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_splits_fields() {
        let call = DslCall::new("fetch", vec![json!("port=80"), json!(5), json!("ip, port")]);
        let invocation = translate(&call).unwrap();
        assert_eq!(invocation.operation, NAME);
        assert_eq!(
            invocation.params,
            json!({ "query": "port=80", "size": 5, "fields": ["ip", "port"] })
        );
    }

    #[test]
    fn test_translate_defaults_and_errors() {
        let invocation = translate(&DslCall::new("fetch", vec![json!("port=80")])).unwrap();
        assert_eq!(invocation.params["size"], json!(DEFAULT_SIZE));
        assert_eq!(invocation.params["fields"], json!([]));

        assert!(translate(&DslCall::new("fetch", vec![])).is_err());
        assert!(translate(&DslCall::new("fetch", vec![json!("q"), json!("ten")])).is_err());
    }

    #[test]
    fn test_row_object_types_active_column() {
        let fields = vec!["host".to_string(), ACTIVE_FIELD.to_string()];
        let row = vec!["a.com".to_string(), "true".to_string()];
        assert_eq!(
            row_object(&fields, &row),
            json!({ "host": "a.com", "is_active": true })
        );
    }
}
