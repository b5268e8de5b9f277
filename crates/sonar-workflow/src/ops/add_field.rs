//! `add_field`: set a field on every record of the input artifact.

use crate::artifact;
use crate::error::{Result, WorkflowError};
use crate::operation::{Operation, StageContext, StageOutput};
use crate::plan::{DslCall, Invocation};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

pub(crate) const NAME: &str = "add_field";

#[derive(Debug, Deserialize)]
struct AddFieldParams {
    name: String,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    from: Option<FieldSource>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
enum FieldSource {
    Grep { field: String, value: String },
}

/// `grep_add(field, pattern, name)`
pub(crate) fn translate_grep(call: &DslCall) -> Result<Invocation> {
    let field = call.str_arg(0, "field")?;
    let pattern = call.str_arg(1, "pattern")?;
    let name = call.str_arg(2, "name")?;
    Ok(Invocation::new(
        NAME,
        json!({
            "name": name,
            "from": { "method": "grep", "field": field, "value": pattern },
        }),
    ))
}

/// `value_add(name, value)`
pub(crate) fn translate_value(call: &DslCall) -> Result<Invocation> {
    let name = call.str_arg(0, "name")?;
    let value = call
        .arg(1)
        .cloned()
        .ok_or_else(|| call.invalid("missing value".to_string()))?;
    Ok(Invocation::new(NAME, json!({ "name": name, "value": value })))
}

enum Adder {
    Constant(Value),
    Grep { field: String, regex: Regex },
}

impl Adder {
    fn from_params(params: AddFieldParams) -> Result<(String, Self)> {
        let adder = match (params.value, params.from) {
            (Some(value), _) => Self::Constant(value),
            (None, Some(FieldSource::Grep { field, value })) => Self::Grep {
                field,
                regex: Regex::new(&value)?,
            },
            (None, None) => {
                return Err(WorkflowError::InvalidArguments {
                    name: NAME.to_string(),
                    reason: "either value or from is required".to_string(),
                })
            }
        };
        Ok((params.name, adder))
    }

    fn value_for(&self, record: &Value) -> Value {
        match self {
            Self::Constant(value) => value.clone(),
            Self::Grep { field, regex } => {
                let text = lookup(record, field).map(text_of).unwrap_or_default();
                let matches: Vec<Vec<&str>> = regex
                    .captures_iter(&text)
                    .map(|caps| {
                        caps.iter()
                            .map(|group| group.map_or("", |m| m.as_str()))
                            .collect()
                    })
                    .collect();
                json!(matches)
            }
        }
    }
}

/// Resolve a dotted path such as `header.server`.
fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |value, key| value.get(key))
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Field-adding operation over newline-delimited JSON records.
pub struct AddField;

#[async_trait]
impl Operation for AddField {
    async fn run(&self, ctx: &StageContext<'_>, params: &Value) -> Result<StageOutput> {
        let input = ctx
            .input
            .ok_or_else(|| WorkflowError::MissingInput(NAME.to_string()))?
            .to_path_buf();
        let params: AddFieldParams = serde_json::from_value(params.clone())?;
        let (name, adder) = Adder::from_params(params)?;
        let work_dir = ctx.work_dir.to_path_buf();

        let (path, records) = artifact::blocking(move || {
            let mut lines = Vec::new();
            artifact::each_line(&input, |line| {
                let mut record: Value = serde_json::from_str(line)?;
                let value = adder.value_for(&record);
                match record.as_object_mut() {
                    Some(object) => {
                        object.insert(name.clone(), value);
                    }
                    None => {
                        return Err(WorkflowError::InvalidArguments {
                            name: NAME.to_string(),
                            reason: format!("input record is not an object: {line}"),
                        })
                    }
                }
                lines.push(record.to_string());
                Ok(())
            })?;
            let records = lines.len();
            Ok((artifact::write_lines(&work_dir, lines)?, records))
        })
        .await?;

        tracing::debug!(records, path = %path.display(), "added field");
        Ok(StageOutput::artifact(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_grep() {
        let call = DslCall::new(
            "grep_add",
            vec![json!("title"), json!("(\\d+)"), json!("numbers")],
        );
        let invocation = translate_grep(&call).unwrap();
        assert_eq!(invocation.operation, NAME);
        assert_eq!(invocation.params["from"]["method"], "grep");
        assert_eq!(invocation.params["name"], "numbers");
    }

    #[test]
    fn test_translate_value_requires_value() {
        assert!(translate_value(&DslCall::new("value_add", vec![json!("tag")])).is_err());
        let invocation =
            translate_value(&DslCall::new("value_add", vec![json!("tag"), json!(7)])).unwrap();
        assert_eq!(invocation.params, json!({ "name": "tag", "value": 7 }));
    }

    #[test]
    fn test_grep_collects_all_matches_with_groups() {
        let (_, adder) = Adder::from_params(AddFieldParams {
            name: "ver".to_string(),
            value: None,
            from: Some(FieldSource::Grep {
                field: "header.server".to_string(),
                value: r"(\w+)/(\d+)".to_string(),
            }),
        })
        .unwrap();

        let record = json!({ "header": { "server": "nginx/1 php/8" } });
        assert_eq!(
            adder.value_for(&record),
            json!([["nginx/1", "nginx", "1"], ["php/8", "php", "8"]])
        );
        assert_eq!(adder.value_for(&json!({})), json!([]));
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let params = json!({ "name": "x", "from": { "method": "xpath", "field": "a", "value": "b" } });
        assert!(serde_json::from_value::<AddFieldParams>(params).is_err());
    }
}
