//! Schema → flag set, and flag set → request.
//!
//! A value reaches the request only when clap reports that it came from the
//! command line. Declared defaults show up in help and are parsed, but an
//! omitted flag leaves its field absent so the server default applies.

use clap::builder::BoolishValueParser;
use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::{Map, Number, Value};
use std::fmt;
use uuid::Uuid;

use crate::catalog::{Location, Operation, Param, ParamKind};
use crate::cli::BIN_NAME;
use crate::error::CliError;

/// A typed path argument, handed to the client separately from the body.
#[derive(Debug, Clone, PartialEq)]
pub enum PathValue {
    Uuid(Uuid),
    Text(String),
}

impl fmt::Display for PathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValue::Uuid(id) => write!(f, "{}", id),
            PathValue::Text(text) => f.write_str(text),
        }
    }
}

/// One invocation's request, built from the changed flags only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub path: Vec<(String, PathValue)>,
    pub query: Vec<(String, String)>,
    /// `None` when the operation has no body schema.
    pub body: Option<Map<String, Value>>,
}

pub fn build_command(op: &Operation) -> Command {
    let mut command = Command::new(op.name.clone())
        .bin_name(format!("{} {}", BIN_NAME, op.name))
        .about(op.summary.clone())
        .no_binary_name(true);

    for (location, param) in op.flags() {
        command = command.arg(build_arg(location, param));
    }
    command
}

fn build_arg(location: Location, param: &Param) -> Arg {
    let mut help = param.help.clone();
    if location == Location::Path || param.required {
        help.push_str(" (required)");
    }
    if let Some(enum_name) = &param.enum_name {
        if param.values.is_empty() {
            help.push_str(&format!(" [{}]", enum_name));
        } else {
            help.push_str(&format!(" [{}: {}]", enum_name, param.values.join(", ")));
        }
    }

    let arg = Arg::new(param.flag.clone())
        .long(param.flag.clone())
        .help(help)
        .value_name(param.kind.as_str().to_uppercase());

    let arg = match param.kind {
        // Enum values are not checked here; the server rejects unknown ones.
        ParamKind::String | ParamKind::Enum => arg
            .action(ArgAction::Set)
            .value_parser(value_parser!(String)),
        ParamKind::Integer => arg
            .action(ArgAction::Set)
            .allow_negative_numbers(true)
            .value_parser(value_parser!(i64)),
        ParamKind::Number => arg
            .action(ArgAction::Set)
            .allow_negative_numbers(true)
            .value_parser(value_parser!(f64)),
        ParamKind::Boolean => arg
            .action(ArgAction::Set)
            .num_args(0..=1)
            .default_missing_value("true")
            .value_parser(BoolishValueParser::new()),
        ParamKind::Uuid => arg.action(ArgAction::Set).value_parser(parse_uuid),
        ParamKind::StringList => arg
            .action(ArgAction::Append)
            .value_delimiter(',')
            .value_parser(value_parser!(String)),
    };

    match &param.default {
        Some(default) => arg.default_value(default.clone()),
        None => arg,
    }
}

fn parse_uuid(value: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(value)
}

/// Copy every changed flag into a fresh request.
pub fn bind(op: &Operation, matches: &ArgMatches) -> Result<Request, CliError> {
    let mut request = Request {
        body: op.body.as_ref().map(|_| Map::new()),
        ..Request::default()
    };

    for (location, param) in op.flags() {
        match location {
            Location::Path => {
                let value = path_value(matches, param)?;
                request.path.push((param.flag.clone(), value));
            }
            Location::Query => {
                if let Some(value) = changed_value(matches, param)? {
                    for text in query_texts(&value) {
                        request.query.push((param.flag.clone(), text));
                    }
                }
            }
            Location::Body => {
                if let (Some(value), Some(body)) = (changed_value(matches, param)?, request.body.as_mut()) {
                    insert_nested(body, &param.segments(), value)?;
                }
            }
        }
    }

    Ok(request)
}

/// `Some` only when the user passed the flag explicitly.
fn changed_value(matches: &ArgMatches, param: &Param) -> Result<Option<Value>, CliError> {
    if matches.value_source(&param.flag) != Some(ValueSource::CommandLine) {
        return Ok(None);
    }
    parsed_value(matches, param)
}

fn parsed_value(matches: &ArgMatches, param: &Param) -> Result<Option<Value>, CliError> {
    let id = param.flag.as_str();
    let value = match param.kind {
        ParamKind::String | ParamKind::Enum => {
            matches.get_one::<String>(id).map(|s| Value::String(s.clone()))
        }
        ParamKind::Integer => matches.get_one::<i64>(id).map(|n| Value::from(*n)),
        ParamKind::Number => match matches.get_one::<f64>(id) {
            Some(n) => Some(Value::Number(Number::from_f64(*n).ok_or_else(|| {
                CliError::Args(format!("--{} must be a finite number", id))
            })?)),
            None => None,
        },
        ParamKind::Boolean => matches.get_one::<bool>(id).map(|b| Value::Bool(*b)),
        ParamKind::Uuid => matches.get_one::<Uuid>(id).map(|u| Value::String(u.to_string())),
        ParamKind::StringList => matches
            .get_many::<String>(id)
            .map(|values| Value::Array(values.map(|s| Value::String(s.clone())).collect())),
    };
    Ok(value)
}

/// Path arguments are positional: an omitted one is passed as the zero
/// value and left for the server to reject.
fn path_value(matches: &ArgMatches, param: &Param) -> Result<PathValue, CliError> {
    match param.kind {
        ParamKind::Uuid => Ok(PathValue::Uuid(
            matches
                .get_one::<Uuid>(&param.flag)
                .copied()
                .unwrap_or_else(Uuid::nil),
        )),
        _ => Ok(PathValue::Text(
            parsed_value(matches, param)?
                .map(|v| scalar_text(&v))
                .unwrap_or_default(),
        )),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn query_texts(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(scalar_text).collect(),
        other => vec![scalar_text(other)],
    }
}

/// Assign `value` at `segments`, creating each missing parent object once.
/// Fails if a parent position already holds a non-object value.
pub fn insert_nested(
    body: &mut Map<String, Value>,
    segments: &[&str],
    value: Value,
) -> Result<(), CliError> {
    let conflict = || CliError::FieldConflict {
        flag: segments.join("."),
    };
    let Some((leaf, parents)) = segments.split_last() else {
        return Err(conflict());
    };

    let mut node = body;
    for segment in parents {
        let entry = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        node = match entry {
            Value::Object(map) => map,
            _ => return Err(conflict()),
        };
    }
    node.insert(leaf.to_string(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use serde_json::json;

    fn operation(name: &str) -> Operation {
        Catalog::embedded()
            .expect("embedded catalog")
            .find(name)
            .cloned()
            .expect("operation")
    }

    fn bind_args(op: &Operation, args: &[&str]) -> Result<Request, CliError> {
        let matches = build_command(op)
            .try_get_matches_from(args)
            .map_err(|e| CliError::Args(e.to_string()))?;
        bind(op, &matches)
    }

    #[test]
    fn omitted_flags_stay_absent() {
        let op = operation("create-instance");
        let request = bind_args(&op, &["--name", "web"]).unwrap();
        // auto-start declares a default of true, yet nothing is sent
        assert_eq!(request.body, Some(json!({"name": "web"}).as_object().unwrap().clone()));
    }

    #[test]
    fn explicit_zero_values_are_sent() {
        let op = operation("create-instance");
        let request = bind_args(
            &op,
            &["--disk-size", "0", "--name", "", "--auto-start=false", "--ipv6-enabled", "false"],
        )
        .unwrap();
        let body = Value::Object(request.body.unwrap());
        assert_eq!(
            body,
            json!({"disk-size": 0, "name": "", "auto-start": false, "ipv6-enabled": false})
        );
    }

    #[test]
    fn bare_boolean_flag_means_true() {
        let op = operation("create-sks-cluster");
        let request = bind_args(&op, &["--auto-upgrade", "--name", "k8s"]).unwrap();
        let body = Value::Object(request.body.unwrap());
        assert_eq!(body, json!({"auto-upgrade": true, "name": "k8s"}));
    }

    #[test]
    fn nested_flags_share_one_parent() {
        let op = operation("add-service-to-load-balancer");
        let request = bind_args(
            &op,
            &[
                "--id",
                "9ae5ba7c-3f8a-4b55-a71a-a0b0b04d8d2b",
                "--healthcheck.mode",
                "http",
                "--healthcheck.port",
                "8080",
                "--healthcheck.uri",
                "/health",
                "--port",
                "80",
            ],
        )
        .unwrap();
        let body = Value::Object(request.body.unwrap());
        assert_eq!(
            body,
            json!({
                "healthcheck": {"mode": "http", "port": 8080, "uri": "/health"},
                "port": 80
            })
        );
    }

    #[test]
    fn nested_parent_not_allocated_without_leaves() {
        let op = operation("create-dbaas-external-endpoint-datadog");
        let request = bind_args(&op, &["--name", "dd"]).unwrap();
        assert_eq!(request.body, Some(Map::new()));
        assert_eq!(request.path, vec![("name".to_string(), PathValue::Text("dd".into()))]);
    }

    #[test]
    fn enum_values_pass_through_unchecked() {
        let op = operation("create-dbaas-external-endpoint-datadog");
        let request = bind_args(
            &op,
            &["--name", "dd", "--settings.site", "not-a-site", "--settings.max-partition-contexts", "0"],
        )
        .unwrap();
        let body = Value::Object(request.body.unwrap());
        assert_eq!(
            body,
            json!({"settings": {"site": "not-a-site", "max-partition-contexts": 0}})
        );
    }

    #[test]
    fn path_params_never_reach_the_body() {
        let op = operation("resize-instance-disk");
        let request = bind_args(
            &op,
            &["--id", "9ae5ba7c-3f8a-4b55-a71a-a0b0b04d8d2b", "--disk-size", "100"],
        )
        .unwrap();
        let id = Uuid::parse_str("9ae5ba7c-3f8a-4b55-a71a-a0b0b04d8d2b").unwrap();
        assert_eq!(request.path, vec![("id".to_string(), PathValue::Uuid(id))]);
        assert_eq!(Value::Object(request.body.unwrap()), json!({"disk-size": 100}));
    }

    #[test]
    fn missing_path_param_becomes_zero_value() {
        let op = operation("resize-instance-disk");
        let request = bind_args(&op, &["--disk-size", "100"]).unwrap();
        assert_eq!(request.path, vec![("id".to_string(), PathValue::Uuid(Uuid::nil()))]);
    }

    #[test]
    fn malformed_uuid_is_a_parse_error() {
        let op = operation("get-instance");
        assert!(bind_args(&op, &["--id", "nope"]).is_err());
    }

    #[test]
    fn operations_without_body_schema_send_none() {
        let op = operation("stop-instance");
        let request = bind_args(&op, &["--id", "9ae5ba7c-3f8a-4b55-a71a-a0b0b04d8d2b"]).unwrap();
        assert!(request.body.is_none());
    }

    #[test]
    fn query_flags_only_when_changed() {
        let op = operation("list-instances");
        let request = bind_args(&op, &["--ip-address", "1.2.3.4"]).unwrap();
        assert_eq!(request.query, vec![("ip-address".to_string(), "1.2.3.4".to_string())]);
        assert!(request.body.is_none());
    }

    #[test]
    fn string_lists_accept_commas_and_repeats() {
        let op = operation("create-sks-cluster");
        let request = bind_args(
            &op,
            &["--addons", "exoscale-cloud-controller,metrics-server", "--addons", "karpenter"],
        )
        .unwrap();
        assert_eq!(
            Value::Object(request.body.unwrap()),
            json!({"addons": ["exoscale-cloud-controller", "metrics-server", "karpenter"]})
        );
    }

    #[test]
    fn negative_integers_parse() {
        let op = operation("add-rule-to-security-group");
        let request = bind_args(&op, &["--icmp.code", "-1", "--icmp.type", "8"]).unwrap();
        assert_eq!(
            Value::Object(request.body.unwrap()),
            json!({"icmp": {"code": -1, "type": 8}})
        );
    }

    #[test]
    fn insert_nested_rejects_scalar_parent() {
        let mut body = Map::new();
        body.insert("settings".into(), json!("flat"));
        let err = insert_nested(&mut body, &["settings", "site"], json!("x")).unwrap_err();
        assert!(matches!(err, CliError::FieldConflict { ref flag } if flag == "settings.site"));
        assert_eq!(err.code(), "FIELD_CONFLICT");
        assert!(insert_nested(&mut body, &[], json!("x")).is_err());
        assert_eq!(body["settings"], json!("flat"));
    }

    #[test]
    fn help_lists_enum_values_and_required_marks() {
        let op = operation("create-dbaas-external-endpoint-datadog");
        let help = build_command(&op).render_help().to_string();
        assert!(help.contains("--settings.site"));
        assert!(help.contains("EnumDatadogSite"));
        assert!(help.contains("datadoghq.eu"));
        assert!(help.contains("(required)"));
    }
}
