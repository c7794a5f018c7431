//! Runs one catalog operation: help short-circuit, parse, one API call.

use clap::error::ErrorKind;
use serde_json::Value;
use tracing::debug;

use crate::catalog::Operation;
use crate::client::ApiClient;
use crate::commands::binder;
use crate::error::CliError;

#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Usage was requested; no call was made.
    Help(String),
    Response(Value),
}

pub async fn run(
    op: &Operation,
    args: &[String],
    client: &dyn ApiClient,
) -> Result<Outcome, CliError> {
    let mut command = binder::build_command(op);

    if wants_help(op, args) {
        return Ok(Outcome::Help(command.render_help().to_string()));
    }

    let matches = match command.try_get_matches_from_mut(args) {
        Ok(matches) => matches,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => return Ok(Outcome::Help(e.to_string())),
        Err(e) => {
            let message = e.to_string();
            let message = message.trim_start_matches("error: ").trim_end();
            return Err(CliError::Args(message.to_string()));
        }
    };

    let request = binder::bind(op, &matches)?;
    debug!(op = %op.name, ?request, "bound request");

    let response = client.call(op, &request).await?;
    Ok(Outcome::Response(response))
}

/// No arguments at all, or a leading -h/--help, shows usage. Operations
/// without any flag have nothing to show and run straight away.
fn wants_help(op: &Operation, args: &[String]) -> bool {
    match args.first().map(String::as_str) {
        None => op.has_flags(),
        Some("-h") | Some("--help") => true,
        Some(_) => false,
    }
}
