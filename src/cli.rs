//! Top-level command surface: usage printer and flat dispatcher.
//!
//! `argv[1]` is matched exactly against the catalog; there is no prefix
//! matching and no nesting. Everything after it belongs to the handler.

use crate::catalog::{Catalog, Operation};
use crate::client::ApiClient;
use crate::commands::handler::{self, Outcome};
use crate::output::{self, ErrorReport, Output};

pub const BIN_NAME: &str = "v3cli";

/// Where a command line goes.
#[derive(Debug, PartialEq)]
pub enum Route<'a> {
    MissingCommand,
    Help,
    Version,
    Manifest,
    Unknown(&'a str),
    Operation(&'a Operation, &'a [String]),
}

/// Two-column listing of every command, names padded to the longest one.
pub fn usage(catalog: &Catalog) -> String {
    let width = catalog
        .operations
        .iter()
        .map(|op| op.name.len())
        .max()
        .unwrap_or(0);

    let mut text = format!("Usage: {} <command> [--flag value ...]\n\nCommands:\n", BIN_NAME);
    for op in &catalog.operations {
        text.push_str(&format!("  {:<width$}  {}\n", op.name, op.summary, width = width));
    }
    text.push_str(&format!(
        "\nRun '{} <command> --help' to list the flags of a command.\n",
        BIN_NAME
    ));
    text
}

/// `args` excludes the program name.
pub fn route<'a>(catalog: &'a Catalog, args: &'a [String]) -> Route<'a> {
    let Some((command, rest)) = args.split_first() else {
        return Route::MissingCommand;
    };
    match command.as_str() {
        "-h" | "--help" | "help" => Route::Help,
        "--version" => Route::Version,
        "--manifest" => Route::Manifest,
        name => match catalog.find(name) {
            Some(op) => Route::Operation(op, rest),
            None => Route::Unknown(name),
        },
    }
}

/// Run one command line to completion and return the exit code.
pub async fn run(catalog: &Catalog, args: &[String], client: &dyn ApiClient, out: &Output) -> i32 {
    match route(catalog, args) {
        Route::MissingCommand => {
            out.help(&usage(catalog));
            1
        }
        Route::Help => {
            out.help(&usage(catalog));
            0
        }
        Route::Version => {
            out.help(&format!("{} {}", BIN_NAME, env!("CARGO_PKG_VERSION")));
            0
        }
        Route::Manifest => {
            output::print_manifest(catalog);
            0
        }
        Route::Unknown(name) => {
            let code = out.error(ErrorReport::new(
                "UNKNOWN_COMMAND",
                &format!("unknown command: {}", name),
            ));
            out.help(&usage(catalog));
            code
        }
        Route::Operation(op, rest) => match handler::run(op, rest, client).await {
            Ok(Outcome::Help(text)) => {
                out.help(&text);
                0
            }
            Ok(Outcome::Response(value)) => {
                out.result(&op.name, &value);
                0
            }
            Err(e) => out.error(ErrorReport::from(&e).with_op(&op.name)),
        },
    }
}
