//! Operation catalog: the schema every command is generated from.
//!
//! The catalog is a JSON document listing API operations. Each operation
//! names its command, HTTP method, path template and the parameters that
//! become flags. The embedded copy ships with the binary; `V3CLI_CATALOG`
//! points at a replacement file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::config::Settings;

const EMBEDDED_CATALOG: &str = include_str!("../catalog/operations.json");

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One API operation, exposed as one command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Operation {
    pub name: String,
    pub summary: String,
    pub method: HttpMethod,
    /// Path template relative to the API endpoint, e.g. `/instance/{id}:start`.
    pub path: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub query: Vec<Param>,
    /// `None` when the operation sends no request body at all.
    #[serde(default)]
    pub body: Option<Vec<Param>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Uuid,
    StringList,
    Enum,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Uuid => "uuid",
            ParamKind::StringList => "string-list",
            ParamKind::Enum => "enum",
        }
    }
}

/// Where a bound flag value ends up in the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Path,
    Query,
    Body,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Path => "path",
            Location::Query => "query",
            Location::Body => "body",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Param {
    /// Long flag name. Dots separate nested body objects (`healthcheck.port`).
    pub flag: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(default)]
    pub help: String,
    /// Shown in help and used as the parsed default; never sent unless the
    /// flag is given explicitly.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Server-side type name for enum parameters.
    #[serde(default, rename = "enum")]
    pub enum_name: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

impl Param {
    /// JSON key path of a body parameter.
    pub fn segments(&self) -> Vec<&str> {
        self.flag.split('.').collect()
    }
}

impl Operation {
    pub fn body_params(&self) -> &[Param] {
        self.body.as_deref().unwrap_or(&[])
    }

    /// Every flag the operation declares, tagged with its destination.
    pub fn flags(&self) -> impl Iterator<Item = (Location, &Param)> {
        self.params
            .iter()
            .map(|p| (Location::Path, p))
            .chain(self.query.iter().map(|p| (Location::Query, p)))
            .chain(self.body_params().iter().map(|p| (Location::Body, p)))
    }

    pub fn has_flags(&self) -> bool {
        self.flags().next().is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("operation with path {} has an empty name", self.path);
        }

        let placeholders: HashSet<&str> = placeholders(&self.path)?.into_iter().collect();
        let declared: HashSet<&str> = self.params.iter().map(|p| p.flag.as_str()).collect();
        if let Some(missing) = placeholders.difference(&declared).next() {
            bail!("{}: path placeholder {{{}}} has no path parameter", self.name, missing);
        }
        if let Some(unused) = declared.difference(&placeholders).next() {
            bail!("{}: path parameter --{} does not appear in {}", self.name, unused, self.path);
        }

        let mut seen = HashSet::new();
        for (location, param) in self.flags() {
            if param.flag.is_empty() || param.flag.split('.').any(str::is_empty) {
                bail!("{}: malformed flag name {:?}", self.name, param.flag);
            }
            if param.flag == "help" {
                bail!("{}: --help is reserved", self.name);
            }
            if location != Location::Body && param.flag.contains('.') {
                bail!("{}: only body flags may be nested (--{})", self.name, param.flag);
            }
            if !seen.insert(param.flag.as_str()) {
                bail!("{}: duplicate flag --{}", self.name, param.flag);
            }
        }

        // A body flag cannot be both a leaf value and a parent object.
        for leaf in self.body_params() {
            let prefix = format!("{}.", leaf.flag);
            if let Some(child) = self.body_params().iter().find(|p| p.flag.starts_with(&prefix)) {
                bail!(
                    "{}: --{} is both a value and the parent of --{}",
                    self.name,
                    leaf.flag,
                    child.flag
                );
            }
        }

        Ok(())
    }
}

/// Placeholder names of a path template, in order.
pub fn placeholders(path: &str) -> Result<Vec<&str>> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            bail!("unterminated placeholder in {}", path);
        };
        names.push(&after[..end]);
        rest = &after[end + 1..];
    }
    Ok(names)
}

impl Catalog {
    pub fn parse(json: &str) -> Result<Self> {
        let catalog: Catalog =
            serde_json::from_str(json).context("Failed to parse operation catalog")?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn embedded() -> Result<Self> {
        Self::parse(EMBEDDED_CATALOG)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog from {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Invalid catalog {:?}", path))
    }

    /// Embedded catalog unless the settings name another file.
    pub fn load(settings: &Settings) -> Result<Self> {
        match &settings.catalog {
            Some(path) => Self::from_path(path),
            None => Self::embedded(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for op in &self.operations {
            op.validate()?;
            if !names.insert(op.name.as_str()) {
                bail!("duplicate command name {}", op.name);
            }
        }
        Ok(())
    }

    /// Exact, case-sensitive lookup.
    pub fn find(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name == name)
    }
}
