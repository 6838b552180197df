use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::{Map, Value};

use crate::data::{Row, ShapedElement, Table};
use crate::errors::{Error, ErrorKind, Result};

const BUILTIN_SCHEMA: &str = include_str!("../../config/schema.json");

/// One compiled JSON Schema per record section (`node`, `node_tags`, `way`, ...).
#[derive(Debug)]
pub struct Schema {
    sections: BTreeMap<String, jsonschema::Validator>,
}

impl Schema {
    /// The schema shipped in `config/schema.json`.
    pub fn builtin() -> Result<Schema> {
        Schema::from_value(serde_json::from_str(BUILTIN_SCHEMA)?)
    }

    pub fn from_path(path: &Path) -> Result<Schema> {
        let file = File::open(path).map_err(|err| {
            Error::new(ErrorKind::Config, format!("could not open schema {}: {}", path.display(), err))
        })?;
        Schema::from_value(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Compiles a JSON object mapping section names to JSON Schemas.
    pub fn from_value(value: Value) -> Result<Schema> {
        let sections: BTreeMap<String, Value> = serde_json::from_value(value)?;
        let mut compiled = BTreeMap::new();
        for (section, schema) in sections {
            let validator = jsonschema::validator_for(&schema).map_err(|err| {
                Error::new(ErrorKind::Config, format!("invalid schema for section '{}': {}", section, err))
            })?;
            compiled.insert(section, validator);
        }
        Ok(Schema { sections: compiled })
    }

    pub fn section(&self, name: &str) -> Option<&jsonschema::Validator> {
        self.sections.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub section: &'static str,
    /// Position of the record within a list section such as `node_tags`.
    pub index: Option<usize>,
    /// Offending field, empty when the error concerns the record as a whole.
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.index {
            write!(f, "{}: ", index)?;
        }
        if !self.field.is_empty() {
            write!(f, "{}: ", self.field)?;
        }
        write!(f, "{}", self.message)
    }
}

pub trait Validator {
    fn validate(&self, record: &ShapedElement, schema: &Schema) -> Vec<FieldError>;
}

/// Validates every record of a shaped element against its section's JSON Schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

fn row_value<R: Row>(row: &R) -> Value {
    let fields: Map<String, Value> = row.fields()
        .into_iter()
        .map(|(name, value)| (name.to_string(), Value::String(value)))
        .collect();
    Value::Object(fields)
}

impl SchemaValidator {
    fn check_row<R: Row>(
        table: Table,
        index: Option<usize>,
        row: &R,
        schema: &Schema,
        errors: &mut Vec<FieldError>,
    ) {
        let section = table.section();
        let validator = match schema.section(section) {
            Some(validator) => validator,
            None => {
                errors.push(FieldError {
                    section,
                    index,
                    field: section.to_string(),
                    message: "unknown field".to_string(),
                });
                return;
            },
        };

        let instance = row_value(row);
        for error in validator.iter_errors(&instance) {
            let path = error.instance_path.to_string();
            errors.push(FieldError {
                section,
                index,
                field: path.rsplit('/').next().unwrap_or_default().to_string(),
                message: error.to_string(),
            });
        }
    }

    fn check_rows<R: Row>(table: Table, rows: &[R], schema: &Schema, errors: &mut Vec<FieldError>) {
        for (index, row) in rows.iter().enumerate() {
            Self::check_row(table, Some(index), row, schema, errors);
        }
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, record: &ShapedElement, schema: &Schema) -> Vec<FieldError> {
        let mut errors = Vec::new();
        match record {
            ShapedElement::Node { node, tags } => {
                Self::check_row(Table::Nodes, None, node, schema, &mut errors);
                Self::check_rows(Table::NodesTags, tags, schema, &mut errors);
            },
            ShapedElement::Way { way, nodes, tags } => {
                Self::check_row(Table::Ways, None, way, schema, &mut errors);
                Self::check_rows(Table::WaysNodes, nodes, schema, &mut errors);
                Self::check_rows(Table::WaysTags, tags, schema, &mut errors);
            },
        }
        errors
    }
}

/// Builds the fatal error reported for a record that failed validation.
pub fn validation_error(element_id: &str, errors: &[FieldError]) -> Error {
    let mut message = format!("element {} failed validation", element_id);
    let mut current_section = None;
    for error in errors {
        if current_section != Some(error.section) {
            message.push_str(&format!(
                "\nElement of type '{}' has the following errors:", error.section
            ));
            current_section = Some(error.section);
        }
        message.push_str(&format!("\n  {}", error));
    }
    Error::new(ErrorKind::Validation, message)
}
