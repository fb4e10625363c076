//! C3 — the entry parser. Converts one complete line into a [`Record`] via
//! one of three mutually exclusive strategies, sharing the uniform contract
//! `(line) -> Result<Option<Record>, ParseError>` (`spec.md` §4.3, §9
//! "Polymorphism over three parse strategies").

use crate::config::ParserConfig;
use crate::error::ParseError;
use crate::record::Record;

/// A concrete, already-validated parser built from a [`ParserConfig`].
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Parser { config }
    }

    pub fn is_pattern_mode(&self) -> bool {
        matches!(self.config, ParserConfig::Pattern { .. })
    }

    /// Parse one already-trimmed, non-blank line.
    ///
    /// `Ok(None)` only ever comes from custom mode ("ignore this line").
    pub fn parse(&self, line: &str) -> Result<Option<Record>, ParseError> {
        match &self.config {
            ParserConfig::Pattern { pattern, field_names } => {
                Self::parse_pattern(pattern, field_names, line)
            }
            ParserConfig::Json { schema } => Self::parse_json(schema.as_deref(), line),
            ParserConfig::Custom(f) => f(line)
                .map_err(|message| ParseError::CustomParseFailure {
                    raw_line: line.to_owned(),
                    message,
                }),
        }
    }

    fn parse_pattern(
        pattern: &regex::Regex,
        field_names: &[String],
        line: &str,
    ) -> Result<Option<Record>, ParseError> {
        let trimmed = line.trim();
        let Some(captures) = pattern.captures(trimmed) else {
            return Err(ParseError::PatternViolation {
                raw_line: line.to_owned(),
            });
        };

        let mut record = Record::new();
        for (idx, name) in field_names.iter().enumerate() {
            // Capture group 0 is the whole match; named fields start at 1.
            if let Some(m) = captures.get(idx + 1) {
                record.insert(name.clone(), m.as_str().to_owned());
            }
            // A capture that did not participate in the match yields an
            // absent field: no entry, never an empty string (spec.md §3).
        }
        Ok(Some(record))
    }

    fn parse_json(
        schema: Option<&jsonschema::Validator>,
        line: &str,
    ) -> Result<Option<Record>, ParseError> {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| ParseError::MalformedDocument {
                raw_line: line.to_owned(),
                source_display: e.to_string(),
            })?;

        if let Some(validator) = schema {
            let errors: Vec<String> = validator
                .iter_errors(&value)
                .map(|e| e.to_string())
                .collect();
            if !errors.is_empty() {
                return Err(ParseError::SchemaViolation {
                    raw_line: line.to_owned(),
                    detail: errors.join("\n"),
                });
            }
        }

        let record = match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (k, crate::record::Value::Json(v)))
                .collect(),
            other => {
                let mut r = Record::new();
                r.insert("value", other);
                r
            }
        };
        Ok(Some(record))
    }
}
