use crate::catalog::{Endpoint, EndpointParam, ParamKind};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    /// Free text, may span lines. Parsed as a JSON array.
    MultiLine,
    /// unset / true / false
    TriState,
    SingleLine,
}

impl Widget {
    pub fn for_kind(kind: ParamKind) -> Self {
        match kind {
            ParamKind::Array => Widget::MultiLine,
            ParamKind::Boolean => Widget::TriState,
            ParamKind::String | ParamKind::Number | ParamKind::Date => Widget::SingleLine,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Widget::MultiLine => "multi-line",
            Widget::TriState => "true|false|unset",
            Widget::SingleLine => "text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamLocation {
    Path,
    Query,
    Body,
}

impl ParamLocation {
    pub const ALL: [ParamLocation; 3] = [ParamLocation::Path, ParamLocation::Query, ParamLocation::Body];

    pub fn as_str(self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Body => "body",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "path" => Some(ParamLocation::Path),
            "query" => Some(ParamLocation::Query),
            "body" => Some(ParamLocation::Body),
            _ => None,
        }
    }

    pub fn params(self, endpoint: &Endpoint) -> &[EndpointParam] {
        match self {
            ParamLocation::Path => &endpoint.path_params,
            ParamLocation::Query => &endpoint.query_params,
            ParamLocation::Body => &endpoint.body_params,
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct FormField<'a> {
    pub location: ParamLocation,
    pub param: &'a EndpointParam,
    pub widget: Widget,
    /// CLI flag, unique within the endpoint.
    pub flag: String,
}

/// One field per parameter: path, then query, then body.
pub fn form_fields(endpoint: &Endpoint) -> Vec<FormField<'_>> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for location in ParamLocation::ALL {
        for param in location.params(endpoint) {
            *seen.entry(param.name.as_str()).or_default() += 1;
        }
    }

    let mut fields = Vec::new();
    for location in ParamLocation::ALL {
        for param in location.params(endpoint) {
            let flag = if seen.get(param.name.as_str()).copied().unwrap_or(0) > 1 {
                format!("{}-{}", location, param.name)
            } else {
                param.name.clone()
            };
            fields.push(FormField {
                location,
                param,
                widget: Widget::for_kind(param.kind),
                flag,
            });
        }
    }
    fields
}

/// A captured parameter value, typed by the declared kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    /// `raw` is what was typed and goes into paths and queries; `value` is the
    /// JSON body form.
    Number { raw: String, value: Number },
    Bool(bool),
    Date(String),
    Array(Vec<String>),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Text(_) => ParamKind::String,
            ParamValue::Number { .. } => ParamKind::Number,
            ParamValue::Bool(_) => ParamKind::Boolean,
            ParamValue::Date(_) => ParamKind::Date,
            ParamValue::Array(_) => ParamKind::Array,
        }
    }

    /// Plain string forms: one for scalars, one per element for arrays.
    pub fn text_values(&self) -> Vec<String> {
        match self {
            ParamValue::Text(s) | ParamValue::Date(s) => vec![s.clone()],
            ParamValue::Number { raw, .. } => vec![raw.clone()],
            ParamValue::Bool(b) => vec![b.to_string()],
            ParamValue::Array(items) => items.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Text(s) | ParamValue::Date(s) => Value::String(s.clone()),
            ParamValue::Number { value, .. } => Value::Number(value.clone()),
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::Array(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Array(_) => write!(f, "{}", self.to_json()),
            _ => f.write_str(&self.text_values().join("")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("{name}: expected a number, got {raw:?}")]
    InvalidNumber { name: String, raw: String },

    #[error("{name}: expected true or false, got {raw:?}")]
    InvalidBoolean { name: String, raw: String },

    #[error("{name}: expected a JSON array ({reason})")]
    InvalidArray { name: String, reason: String },
}

/// Converts raw input for `param`. Empty input means "no value supplied".
pub fn capture(param: &EndpointParam, raw: &str) -> Result<Option<ParamValue>, FieldError> {
    if raw.is_empty() {
        return Ok(None);
    }
    let value = match param.kind {
        ParamKind::String => ParamValue::Text(raw.to_string()),
        ParamKind::Date => ParamValue::Date(raw.to_string()),
        ParamKind::Number => {
            let raw = raw.trim();
            let value = parse_number(raw).ok_or_else(|| FieldError::InvalidNumber {
                name: param.name.clone(),
                raw: raw.to_string(),
            })?;
            ParamValue::Number {
                raw: raw.to_string(),
                value,
            }
        }
        ParamKind::Boolean => match raw.trim() {
            "true" => ParamValue::Bool(true),
            "false" => ParamValue::Bool(false),
            _ => {
                return Err(FieldError::InvalidBoolean {
                    name: param.name.clone(),
                    raw: raw.to_string(),
                })
            }
        },
        ParamKind::Array => ParamValue::Array(parse_json_list(&param.name, raw)?),
    };
    Ok(Some(value))
}

/// JSON number grammar, plus leading zeros on the integer part (`007`).
fn parse_number(raw: &str) -> Option<Number> {
    let (sign, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw),
    };
    if !unsigned.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let trimmed = unsigned.trim_start_matches('0');
    let normalized = if trimmed.is_empty() || trimmed.starts_with(['.', 'e', 'E']) {
        format!("{sign}0{trimmed}")
    } else {
        format!("{sign}{trimmed}")
    };
    match serde_json::from_str::<Value>(&normalized) {
        Ok(Value::Number(n)) => Some(n),
        _ => None,
    }
}

fn parse_json_list(name: &str, raw: &str) -> Result<Vec<String>, FieldError> {
    let invalid = |reason: String| FieldError::InvalidArray {
        name: name.to_string(),
        reason,
    };
    let parsed: Value = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
    let Value::Array(items) = parsed else {
        return Err(invalid("not an array".to_string()));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(invalid(format!("unsupported element {other}"))),
        })
        .collect()
}

/// Values entered for the active endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDraft {
    path: BTreeMap<String, ParamValue>,
    query: BTreeMap<String, ParamValue>,
    body: BTreeMap<String, ParamValue>,
}

impl RequestDraft {
    fn slot(&self, location: ParamLocation) -> &BTreeMap<String, ParamValue> {
        match location {
            ParamLocation::Path => &self.path,
            ParamLocation::Query => &self.query,
            ParamLocation::Body => &self.body,
        }
    }

    fn slot_mut(&mut self, location: ParamLocation) -> &mut BTreeMap<String, ParamValue> {
        match location {
            ParamLocation::Path => &mut self.path,
            ParamLocation::Query => &mut self.query,
            ParamLocation::Body => &mut self.body,
        }
    }

    /// `None` clears the entry.
    pub fn set(&mut self, location: ParamLocation, name: &str, value: Option<ParamValue>) {
        let slot = self.slot_mut(location);
        match value {
            Some(value) => {
                slot.insert(name.to_string(), value);
            }
            None => {
                slot.remove(name);
            }
        }
    }

    pub fn get(&self, location: ParamLocation, name: &str) -> Option<&ParamValue> {
        self.slot(location).get(name)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.path.is_empty() && self.query.is_empty() && self.body.is_empty()
    }

    pub fn clear(&mut self) {
        self.path.clear();
        self.query.clear();
        self.body.clear();
    }
}
