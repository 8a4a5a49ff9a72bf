use crate::catalog::{Catalog, Endpoint};
use crate::form::{form_fields, RequestDraft};
use crate::http::ResponseRecord;
use crate::identity::TestUser;
use std::fmt::Write as _;

/// Display-only classification of a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    ClientIssue,
    ServerIssue,
    Transport,
}

impl StatusClass {
    pub fn of(status: Option<u16>) -> Self {
        match status {
            None => StatusClass::Transport,
            Some(s) if s < 300 => StatusClass::Success,
            Some(s) if s < 500 => StatusClass::ClientIssue,
            Some(_) => StatusClass::ServerIssue,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusClass::Success => "ok",
            StatusClass::ClientIssue => "client error",
            StatusClass::ServerIssue => "server error",
            StatusClass::Transport => "no response",
        }
    }
}

pub fn endpoint_line(endpoint: &Endpoint) -> String {
    format!(
        "{:<6} {:<36} {}  ({})",
        endpoint.method.as_str(),
        endpoint.id,
        endpoint.path,
        endpoint.name
    )
}

pub fn user_line(user: &TestUser) -> String {
    let mut line = format!("{:>4}  {:<8} {}", user.id, user.kind.as_str(), user.name);
    if let Some(username) = &user.username {
        let _ = write!(line, " {username}");
    }
    line
}

/// Category lines with the number of endpoints in each.
pub fn category_lines(catalog: &Catalog) -> Vec<String> {
    let mut lines = vec![format!("all  All Endpoints ({})", catalog.endpoints().len())];
    for category in catalog.categories() {
        lines.push(format!(
            "{} {}  {} ({})",
            category.id,
            category.icon,
            category.name,
            catalog.count_in(&category.id)
        ));
    }
    lines
}

/// Descriptor header plus one line per form field, with current draft values.
pub fn describe(endpoint: &Endpoint, draft: Option<&RequestDraft>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", endpoint.method, endpoint.path);
    let _ = writeln!(out, "  id: {}", endpoint.id);
    let _ = writeln!(out, "  name: {}", endpoint.name);
    let _ = writeln!(out, "  description: {}", endpoint.description);
    let _ = writeln!(out, "  category: {}", endpoint.category);
    let _ = writeln!(out, "  visible to: {}", endpoint.user_type);

    let fields = form_fields(endpoint);
    if fields.is_empty() {
        return out;
    }
    let _ = writeln!(out, "  params:");
    for field in fields {
        let param = field.param;
        let _ = write!(
            out,
            "    [{}] --{}  {} ({})",
            field.location,
            field.flag,
            param.kind,
            field.widget.as_str()
        );
        if param.required {
            out.push_str(" *required");
        }
        if let Some(description) = &param.description {
            let _ = write!(out, "  {description}");
        }
        if let Some(example) = &param.example {
            let _ = write!(out, "  e.g. {example}");
        }
        if let Some(default) = &param.default {
            let _ = write!(out, "  default {default}");
        }
        if let Some(value) = draft.and_then(|d| d.get(field.location, &param.name)) {
            let _ = write!(out, "  = {value}");
        }
        out.push('\n');
    }
    out
}

pub fn response(record: &ResponseRecord, pretty: bool) -> serde_json::Result<String> {
    let class = StatusClass::of(record.status);
    let status = record
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut out = format!("Status: {status} ({})  {}ms\n", class.label(), record.elapsed_ms);
    if let Some(error) = &record.error {
        let _ = writeln!(out, "Error: {error}");
    }
    out.push_str(&payload(record, pretty)?);
    out.push('\n');
    Ok(out)
}

pub fn payload(record: &ResponseRecord, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(&record.payload)
    } else {
        serde_json::to_string(&record.payload)
    }
}
