use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

const CATEGORIES: &str = include_str!("data/categories.json");

// Assembled in this order; keep in sync with categories.json.
const ENDPOINT_SOURCES: &[(&str, &str)] = &[
    ("users.json", include_str!("data/users.json")),
    ("events.json", include_str!("data/events.json")),
    ("calendars.json", include_str!("data/calendars.json")),
    ("groups.json", include_str!("data/groups.json")),
    ("contacts.json", include_str!("data/contacts.json")),
    ("interactions.json", include_str!("data/interactions.json")),
    ("bans.json", include_str!("data/bans.json")),
    ("recurring.json", include_str!("data/recurring.json")),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Date,
    Array,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Date => "date",
            ParamKind::Array => "array",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// POST, PUT and PATCH send the body params; GET and DELETE never do.
    pub fn carries_body(self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Private,
    Public,
    Both,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Private => "private",
            UserType::Public => "public",
            UserType::Both => "both",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EndpointParam {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Placeholder only. Never submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    /// Descriptive only. Never pre-fills a field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub description: String,
    pub method: Method,
    pub path: String,
    pub category: String,
    pub user_type: UserType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_params: Vec<EndpointParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_params: Vec<EndpointParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body_params: Vec<EndpointParam>,
}

impl Endpoint {
    /// Placeholder names in the order they appear in `path`.
    pub fn placeholders(&self) -> Vec<&str> {
        path_placeholders(&self.path)
    }

    pub fn path_param(&self, name: &str) -> Option<&EndpointParam> {
        self.path_params.iter().find(|p| p.name == name)
    }
}

pub fn path_placeholders(path: &str) -> Vec<&str> {
    path.split('/')
        .filter_map(|segment| segment.strip_prefix(':'))
        .filter(|name| !name.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid {file}: {source}")]
    Parse {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate endpoint id {0}")]
    DuplicateEndpoint(String),

    #[error("duplicate category id {0}")]
    DuplicateCategory(String),

    #[error("duplicate test user id {0}")]
    DuplicateUser(u32),

    #[error("endpoint {endpoint}: param {name} declared twice in {list}")]
    DuplicateParam {
        endpoint: String,
        list: &'static str,
        name: String,
    },

    #[error("endpoint {endpoint}: placeholder :{name} has no path param")]
    OrphanPlaceholder { endpoint: String, name: String },

    #[error("endpoint {endpoint}: placeholder :{name} appears more than once")]
    RepeatedPlaceholder { endpoint: String, name: String },

    #[error("endpoint {endpoint}: path param {name} is not used in {path}")]
    UnusedPathParam {
        endpoint: String,
        name: String,
        path: String,
    },

    #[error("endpoint {endpoint}: unknown category {category}")]
    UnknownCategory { endpoint: String, category: String },
}

/// Immutable, validated endpoint catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    categories: Vec<Category>,
    endpoints: Vec<Endpoint>,
}

impl Catalog {
    pub fn from_parts(
        categories: Vec<Category>,
        endpoints: Vec<Endpoint>,
    ) -> Result<Self, CatalogError> {
        let mut category_ids = HashSet::new();
        for category in &categories {
            if !category_ids.insert(category.id.as_str()) {
                return Err(CatalogError::DuplicateCategory(category.id.clone()));
            }
        }

        let mut endpoint_ids = HashSet::new();
        for endpoint in &endpoints {
            if !endpoint_ids.insert(endpoint.id.as_str()) {
                return Err(CatalogError::DuplicateEndpoint(endpoint.id.clone()));
            }
            if !category_ids.contains(endpoint.category.as_str()) {
                return Err(CatalogError::UnknownCategory {
                    endpoint: endpoint.id.clone(),
                    category: endpoint.category.clone(),
                });
            }
            validate_endpoint(endpoint)?;
        }

        Ok(Self {
            categories,
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn find(&self, id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn in_category<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Endpoint> + 'a {
        self.endpoints.iter().filter(move |e| e.category == id)
    }

    pub fn count_in(&self, id: &str) -> usize {
        self.in_category(id).count()
    }
}

fn validate_endpoint(endpoint: &Endpoint) -> Result<(), CatalogError> {
    for (list, params) in [
        ("path_params", &endpoint.path_params),
        ("query_params", &endpoint.query_params),
        ("body_params", &endpoint.body_params),
    ] {
        let mut seen = HashSet::new();
        for param in params {
            if !seen.insert(param.name.as_str()) {
                return Err(CatalogError::DuplicateParam {
                    endpoint: endpoint.id.clone(),
                    list,
                    name: param.name.clone(),
                });
            }
        }
    }

    let placeholders = endpoint.placeholders();
    let mut seen = HashSet::new();
    for name in &placeholders {
        if !seen.insert(*name) {
            return Err(CatalogError::RepeatedPlaceholder {
                endpoint: endpoint.id.clone(),
                name: name.to_string(),
            });
        }
        if endpoint.path_param(name).is_none() {
            return Err(CatalogError::OrphanPlaceholder {
                endpoint: endpoint.id.clone(),
                name: name.to_string(),
            });
        }
    }
    for param in &endpoint.path_params {
        if !seen.contains(param.name.as_str()) {
            return Err(CatalogError::UnusedPathParam {
                endpoint: endpoint.id.clone(),
                name: param.name.clone(),
                path: endpoint.path.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn parse_embedded<T: serde::de::DeserializeOwned>(
    file: &'static str,
    raw: &str,
) -> Result<T, CatalogError> {
    serde_json::from_str(raw).map_err(|source| CatalogError::Parse { file, source })
}

pub fn load_catalog() -> Result<Catalog, CatalogError> {
    let categories: Vec<Category> = parse_embedded("categories.json", CATEGORIES)?;
    let mut endpoints = Vec::new();
    for &(file, raw) in ENDPOINT_SOURCES {
        let mut batch: Vec<Endpoint> = parse_embedded(file, raw)?;
        endpoints.append(&mut batch);
    }
    Catalog::from_parts(categories, endpoints)
}
