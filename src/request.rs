use crate::catalog::{Endpoint, EndpointParam, Method, ParamKind};
use crate::form::{ParamLocation, ParamValue, RequestDraft};
use serde_json::{Map, Value};
use urlencoding::encode;

/// A fully resolved request, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl BuiltRequest {
    /// `path?query`, relative to the backend base URL.
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{}", self.path, query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("missing value for path param {name}")]
    MissingPathParam { name: String },

    #[error("missing required {location} param {name}")]
    MissingRequired {
        location: ParamLocation,
        name: String,
    },

    #[error("{location} param {name} expects {expected}, got {found}")]
    KindMismatch {
        location: ParamLocation,
        name: String,
        expected: ParamKind,
        found: ParamKind,
    },
}

/// Resolves `endpoint` against the values in `draft`. Values for names the
/// endpoint does not declare are ignored.
pub fn build_request(endpoint: &Endpoint, draft: &RequestDraft) -> Result<BuiltRequest, BuildError> {
    let path = substitute_path(endpoint, draft)?;

    let mut query = Vec::new();
    for param in &endpoint.query_params {
        if let Some(value) = checked_value(ParamLocation::Query, param, draft)? {
            for text in value.text_values() {
                query.push((param.name.clone(), text));
            }
        }
    }

    let body = if endpoint.method.carries_body() {
        let mut map = Map::new();
        for param in &endpoint.body_params {
            if let Some(value) = checked_value(ParamLocation::Body, param, draft)? {
                map.insert(param.name.clone(), value.to_json());
            }
        }
        Some(Value::Object(map))
    } else {
        None
    };

    Ok(BuiltRequest {
        method: endpoint.method,
        path,
        query,
        body,
    })
}

fn substitute_path(endpoint: &Endpoint, draft: &RequestDraft) -> Result<String, BuildError> {
    let mut segments = Vec::new();
    for segment in endpoint.path.split('/') {
        let Some(name) = segment.strip_prefix(':').filter(|n| !n.is_empty()) else {
            segments.push(segment.to_string());
            continue;
        };
        let missing = || BuildError::MissingPathParam {
            name: name.to_string(),
        };
        // Catalog validation guarantees the param exists.
        let param = endpoint.path_param(name).ok_or_else(missing)?;
        let value = checked_value(ParamLocation::Path, param, draft)?.ok_or_else(missing)?;
        segments.push(encode(&value.text_values().join(",")).into_owned());
    }
    Ok(segments.join("/"))
}

fn checked_value<'d>(
    location: ParamLocation,
    param: &EndpointParam,
    draft: &'d RequestDraft,
) -> Result<Option<&'d ParamValue>, BuildError> {
    let Some(value) = draft.get(location, &param.name) else {
        if param.required && location != ParamLocation::Path {
            return Err(BuildError::MissingRequired {
                location,
                name: param.name.clone(),
            });
        }
        return Ok(None);
    };
    if value.kind() != param.kind {
        return Err(BuildError::KindMismatch {
            location,
            name: param.name.clone(),
            expected: param.kind,
            found: value.kind(),
        });
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::load_catalog;
    use crate::form::capture;
    use serde_json::json;

    fn fill(endpoint: &Endpoint, values: &[(ParamLocation, &str, &str)]) -> RequestDraft {
        let mut draft = RequestDraft::default();
        for (location, name, raw) in values {
            let param = location
                .params(endpoint)
                .iter()
                .find(|p| p.name == *name)
                .unwrap();
            draft.set(*location, name, capture(param, raw).unwrap());
        }
        draft
    }

    #[test]
    fn substitutes_path_params() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("get-user").unwrap();
        let draft = fill(endpoint, &[(ParamLocation::Path, "user_id", "42")]);
        let request = build_request(endpoint, &draft).unwrap();
        assert_eq!(request.path, "/api/v1/users/42");
        assert_eq!(request.url(), "/api/v1/users/42");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.body, None);
    }

    #[test]
    fn path_values_are_segment_encoded() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("get-calendar-by-share-hash").unwrap();
        let draft = fill(endpoint, &[(ParamLocation::Path, "share_hash", "a b/c")]);
        let request = build_request(endpoint, &draft).unwrap();
        assert_eq!(request.path, "/api/v1/calendars/share/a%20b%2Fc");
    }

    #[test]
    fn empty_query_values_are_omitted() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("get-users").unwrap();
        let draft = fill(
            endpoint,
            &[
                (ParamLocation::Query, "limit", "20"),
                (ParamLocation::Query, "offset", ""),
            ],
        );
        let request = build_request(endpoint, &draft).unwrap();
        assert_eq!(request.url(), "/api/v1/users?limit=20");
    }

    #[test]
    fn query_follows_declared_order_and_encodes() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("get-users").unwrap();
        let draft = fill(
            endpoint,
            &[
                (ParamLocation::Query, "order_dir", "desc"),
                (ParamLocation::Query, "search", "Ada & co"),
                (ParamLocation::Query, "public", "false"),
            ],
        );
        let request = build_request(endpoint, &draft).unwrap();
        assert_eq!(
            request.url(),
            "/api/v1/users?public=false&search=Ada+%26+co&order_dir=desc"
        );
    }

    #[test]
    fn missing_path_param_fails() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("get-user").unwrap();
        let err = build_request(endpoint, &RequestDraft::default()).unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingPathParam {
                name: "user_id".to_string()
            }
        );
    }

    #[test]
    fn missing_required_body_param_fails() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("create-user-block").unwrap();
        let err = build_request(endpoint, &RequestDraft::default()).unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingRequired {
                location: ParamLocation::Body,
                name: "blocked_user_id".to_string()
            }
        );
    }

    #[test]
    fn body_carries_typed_values() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("create-user-block").unwrap();
        let draft = fill(endpoint, &[(ParamLocation::Body, "blocked_user_id", "7")]);
        let request = build_request(endpoint, &draft).unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body, Some(json!({"blocked_user_id": 7})));
    }

    #[test]
    fn unset_boolean_is_not_sent_but_false_is() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("get-current-user").unwrap();

        let unset = fill(endpoint, &[(ParamLocation::Query, "enriched", "")]);
        assert!(build_request(endpoint, &unset).unwrap().query.is_empty());

        let off = fill(endpoint, &[(ParamLocation::Query, "enriched", "false")]);
        assert_eq!(build_request(endpoint, &off).unwrap().url(), "/api/v1/users/me?enriched=false");
    }

    #[test]
    fn arrays_become_json_arrays_in_body() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("sync-contacts").unwrap();
        let draft = fill(
            endpoint,
            &[(ParamLocation::Body, "phone_numbers", r#"["+34600000001","+34600000002"]"#)],
        );
        let request = build_request(endpoint, &draft).unwrap();
        assert_eq!(
            request.body,
            Some(json!({"phone_numbers": ["+34600000001", "+34600000002"]}))
        );
    }

    #[test]
    fn delete_drops_body_params() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("delete-event").unwrap();
        let draft = fill(
            endpoint,
            &[
                (ParamLocation::Path, "event_id", "5"),
                (ParamLocation::Body, "delete_series", "true"),
            ],
        );
        let request = build_request(endpoint, &draft).unwrap();
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.path, "/api/v1/events/5");
        assert_eq!(request.body, None);
    }

    #[test]
    fn numbers_reach_the_url_as_typed() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("get-user").unwrap();
        for (raw, path) in [
            ("99999999999999999999", "/api/v1/users/99999999999999999999"),
            ("1e3", "/api/v1/users/1e3"),
            ("1.10", "/api/v1/users/1.10"),
            ("007", "/api/v1/users/007"),
        ] {
            let draft = fill(endpoint, &[(ParamLocation::Path, "user_id", raw)]);
            assert_eq!(build_request(endpoint, &draft).unwrap().path, path);
        }

        let listing = catalog.find("get-users").unwrap();
        let draft = fill(listing, &[(ParamLocation::Query, "limit", "020")]);
        assert_eq!(build_request(listing, &draft).unwrap().url(), "/api/v1/users?limit=020");

        let block = catalog.find("create-user-block").unwrap();
        let draft = fill(block, &[(ParamLocation::Body, "blocked_user_id", "007")]);
        assert_eq!(
            build_request(block, &draft).unwrap().body,
            Some(json!({"blocked_user_id": 7}))
        );
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("get-user").unwrap();
        let mut draft = RequestDraft::default();
        draft.set(ParamLocation::Path, "user_id", Some(ParamValue::Text("me".into())));
        let err = build_request(endpoint, &draft).unwrap_err();
        assert!(matches!(err, BuildError::KindMismatch { expected: ParamKind::Number, .. }));
    }

    #[test]
    fn building_is_deterministic() {
        let catalog = load_catalog().unwrap();
        let endpoint = catalog.find("update-user").unwrap();
        let draft = fill(
            endpoint,
            &[
                (ParamLocation::Path, "user_id", "1"),
                (ParamLocation::Body, "display_name", "Sonia"),
                (ParamLocation::Body, "auth_provider", "supabase"),
                (ParamLocation::Body, "auth_id", "abc"),
                (ParamLocation::Body, "is_public", "false"),
            ],
        );
        assert_eq!(
            build_request(endpoint, &draft).unwrap(),
            build_request(endpoint, &draft).unwrap()
        );
    }
}
