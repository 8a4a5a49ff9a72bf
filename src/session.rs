use crate::catalog::{Catalog, Endpoint};
use crate::filter::{CategoryFilter, EndpointFilter};
use crate::form::{capture, FieldError, ParamLocation, RequestDraft};
use crate::http::{HttpClient, ResponseRecord};
use crate::identity::TestUser;
use crate::request::{build_request, BuildError, BuiltRequest};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no endpoint selected")]
    NoEndpoint,

    #[error("unknown endpoint {0}")]
    UnknownEndpoint(String),

    #[error("{endpoint} has no {location} param {name}")]
    UnknownParam {
        endpoint: String,
        location: ParamLocation,
        name: String,
    },

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// State of one tester session: who, which endpoint, what was entered, and
/// the last response.
pub struct Session<'c> {
    catalog: &'c Catalog,
    identity: Option<&'c TestUser>,
    endpoint: Option<&'c Endpoint>,
    draft: RequestDraft,
    response: Option<ResponseRecord>,
}

impl<'c> Session<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            identity: None,
            endpoint: None,
            draft: RequestDraft::default(),
            response: None,
        }
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    pub fn set_identity(&mut self, identity: Option<&'c TestUser>) {
        self.identity = identity;
    }

    pub fn identity(&self) -> Option<&'c TestUser> {
        self.identity
    }

    pub fn endpoint(&self) -> Option<&'c Endpoint> {
        self.endpoint
    }

    pub fn draft(&self) -> &RequestDraft {
        &self.draft
    }

    pub fn response(&self) -> Option<&ResponseRecord> {
        self.response.as_ref()
    }

    /// Switching to a different endpoint discards the draft and response.
    pub fn select_endpoint(&mut self, id: &str) -> Result<&'c Endpoint, SessionError> {
        let endpoint = self
            .catalog
            .find(id)
            .ok_or_else(|| SessionError::UnknownEndpoint(id.to_string()))?;
        if self.endpoint.map(|e| e.id.as_str()) != Some(id) {
            self.draft.clear();
            self.response = None;
        }
        self.endpoint = Some(endpoint);
        Ok(endpoint)
    }

    pub fn visible_endpoints(&self, category: CategoryFilter, search: &str) -> Vec<&'c Endpoint> {
        let filter = EndpointFilter {
            identity: self.identity,
            category,
            search: search.to_string(),
        };
        filter.apply(self.catalog.endpoints())
    }

    /// Captures `raw` for the named param. Empty input clears it.
    pub fn fill(&mut self, location: ParamLocation, name: &str, raw: &str) -> Result<(), SessionError> {
        let endpoint = self.endpoint.ok_or(SessionError::NoEndpoint)?;
        let param = location
            .params(endpoint)
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| SessionError::UnknownParam {
                endpoint: endpoint.id.clone(),
                location,
                name: name.to_string(),
            })?;
        let value = capture(param, raw)?;
        self.draft.set(location, name, value);
        Ok(())
    }

    pub fn preview(&self) -> Result<BuiltRequest, SessionError> {
        let endpoint = self.endpoint.ok_or(SessionError::NoEndpoint)?;
        Ok(build_request(endpoint, &self.draft)?)
    }

    /// Builds and dispatches. Nothing is sent when the build fails.
    pub fn send(&mut self, client: &HttpClient) -> Result<&ResponseRecord, SessionError> {
        let request = self.preview()?;
        let record = ResponseRecord::from(client.send(self.identity, &request));
        let record = self.response.insert(record);
        Ok(&*record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::load_catalog;
    use crate::identity::{find_user, load_test_users};
    use std::time::Duration;

    fn unreachable_client() -> HttpClient {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        HttpClient::new(format!("http://{addr}"), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn changing_endpoint_resets_draft_and_response() {
        let catalog = load_catalog().unwrap();
        let client = unreachable_client();
        let mut session = Session::new(&catalog);
        session.select_endpoint("get-user").unwrap();
        session.fill(ParamLocation::Path, "user_id", "1").unwrap();
        session.send(&client).unwrap();
        assert!(session.response().is_some());

        session.select_endpoint("get-user").unwrap();
        assert!(!session.draft().is_empty());
        assert!(session.response().is_some());

        session.select_endpoint("get-users").unwrap();
        assert!(session.draft().is_empty());
        assert!(session.response().is_none());
    }

    #[test]
    fn validation_failure_never_sends() {
        let catalog = load_catalog().unwrap();
        let client = unreachable_client();
        let mut session = Session::new(&catalog);
        session.select_endpoint("get-user").unwrap();
        let err = session.send(&client).unwrap_err();
        assert!(matches!(err, SessionError::Build(BuildError::MissingPathParam { .. })));
        assert!(session.response().is_none());
    }

    #[test]
    fn transport_failure_is_recorded_not_raised() {
        let catalog = load_catalog().unwrap();
        let client = unreachable_client();
        let mut session = Session::new(&catalog);
        session.select_endpoint("get-users").unwrap();
        let record = session.send(&client).unwrap();
        assert_eq!(record.status, None);
        assert!(record.error.is_some());
    }

    #[test]
    fn fill_checks_declared_params() {
        let catalog = load_catalog().unwrap();
        let mut session = Session::new(&catalog);
        assert!(matches!(
            session.fill(ParamLocation::Query, "limit", "1"),
            Err(SessionError::NoEndpoint)
        ));
        session.select_endpoint("get-users").unwrap();
        assert!(matches!(
            session.fill(ParamLocation::Body, "limit", "1"),
            Err(SessionError::UnknownParam { .. })
        ));
        assert!(matches!(
            session.fill(ParamLocation::Query, "limit", "many"),
            Err(SessionError::Field(_))
        ));
        session.fill(ParamLocation::Query, "limit", "5").unwrap();
        assert_eq!(session.preview().unwrap().url(), "/api/v1/users?limit=5");
        session.fill(ParamLocation::Query, "limit", "").unwrap();
        assert_eq!(session.preview().unwrap().url(), "/api/v1/users");
    }

    #[test]
    fn identity_gates_visible_endpoints() {
        let catalog = load_catalog().unwrap();
        let users = load_test_users().unwrap();
        let mut session = Session::new(&catalog);
        let all = session.visible_endpoints(CategoryFilter::All, "").len();
        session.set_identity(find_user(&users, 90));
        let public = session.visible_endpoints(CategoryFilter::All, "");
        assert!(public.len() < all);
        assert!(public.iter().all(|e| e.id != "get-my-contacts"));
        assert!(session.select_endpoint("nope").is_err());
    }
}
