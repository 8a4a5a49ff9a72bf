use crate::catalog::Endpoint;
use crate::identity::TestUser;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn parse(raw: &str) -> Self {
        if raw == "all" {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(raw.to_string())
        }
    }
}

/// Endpoint list predicate: identity gating, category and name search.
#[derive(Debug, Clone, Default)]
pub struct EndpointFilter<'a> {
    pub identity: Option<&'a TestUser>,
    pub category: CategoryFilter,
    pub search: String,
}

impl<'a> EndpointFilter<'a> {
    pub fn matches(&self, endpoint: &Endpoint) -> bool {
        if let Some(user) = self.identity {
            if !endpoint.user_type.admits(user.kind) {
                return false;
            }
        }
        if let CategoryFilter::Only(category) = &self.category {
            if &endpoint.category != category {
                return false;
            }
        }
        if !self.search.is_empty()
            && !endpoint
                .name
                .to_lowercase()
                .contains(&self.search.to_lowercase())
        {
            return false;
        }
        true
    }

    /// Keeps declaration order.
    pub fn apply<'c, I>(&self, endpoints: I) -> Vec<&'c Endpoint>
    where
        I: IntoIterator<Item = &'c Endpoint>,
    {
        endpoints.into_iter().filter(|e| self.matches(e)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::load_catalog;
    use crate::identity::{find_user, load_test_users};

    #[test]
    fn no_identity_shows_everything() {
        let catalog = load_catalog().unwrap();
        let filter = EndpointFilter::default();
        assert_eq!(filter.apply(catalog.endpoints()).len(), catalog.endpoints().len());
    }

    #[test]
    fn public_identity_hides_private_only_endpoints() {
        let catalog = load_catalog().unwrap();
        let users = load_test_users().unwrap();
        let filter = EndpointFilter {
            identity: find_user(&users, 86),
            ..Default::default()
        };
        let visible = filter.apply(catalog.endpoints());
        assert!(visible.iter().all(|e| e.id != "subscribe-to-user"));
        assert!(visible.iter().any(|e| e.id == "get-users"));
    }

    #[test]
    fn private_identity_excludes_public_endpoints_but_keeps_both() {
        let users = load_test_users().unwrap();
        let mut public_only = load_catalog().unwrap().find("get-users").unwrap().clone();
        public_only.id = "public-only".to_string();
        public_only.user_type = crate::catalog::UserType::Public;
        let mut both = public_only.clone();
        both.id = "both".to_string();
        both.user_type = crate::catalog::UserType::Both;

        let filter = EndpointFilter {
            identity: find_user(&users, 1),
            ..Default::default()
        };
        let endpoints = [public_only, both];
        let visible: Vec<&str> = filter.apply(&endpoints).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(visible, vec!["both"]);
    }

    #[test]
    fn category_and_search_combine() {
        let catalog = load_catalog().unwrap();
        let filter = EndpointFilter {
            identity: None,
            category: CategoryFilter::parse("users"),
            search: "BLOCK".to_string(),
        };
        let ids: Vec<&str> = filter.apply(catalog.endpoints()).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["get-user-blocks", "get-user-block", "create-user-block", "delete-user-block"]
        );
    }

    #[test]
    fn filtering_is_idempotent_and_order_preserving() {
        let catalog = load_catalog().unwrap();
        let users = load_test_users().unwrap();
        let filter = EndpointFilter {
            identity: find_user(&users, 3),
            category: CategoryFilter::All,
            search: "user".to_string(),
        };
        let once = filter.apply(catalog.endpoints());
        let twice = filter.apply(once.iter().copied());
        assert_eq!(once, twice);

        let positions: Vec<usize> = once
            .iter()
            .map(|e| catalog.endpoints().iter().position(|c| c.id == e.id).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
