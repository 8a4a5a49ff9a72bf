use crate::catalog::{parse_embedded, CatalogError, UserType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

const TEST_USERS: &str = include_str!("catalog/data/test_users.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityType {
    Private,
    Public,
}

impl IdentityType {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentityType::Private => "private",
            IdentityType::Public => "public",
        }
    }
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A simulated user. The backend trusts `X-Test-User-Id` to pick it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TestUser {
    pub id: u32,
    pub name: String,
    pub phone: String,
    #[serde(rename = "type")]
    pub kind: IdentityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl UserType {
    pub fn admits(self, identity: IdentityType) -> bool {
        match self {
            UserType::Both => true,
            UserType::Private => identity == IdentityType::Private,
            UserType::Public => identity == IdentityType::Public,
        }
    }
}

pub fn load_test_users() -> Result<Vec<TestUser>, CatalogError> {
    let users: Vec<TestUser> = parse_embedded("test_users.json", TEST_USERS)?;
    let mut seen = HashSet::new();
    for user in &users {
        if !seen.insert(user.id) {
            return Err(CatalogError::DuplicateUser(user.id));
        }
    }
    Ok(users)
}

pub fn find_user(users: &[TestUser], id: u32) -> Option<&TestUser> {
    users.iter().find(|u| u.id == id)
}

pub fn users_of_type(users: &[TestUser], kind: IdentityType) -> impl Iterator<Item = &TestUser> {
    users.iter().filter(move |u| u.kind == kind)
}
