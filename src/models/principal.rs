//! Identities that permissions are granted to.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// A resolved character identity, keyed by its canonical name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of object a directory entry names. Only characters may hold grants.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Character,
    Account,
    Object,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Character => "character",
            PrincipalKind::Account => "account",
            PrincipalKind::Object => "object",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "character" => Some(PrincipalKind::Character),
            "account" => Some(PrincipalKind::Account),
            "object" => Some(PrincipalKind::Object),
            _ => None,
        }
    }
}

/// A row of the character directory.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct CharacterRecord {
    /// Canonical display name; lookups are case-insensitive.
    pub name: String,

    /// One of `character`, `account`, `object`.
    pub kind: String,

    /// Comma-separated role names (e.g. `Admin,Builder`).
    pub roles: String,
}

impl CharacterRecord {
    pub fn kind(&self) -> Option<PrincipalKind> {
        PrincipalKind::parse(&self.kind)
    }

    pub fn role_list(&self) -> Vec<String> {
        self.roles
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }
}
