use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Roles are opaque strings as issued by the identity provider; mapping roles to
/// permissions is done by the policy layer (see the API's authz guard).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Full access, including status transitions and returns.
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    /// Approves sales and processes returns.
    pub const ACCOUNTANT: Role = Role(Cow::Borrowed("accountant"));
    /// Runs stock: adjustments, transfers, catalogue upkeep.
    pub const MANAGER: Role = Role(Cow::Borrowed("manager"));
    /// Front-of-house: records sales and inventory requests.
    pub const STAFF: Role = Role(Cow::Borrowed("staff"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
