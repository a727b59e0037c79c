use duka_auth::{CommandAuthorization, Permission};

use crate::app::errors;
use crate::authz;
use crate::context::PrincipalContext;

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

impl<C> CmdAuth<C> {
    pub fn new(inner: C, required: Permission) -> Self {
        Self {
            inner,
            required: vec![required],
        }
    }

    /// Check the principal and hand back the command, or a 403 response.
    pub fn authorize(self, principal: &PrincipalContext) -> Result<C, axum::response::Response> {
        authz::authorize_command(principal, &self).map_err(errors::forbidden)?;
        Ok(self.inner)
    }
}

/// Permission check for queries, which carry no command.
pub fn require(principal: &PrincipalContext, permission: Permission) -> Result<(), axum::response::Response> {
    CmdAuth::new((), permission).authorize(principal)
}
