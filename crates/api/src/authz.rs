//! API-side authorization guard for commands.
//!
//! This enforces authorization at the command boundary (before the engine
//! runs), while keeping domain crates and infra auth-agnostic.

use duka_auth::{AuthzError, CommandAuthorization, Permission, Principal, Role, authorize};

use crate::context::PrincipalContext;

pub const PRODUCTS_READ: Permission = Permission::from_static("products.read");
pub const PRODUCTS_WRITE: Permission = Permission::from_static("products.write");
pub const CATEGORIES_WRITE: Permission = Permission::from_static("categories.write");
pub const INVENTORY_READ: Permission = Permission::from_static("inventory.read");
pub const INVENTORY_ADJUST: Permission = Permission::from_static("inventory.adjust");
pub const INVENTORY_TRANSFER: Permission = Permission::from_static("inventory.transfer");
pub const REQUESTS_CREATE: Permission = Permission::from_static("requests.create");
pub const REQUESTS_READ: Permission = Permission::from_static("requests.read");
pub const REQUESTS_REJECT: Permission = Permission::from_static("requests.reject");
pub const SALES_CREATE: Permission = Permission::from_static("sales.create");
pub const SALES_READ: Permission = Permission::from_static("sales.read");
pub const SALES_APPROVE: Permission = Permission::from_static("sales.approve");
pub const RETURNS_CREATE: Permission = Permission::from_static("returns.create");
pub const RETURNS_READ: Permission = Permission::from_static("returns.read");

const ACCOUNTANT: &[Permission] = &[
    SALES_READ,
    SALES_APPROVE,
    RETURNS_CREATE,
    RETURNS_READ,
    INVENTORY_READ,
    PRODUCTS_READ,
];

const MANAGER: &[Permission] = &[
    INVENTORY_ADJUST,
    INVENTORY_TRANSFER,
    INVENTORY_READ,
    REQUESTS_READ,
    REQUESTS_REJECT,
    PRODUCTS_WRITE,
    PRODUCTS_READ,
    CATEGORIES_WRITE,
    SALES_READ,
    SALES_CREATE,
    RETURNS_READ,
];

const STAFF: &[Permission] = &[
    SALES_CREATE,
    SALES_READ,
    INVENTORY_READ,
    REQUESTS_CREATE,
    REQUESTS_READ,
    PRODUCTS_READ,
    RETURNS_READ,
];

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** invoking the engine.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = Principal::new(
        principal.user_id(),
        principal.roles().to_vec(),
        permissions_from_roles(principal.roles()),
    );

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Static role→permission policy. Unknown roles grant nothing.
pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.contains(&Role::ADMIN) {
        return vec![Permission::WILDCARD];
    }

    let mut perms: Vec<Permission> = Vec::new();
    for role in roles {
        let granted = match role.as_str() {
            "accountant" => ACCOUNTANT,
            "manager" => MANAGER,
            "staff" => STAFF,
            _ => &[],
        };
        for p in granted {
            if !perms.contains(p) {
                perms.push(p.clone());
            }
        }
    }
    perms
}

#[cfg(test)]
mod tests {
    use super::*;
    use duka_core::UserId;

    use crate::app::routes::common::CmdAuth;

    fn ctx(roles: &[Role]) -> PrincipalContext {
        PrincipalContext::new(UserId::new(), roles.to_vec())
    }

    fn allowed(roles: &[Role], perm: Permission) -> bool {
        let cmd = CmdAuth {
            inner: (),
            required: vec![perm],
        };
        authorize_command(&ctx(roles), &cmd).is_ok()
    }

    #[test]
    fn admin_gets_wildcard() {
        assert_eq!(permissions_from_roles(&[Role::ADMIN]), vec![Permission::WILDCARD]);
        assert!(allowed(&[Role::ADMIN], REQUESTS_REJECT));
    }

    #[test]
    fn only_accountants_approve_and_return() {
        assert!(allowed(&[Role::ACCOUNTANT], SALES_APPROVE));
        assert!(allowed(&[Role::ACCOUNTANT], RETURNS_CREATE));
        assert!(!allowed(&[Role::MANAGER], SALES_APPROVE));
        assert!(!allowed(&[Role::STAFF], RETURNS_CREATE));
    }

    #[test]
    fn staff_sells_but_cannot_move_stock() {
        assert!(allowed(&[Role::STAFF], SALES_CREATE));
        assert!(allowed(&[Role::STAFF], REQUESTS_CREATE));
        assert!(!allowed(&[Role::STAFF], INVENTORY_ADJUST));
        assert!(!allowed(&[Role::STAFF], REQUESTS_REJECT));
    }

    #[test]
    fn roles_combine_without_duplicates() {
        let perms = permissions_from_roles(&[Role::STAFF, Role::MANAGER]);
        assert!(perms.contains(&REQUESTS_CREATE));
        assert!(perms.contains(&REQUESTS_REJECT));
        let reads = perms.iter().filter(|p| **p == SALES_READ).count();
        assert_eq!(reads, 1);
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        assert!(permissions_from_roles(&[Role::new("viewer")]).is_empty());
        assert!(!allowed(&[], PRODUCTS_READ));
    }
}
