//! Caller authorization for privileged operations

use std::fmt;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::config::RoleConfig;
use crate::error::{FarmError, Result};

/// Role an action requires
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Replaces the admin, sets fee receivers, harvest interval and withdraw fee
    Owner,
    /// Pools, weights, emission rates and per-pool switches
    Admin,
}

pub trait Authorizer: Send + Sync + fmt::Debug {
    /// Fail with `Unauthorized` unless `caller` holds `role`
    fn check(&self, caller: &Address, role: Role, action: &str) -> Result<()>;
}

/// Owner plus a single admin. Each role is exclusive: the owner is not
/// implicitly an admin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSet {
    owner: Address,
    admin: Address,
}

impl AdminSet {
    pub fn new(owner: Address, admin: Address) -> Self {
        Self { owner, admin }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn set_admin(&mut self, caller: &Address, admin: Address) -> Result<()> {
        self.check(caller, Role::Owner, "set admin")?;
        self.admin = admin;
        Ok(())
    }
}

impl From<&RoleConfig> for AdminSet {
    fn from(roles: &RoleConfig) -> Self {
        Self::new(roles.owner, roles.admin)
    }
}

impl Authorizer for AdminSet {
    fn check(&self, caller: &Address, role: Role, action: &str) -> Result<()> {
        let holder = match role {
            Role::Owner => self.owner,
            Role::Admin => self.admin,
        };
        if *caller == holder {
            Ok(())
        } else {
            Err(FarmError::Unauthorized {
                caller: *caller,
                action: action.to_string(),
            })
        }
    }
}
