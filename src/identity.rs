//! Who is using the editor. The store trusts whatever identifier this layer
//! hands it.

use crate::error::{StoreError, StoreResult};
use crate::models::User;

pub trait IdentityProvider {
    /// The signed-in user, or `None` when browsing anonymously.
    fn current_user(&self) -> Option<&User>;

    fn current_user_id(&self) -> Option<&str> {
        self.current_user().map(|user| user.id.as_str())
    }

    /// The signed-in user's id, or `Unauthorized` naming what needed it.
    fn require_user_id(&self, action: &str) -> StoreResult<&str> {
        self.current_user_id()
            .ok_or_else(|| StoreError::Unauthorized(action.to_string()))
    }
}

/// Identity taken from the `[user]` table of the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredIdentity {
    user: Option<User>,
}

impl ConfiguredIdentity {
    pub fn new(user: Option<User>) -> Self {
        Self { user }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

impl IdentityProvider for ConfiguredIdentity {
    fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_identity_has_no_user_id() {
        assert_eq!(ConfiguredIdentity::anonymous().current_user_id(), None);
        let identity = ConfiguredIdentity::new(Some(User {
            id: "u1".into(),
            email: "u1@example.com".into(),
            display_name: None,
        }));
        assert_eq!(identity.current_user_id(), Some("u1"));
    }

    #[test]
    fn anonymous_users_are_refused_identity_bound_actions() {
        let err = ConfiguredIdentity::anonymous()
            .require_user_id("create songs")
            .unwrap_err();
        assert_eq!(err.to_string(), "sign-in required to create songs");
    }
}
