// Current principal and recipient classification
// Authentication itself lives outside this crate; the store only asks "who is signed in?"

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Role that the backend routes as an end-user recipient
pub const CUSTOMER_ROLE: &str = "ROLE_CUSTOMER";

/// Backend partition of notification targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientType {
    User,
    Employee,
}

impl RecipientType {
    /// Customers are `user`; every other authenticated role is `employee`
    pub fn for_role(role: &str) -> Self {
        if role == CUSTOMER_ROLE {
            RecipientType::User
        } else {
            RecipientType::Employee
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientType::User => "user",
            RecipientType::Employee => "employee",
        }
    }
}

/// The authenticated user on whose behalf notifications are synced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: String,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }

    pub fn recipient_type(&self) -> RecipientType {
        RecipientType::for_role(&self.role)
    }
}

/// Source of the current principal, implemented by the host application's auth layer
pub trait PrincipalProvider: Send + Sync {
    /// `None` when nobody is signed in
    fn current_principal(&self) -> Option<Principal>;
}

/// In-memory principal holder updated on login and logout
#[derive(Debug, Default)]
pub struct SessionPrincipal {
    current: RwLock<Option<Principal>>,
}

impl SessionPrincipal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(principal: Principal) -> Self {
        Self {
            current: RwLock::new(Some(principal)),
        }
    }

    pub fn login(&self, principal: Principal) {
        *self.current.write() = Some(principal);
    }

    pub fn logout(&self) {
        self.current.write().take();
    }
}

impl PrincipalProvider for SessionPrincipal {
    fn current_principal(&self) -> Option<Principal> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_type_follows_role() {
        assert_eq!(Principal::new("1", CUSTOMER_ROLE).recipient_type(), RecipientType::User);
        assert_eq!(Principal::new("2", "ROLE_MECHANIC").recipient_type(), RecipientType::Employee);
        assert_eq!(Principal::new("3", "ROLE_ADMIN").recipient_type(), RecipientType::Employee);
    }

    #[test]
    fn session_principal_login_logout() {
        let session = SessionPrincipal::new();
        assert!(session.current_principal().is_none());

        session.login(Principal::new("42", CUSTOMER_ROLE));
        assert_eq!(session.current_principal().map(|p| p.id), Some("42".to_string()));

        session.logout();
        assert!(session.current_principal().is_none());
    }
}
