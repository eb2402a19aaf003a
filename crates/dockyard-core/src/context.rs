//! Caller context passed to every engine entry point.

use serde::{Deserialize, Serialize};

/// Access level granted to the caller for the organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Full,
    Read,
    None,
}

/// Who is calling, and on behalf of which organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub organization_id: String,
    pub user_id: String,
    pub permission: Permission,
}

impl CallerContext {
    pub fn new(organization_id: &str, user_id: &str, permission: Permission) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            user_id: user_id.to_string(),
            permission,
        }
    }

    pub fn can_write(&self) -> bool {
        self.permission == Permission::Full
    }

    pub fn can_read(&self) -> bool {
        matches!(self.permission, Permission::Full | Permission::Read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_levels() {
        let full = CallerContext::new("org-1", "user-1", Permission::Full);
        assert!(full.can_write() && full.can_read());

        let read = CallerContext::new("org-1", "user-1", Permission::Read);
        assert!(!read.can_write());
        assert!(read.can_read());

        let none = CallerContext::new("org-1", "user-1", Permission::None);
        assert!(!none.can_write() && !none.can_read());
    }

    #[test]
    fn permission_parses_lowercase() {
        let p: Permission = serde_json::from_str(r#""read""#).unwrap();
        assert_eq!(p, Permission::Read);
    }
}
