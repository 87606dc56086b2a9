use crate::errors::ApiError;

/// Name of the authorizer claim holding the caller's comma-separated grants.
pub const PERMISSIONS_CLAIM: &str = "permissions";

pub const ACCESS_DENIED_MESSAGE: &str = "You do not have the appropriate permissions to perform this action. Please check the appropriate documentation to ensure you have the correct permissions.";

/// Permission an operation requires from its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    CreateUser,
    ReadUser,
    UpdateUser,
    DeleteUser,
}

impl Permission {
    pub fn token(&self) -> &'static str {
        match self {
            Permission::CreateUser => "create:user",
            Permission::ReadUser => "read:user",
            Permission::UpdateUser => "update:user",
            Permission::DeleteUser => "delete:user",
        }
    }

    /// Exact membership of this token in the claim. No wildcards, no hierarchy.
    pub fn is_granted(&self, claim: Option<&str>) -> bool {
        claim
            .map(|granted| granted.split(',').any(|p| p == self.token()))
            .unwrap_or(false)
    }

    pub fn authorize(&self, claim: Option<&str>) -> Result<(), ApiError> {
        if self.is_granted(claim) {
            Ok(())
        } else {
            Err(ApiError::access_denied(ACCESS_DENIED_MESSAGE))
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}
