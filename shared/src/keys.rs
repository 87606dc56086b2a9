//! Physical key layout for the single user table.
//!
//! One item per user. The primary pair addresses the user directly; `GSI1` and `GSI2`
//! hold the username and email lookups. Every sort key is `USER#<id>`, so alternate
//! partitions can be queried with a `begins_with` on the entity prefix.

pub const USER_PREFIX: &str = "USER#";
pub const USERNAME_PREFIX: &str = "USERNAME#";
pub const EMAIL_ADDRESS_PREFIX: &str = "EMAIL_ADDRESS#";

pub const PK: &str = "PK";
pub const SK: &str = "SK";
pub const GSI1_PK: &str = "GSI1PK";
pub const GSI1_SK: &str = "GSI1SK";
pub const GSI2_PK: &str = "GSI2PK";
pub const GSI2_SK: &str = "GSI2SK";

pub const GSI1_INDEX: &str = "GSI1";
pub const GSI2_INDEX: &str = "GSI2";

/// Secondary access path for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlternateKey {
    Username,
    EmailAddress,
}

impl AlternateKey {
    pub fn index_name(self) -> &'static str {
        match self {
            AlternateKey::Username => GSI1_INDEX,
            AlternateKey::EmailAddress => GSI2_INDEX,
        }
    }

    /// (partition attribute, sort attribute) on the index.
    pub fn attributes(self) -> (&'static str, &'static str) {
        match self {
            AlternateKey::Username => (GSI1_PK, GSI1_SK),
            AlternateKey::EmailAddress => (GSI2_PK, GSI2_SK),
        }
    }

    pub fn partition_key(self, value: &str) -> String {
        match self {
            AlternateKey::Username => username_key(value),
            AlternateKey::EmailAddress => email_address_key(value),
        }
    }
}

impl std::fmt::Display for AlternateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlternateKey::Username => f.write_str("username"),
            AlternateKey::EmailAddress => f.write_str("email address"),
        }
    }
}

pub fn user_key(user_id: &str) -> String {
    format!("{}{}", USER_PREFIX, user_id)
}

pub fn username_key(username: &str) -> String {
    format!("{}{}", USERNAME_PREFIX, username)
}

pub fn email_address_key(email_address: &str) -> String {
    format!("{}{}", EMAIL_ADDRESS_PREFIX, email_address)
}

/// Every key attribute of a user item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserKeys {
    pub pk: String,
    pub sk: String,
    pub gsi1_pk: String,
    pub gsi1_sk: String,
    pub gsi2_pk: String,
    pub gsi2_sk: String,
}

impl UserKeys {
    pub fn derive(user_id: &str, username: &str, email_address: &str) -> Self {
        let user = user_key(user_id);
        Self {
            pk: user.clone(),
            sk: user.clone(),
            gsi1_pk: username_key(username),
            gsi1_sk: user.clone(),
            gsi2_pk: email_address_key(email_address),
            gsi2_sk: user,
        }
    }
}
