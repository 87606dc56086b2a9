use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::validate_account_type;

// ========== ACCOUNT TYPE ==========
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    #[default]
    Personal,
    Business,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Personal => "Personal",
            AccountType::Business => "Business",
        }
    }

    /// Resolves the account type sent on a create request. Absent or empty means
    /// Personal; anything unrecognized has already been rejected by validation.
    pub fn from_request(value: Option<&str>) -> Self {
        value
            .filter(|v| !v.is_empty())
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("no matching account type found for: {0}")]
pub struct UnknownAccountType(pub String);

impl std::str::FromStr for AccountType {
    type Err = UnknownAccountType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Personal" => Ok(AccountType::Personal),
            "Business" => Ok(AccountType::Business),
            other => Err(UnknownAccountType(other.to_string())),
        }
    }
}

// ========== ADDRESS ==========
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 300))]
    pub address_one: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 300))]
    pub address_two: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200))]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2, max = 2))]
    pub state: Option<String>, // state code, e.g. UT
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 5, max = 9))]
    pub postal_code: Option<String>, // zip or zip+4
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 3, max = 3))]
    pub country: Option<String>, // country code, e.g. USA
}

// ========== USER ==========
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub email_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    pub account_type: AccountType,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

/// A user before the store has assigned its id and timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub email_address: String,
    pub primary_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub profile_image_id: Option<String>,
    pub biography: Option<String>,
    pub account_type: AccountType,
}

impl NewUser {
    pub fn into_user(self, user_id: String, now: DateTime<Utc>) -> User {
        User {
            user_id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number: self.phone_number,
            email_address: self.email_address,
            primary_address: self.primary_address,
            billing_address: self.billing_address,
            profile_image_id: self.profile_image_id,
            biography: self.biography,
            account_type: self.account_type,
            created_date: now,
            updated_date: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 300))]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 300))]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 300))]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 11))]
    pub phone_number: Option<String>, // 10 digits, or 11 with country code
    #[validate(required, email)]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub primary_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub billing_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 26))]
    pub profile_image_id: Option<String>, // ULID
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 4000))]
    pub biography: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_account_type"))]
    pub account_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResponse {
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 300))]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 300))]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 11))]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub primary_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub billing_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 26))]
    pub profile_image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 4000))]
    pub biography: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_wire_form() {
        assert_eq!(
            serde_json::to_string(&AccountType::Business).unwrap(),
            "\"Business\""
        );
        let parsed: AccountType = serde_json::from_str("\"Personal\"").unwrap();
        assert_eq!(parsed, AccountType::Personal);
        assert!(serde_json::from_str::<AccountType>("\"Enterprise\"").is_err());
    }

    #[test]
    fn test_account_type_from_request_defaults() {
        assert_eq!(AccountType::from_request(None), AccountType::Personal);
        assert_eq!(AccountType::from_request(Some("")), AccountType::Personal);
        assert_eq!(AccountType::from_request(Some("Business")), AccountType::Business);
        assert_eq!(AccountType::from_request(Some("Fake")), AccountType::Personal);
    }

    #[test]
    fn test_user_omits_absent_optionals() {
        let now = Utc::now();
        let user = NewUser {
            username: "a".to_string(),
            email_address: "a@b.com".to_string(),
            ..Default::default()
        }
        .into_user("01HZY3K8X9J2N4P6Q8R0S2T4V6".to_string(), now);

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["userId"], "01HZY3K8X9J2N4P6Q8R0S2T4V6");
        assert_eq!(json["accountType"], "Personal");
        assert!(json.get("firstName").is_none());
        assert!(json.get("primaryAddress").is_none());
        assert_eq!(user.created_date, user.updated_date);
    }
}
