//! Mapping between `User` and DynamoDB items, plus the whitelisted update fields.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};

use super::StoreError;
use crate::keys::{self, UserKeys};
use crate::types::{AccountType, Address, User};

pub type Item = HashMap<String, AttributeValue>;

pub const USER_ID: &str = "user_id";
pub const USERNAME: &str = "username";
pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const PHONE_NUMBER: &str = "phone_number";
pub const EMAIL_ADDRESS: &str = "email_address";
pub const PRIMARY_ADDRESS: &str = "primary_address";
pub const BILLING_ADDRESS: &str = "billing_address";
pub const PROFILE_IMAGE_ID: &str = "profile_image_id";
pub const BIOGRAPHY: &str = "biography";
pub const ACCOUNT_TYPE: &str = "account_type";
pub const CREATED_DATE: &str = "created_date";
pub const UPDATED_DATE: &str = "updated_date";

const ADDRESS_ONE: &str = "address_one";
const ADDRESS_TWO: &str = "address_two";
const CITY: &str = "city";
const STATE: &str = "state";
const POSTAL_CODE: &str = "postal_code";
const COUNTRY: &str = "country";

fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

fn put_opt(item: &mut Item, name: &str, value: &Option<String>) {
    if let Some(v) = value {
        item.insert(name.to_string(), s(v));
    }
}

fn get_s(item: &Item, name: &str) -> Option<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(|v| v.to_string())
}

fn require_s(item: &Item, name: &str) -> Result<String, StoreError> {
    get_s(item, name).ok_or_else(|| StoreError::Corrupt(format!("missing attribute {}", name)))
}

fn get_date(item: &Item, name: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw = require_s(item, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid {}: {}", name, e)))
}

pub fn timestamp(date: &DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(date.to_rfc3339())
}

pub fn address_value(address: &Address) -> AttributeValue {
    let mut map = Item::new();
    put_opt(&mut map, ADDRESS_ONE, &address.address_one);
    put_opt(&mut map, ADDRESS_TWO, &address.address_two);
    put_opt(&mut map, CITY, &address.city);
    put_opt(&mut map, STATE, &address.state);
    put_opt(&mut map, POSTAL_CODE, &address.postal_code);
    put_opt(&mut map, COUNTRY, &address.country);
    AttributeValue::M(map)
}

fn get_address(item: &Item, name: &str) -> Option<Address> {
    let map = item.get(name).and_then(|v| v.as_m().ok())?;
    Some(Address {
        address_one: get_s(map, ADDRESS_ONE),
        address_two: get_s(map, ADDRESS_TWO),
        city: get_s(map, CITY),
        state: get_s(map, STATE),
        postal_code: get_s(map, POSTAL_CODE),
        country: get_s(map, COUNTRY),
    })
}

/// Full item for a user, key attributes included.
pub fn user_to_item(user: &User) -> Item {
    let keys = UserKeys::derive(&user.user_id, &user.username, &user.email_address);

    let mut item = Item::new();
    item.insert(keys::PK.to_string(), s(&keys.pk));
    item.insert(keys::SK.to_string(), s(&keys.sk));
    item.insert(keys::GSI1_PK.to_string(), s(&keys.gsi1_pk));
    item.insert(keys::GSI1_SK.to_string(), s(&keys.gsi1_sk));
    item.insert(keys::GSI2_PK.to_string(), s(&keys.gsi2_pk));
    item.insert(keys::GSI2_SK.to_string(), s(&keys.gsi2_sk));

    item.insert(USER_ID.to_string(), s(&user.user_id));
    item.insert(USERNAME.to_string(), s(&user.username));
    item.insert(EMAIL_ADDRESS.to_string(), s(&user.email_address));
    put_opt(&mut item, FIRST_NAME, &user.first_name);
    put_opt(&mut item, LAST_NAME, &user.last_name);
    put_opt(&mut item, PHONE_NUMBER, &user.phone_number);
    if let Some(address) = &user.primary_address {
        item.insert(PRIMARY_ADDRESS.to_string(), address_value(address));
    }
    if let Some(address) = &user.billing_address {
        item.insert(BILLING_ADDRESS.to_string(), address_value(address));
    }
    put_opt(&mut item, PROFILE_IMAGE_ID, &user.profile_image_id);
    put_opt(&mut item, BIOGRAPHY, &user.biography);
    item.insert(ACCOUNT_TYPE.to_string(), s(user.account_type.as_str()));
    item.insert(CREATED_DATE.to_string(), timestamp(&user.created_date));
    item.insert(UPDATED_DATE.to_string(), timestamp(&user.updated_date));
    item
}

pub fn user_from_item(item: &Item) -> Result<User, StoreError> {
    let account_type = match get_s(item, ACCOUNT_TYPE) {
        Some(raw) => raw
            .parse::<AccountType>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        None => AccountType::default(),
    };

    Ok(User {
        user_id: require_s(item, USER_ID)?,
        username: require_s(item, USERNAME)?,
        first_name: get_s(item, FIRST_NAME),
        last_name: get_s(item, LAST_NAME),
        phone_number: get_s(item, PHONE_NUMBER),
        email_address: require_s(item, EMAIL_ADDRESS)?,
        primary_address: get_address(item, PRIMARY_ADDRESS),
        billing_address: get_address(item, BILLING_ADDRESS),
        profile_image_id: get_s(item, PROFILE_IMAGE_ID),
        biography: get_s(item, BIOGRAPHY),
        account_type,
        created_date: get_date(item, CREATED_DATE)?,
        updated_date: get_date(item, UPDATED_DATE)?,
    })
}

/// Replacement values for the whole updatable whitelist. A `None` field is removed
/// from the item; `updated_date` is always written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub primary_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub profile_image_id: Option<String>,
    pub biography: Option<String>,
}

/// `SET ... REMOVE ...` expression with its placeholder maps.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl UserUpdate {
    /// Whitelisted attributes paired with their new value, `None` meaning remove.
    pub fn changes(&self) -> [(&'static str, Option<AttributeValue>); 7] {
        let text = |v: &Option<String>| v.as_deref().map(s);
        let address = |v: &Option<Address>| v.as_ref().map(address_value);
        [
            (FIRST_NAME, text(&self.first_name)),
            (LAST_NAME, text(&self.last_name)),
            (PHONE_NUMBER, text(&self.phone_number)),
            (PRIMARY_ADDRESS, address(&self.primary_address)),
            (BILLING_ADDRESS, address(&self.billing_address)),
            (PROFILE_IMAGE_ID, text(&self.profile_image_id)),
            (BIOGRAPHY, text(&self.biography)),
        ]
    }

    pub fn expression(&self, updated_date: &DateTime<Utc>) -> UpdateExpression {
        let mut assignments = Vec::new();
        let mut removals = Vec::new();
        let mut names = HashMap::new();
        let mut values = HashMap::new();

        let changes = self
            .changes()
            .into_iter()
            .chain([(UPDATED_DATE, Some(timestamp(updated_date)))]);

        for (attribute, value) in changes {
            let name = format!("#{}", attribute);
            names.insert(name.clone(), attribute.to_string());
            match value {
                Some(value) => {
                    let placeholder = format!(":{}", attribute);
                    assignments.push(format!("{} = {}", name, placeholder));
                    values.insert(placeholder, value);
                }
                None => removals.push(name),
            }
        }

        let mut expression = format!("SET {}", assignments.join(", "));
        if !removals.is_empty() {
            expression.push_str(&format!(" REMOVE {}", removals.join(", ")));
        }

        UpdateExpression {
            expression,
            names,
            values,
        }
    }

    /// Applies the update to an item in place.
    pub fn apply(&self, item: &mut Item, updated_date: &DateTime<Utc>) {
        for (attribute, value) in self.changes() {
            match value {
                Some(value) => {
                    item.insert(attribute.to_string(), value);
                }
                None => {
                    item.remove(attribute);
                }
            }
        }
        item.insert(UPDATED_DATE.to_string(), timestamp(updated_date));
    }
}
