//! In-process `UserStore` with the same item layout and key semantics as the
//! DynamoDB table. Used by tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::Utc;

use super::item::{self, user_from_item, user_to_item, Item};
use super::{assign_identity, ensure_wipe_allowed, StoreError, UserStore, UserUpdate};
use crate::config::Config;
use crate::keys::{self, AlternateKey};
use crate::types::{NewUser, User};

type Table = BTreeMap<(String, String), Item>;

#[derive(Default)]
pub struct MemoryStore {
    config: Config,
    items: Mutex<Table>,
}

fn attribute<'a>(item: &'a Item, name: &str) -> Option<&'a str> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(|v| v.as_str())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            items: Mutex::new(Table::new()),
        }
    }

    /// Writes a raw item unconditionally, bypassing every store check.
    pub fn put_raw(&self, item: Item) {
        let key = (
            attribute(&item, keys::PK).unwrap_or_default().to_string(),
            attribute(&item, keys::SK).unwrap_or_default().to_string(),
        );
        self.table().insert(key, item);
    }

    /// Inserts a fully formed user, bypassing the uniqueness pre-checks.
    pub fn put_user(&self, user: &User) {
        self.put_raw(user_to_item(user));
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn primary_key(user_id: &str) -> (String, String) {
    let key = keys::user_key(user_id);
    (key.clone(), key)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<User, StoreError> {
        match self.table().get(&primary_key(user_id)) {
            Some(item) => user_from_item(item),
            None => Err(StoreError::NotFound),
        }
    }

    async fn get_user_by(&self, key: AlternateKey, value: &str) -> Result<User, StoreError> {
        let (pk_attribute, sk_attribute) = key.attributes();
        let partition = key.partition_key(value);

        let table = self.table();
        let first = table
            .values()
            .filter(|item| attribute(item, pk_attribute) == Some(partition.as_str()))
            .filter_map(|item| {
                attribute(item, sk_attribute)
                    .filter(|sk| sk.starts_with(keys::USER_PREFIX))
                    .map(|sk| (sk, item))
            })
            .min_by(|a, b| a.0.cmp(b.0));

        match first {
            Some((_, item)) => user_from_item(item),
            None => Err(StoreError::NoMatch {
                key,
                value: value.to_string(),
            }),
        }
    }

    async fn create_user(&self, user: NewUser) -> Result<String, StoreError> {
        let user = assign_identity(user);
        let key = primary_key(&user.user_id);

        let mut table = self.table();
        if table.contains_key(&key) {
            return Err(StoreError::AlreadyExists(user.user_id));
        }
        table.insert(key, user_to_item(&user));
        Ok(user.user_id)
    }

    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<(), StoreError> {
        let mut table = self.table();
        let item = table
            .get_mut(&primary_key(user_id))
            .ok_or(StoreError::NotFound)?;

        update.apply(item, &Utc::now());
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), StoreError> {
        self.table().remove(&primary_key(user_id));
        Ok(())
    }

    async fn wipe(&self, email_filter: &str) -> Result<usize, StoreError> {
        ensure_wipe_allowed(&self.config, email_filter)?;

        let mut table = self.table();
        let before = table.len();
        table.retain(|_, item| {
            !matches!(
                item.get(item::EMAIL_ADDRESS),
                Some(AttributeValue::S(email)) if email.contains(email_filter)
            )
        });
        Ok(before - table.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountType, Address};
    use std::time::Duration;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email_address: email.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let store = MemoryStore::new();
        let before = Utc::now();

        let request = NewUser {
            username: "jdoe".to_string(),
            first_name: Some("John".to_string()),
            last_name: Some("Doe".to_string()),
            phone_number: Some("8011239088".to_string()),
            email_address: "jdoe@example.com".to_string(),
            primary_address: Some(Address {
                address_one: Some("123 Sunshine Street".to_string()),
                state: Some("UT".to_string()),
                ..Default::default()
            }),
            billing_address: None,
            profile_image_id: Some("01HZY3K8X9J2N4P6Q8R0S2T4V6".to_string()),
            biography: Some("bio".to_string()),
            account_type: AccountType::Business,
        };

        let user_id = store.create_user(request.clone()).await.unwrap();
        let after = Utc::now();
        let user = store.get_user(&user_id).await.unwrap();

        assert_eq!(user.user_id, user_id);
        assert_eq!(user_id.len(), 26);
        assert_eq!(user.username, request.username);
        assert_eq!(user.first_name, request.first_name);
        assert_eq!(user.last_name, request.last_name);
        assert_eq!(user.phone_number, request.phone_number);
        assert_eq!(user.email_address, request.email_address);
        assert_eq!(user.primary_address, request.primary_address);
        assert_eq!(user.billing_address, None);
        assert_eq!(user.profile_image_id, request.profile_image_id);
        assert_eq!(user.biography, request.biography);
        assert_eq!(user.account_type, AccountType::Business);
        assert_eq!(user.created_date, user.updated_date);
        assert!(user.created_date >= before && user.created_date <= after);
    }

    #[tokio::test]
    async fn test_lookups_agree() {
        let store = MemoryStore::new();
        let user_id = store
            .create_user(new_user("jdoe", "jdoe@example.com"))
            .await
            .unwrap();

        let by_id = store.get_user(&user_id).await.unwrap();
        let by_email = store
            .get_user_by(AlternateKey::EmailAddress, "jdoe@example.com")
            .await
            .unwrap();
        let by_username = store
            .get_user_by(AlternateKey::Username, "jdoe")
            .await
            .unwrap();

        assert_eq!(by_id.user_id, user_id);
        assert_eq!(by_email.user_id, user_id);
        assert_eq!(by_username.user_id, user_id);
    }

    #[tokio::test]
    async fn test_missing_lookups() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_user("01HZY3K8X9J2N4P6Q8R0S2T4V6").await,
            Err(StoreError::NotFound)
        ));
        let err = store
            .get_user_by(AlternateKey::Username, "ghost")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "no user found with given username: ghost");
    }

    #[tokio::test]
    async fn test_alternate_lookup_returns_lowest_id() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let older = new_user("twin", "a@example.com").into_user("01AAAAAAAAAAAAAAAAAAAAAAAA".into(), now);
        let newer = new_user("twin", "b@example.com").into_user("01BBBBBBBBBBBBBBBBBBBBBBBB".into(), now);
        store.put_user(&newer);
        store.put_user(&older);

        let found = store.get_user_by(AlternateKey::Username, "twin").await.unwrap();
        assert_eq!(found.user_id, older.user_id);
    }

    #[tokio::test]
    async fn test_alternate_lookup_ignores_other_entity_prefixes() {
        let store = MemoryStore::new();
        let mut foreign = Item::new();
        foreign.insert(keys::PK.into(), AttributeValue::S("ORG#1".into()));
        foreign.insert(keys::SK.into(), AttributeValue::S("ORG#1".into()));
        foreign.insert(keys::GSI1_PK.into(), AttributeValue::S("USERNAME#jdoe".into()));
        foreign.insert(keys::GSI1_SK.into(), AttributeValue::S("ORG#1".into()));
        store.put_raw(foreign);

        assert!(store
            .get_user_by(AlternateKey::Username, "jdoe")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_update_replaces_whitelisted_fields() {
        let store = MemoryStore::new();
        let user_id = store
            .create_user(NewUser {
                last_name: Some("Doe".to_string()),
                biography: Some("bio".to_string()),
                account_type: AccountType::Business,
                ..new_user("jdoe", "jdoe@example.com")
            })
            .await
            .unwrap();
        let original = store.get_user(&user_id).await.unwrap();

        std::thread::sleep(Duration::from_millis(2));
        let update = UserUpdate {
            first_name: Some("Jane".to_string()),
            ..Default::default()
        };
        store.update_user(&user_id, &update).await.unwrap();

        let updated = store.get_user(&user_id).await.unwrap();
        assert_eq!(updated.first_name.as_deref(), Some("Jane"));
        // fields left out of the update are cleared
        assert_eq!(updated.last_name, None);
        assert_eq!(updated.biography, None);
        assert_eq!(updated.email_address, original.email_address);
        assert_eq!(updated.username, original.username);
        assert_eq!(updated.account_type, AccountType::Business);
        assert_eq!(updated.created_date, original.created_date);
        assert!(updated.updated_date > original.updated_date);

        // alternate keys still resolve to the same user
        let by_username = store.get_user_by(AlternateKey::Username, "jdoe").await.unwrap();
        assert_eq!(by_username.user_id, user_id);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let store = MemoryStore::new();
        let err = store
            .update_user("01HZY3K8X9J2N4P6Q8R0S2T4V6", &UserUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        let user_id = store
            .create_user(new_user("jdoe", "jdoe@example.com"))
            .await
            .unwrap();

        store.delete_user(&user_id).await.unwrap();
        store.delete_user(&user_id).await.unwrap();
        store.delete_user("01HZY3K8X9J2N4P6Q8R0S2T4V6").await.unwrap();

        assert!(store.get_user(&user_id).await.is_err());
        assert!(store
            .get_user_by(AlternateKey::EmailAddress, "jdoe@example.com")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_wipe_removes_matching_users_only() {
        let store = MemoryStore::new();
        store.create_user(new_user("a", "a@canary.test")).await.unwrap();
        store.create_user(new_user("b", "b@canary.test")).await.unwrap();
        let kept = store.create_user(new_user("c", "c@example.com")).await.unwrap();

        assert_eq!(store.wipe("@canary.test").await.unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.get_user(&kept).await.is_ok());
    }

    #[tokio::test]
    async fn test_wipe_refuses_blank_filter() {
        let store = MemoryStore::new();
        store
            .create_user(new_user("real", "real@customer.com"))
            .await
            .unwrap();

        for filter in ["", "   "] {
            let err = store.wipe(filter).await.unwrap_err();
            assert!(matches!(err, StoreError::EmptyWipeFilter));
        }
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_wipe_refused_on_protected_stage() {
        for stage in ["prod", "Prod", "STAGING"] {
            let store = MemoryStore::with_config(Config {
                stage: stage.to_string(),
                ..Config::default()
            });
            store.create_user(new_user("a", "a@canary.test")).await.unwrap();

            let err = store.wipe("@canary.test").await.unwrap_err();
            assert!(matches!(err, StoreError::ProtectedStage(_)));
            assert_eq!(store.len(), 1);
        }
    }
}
