use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::Utc;

use super::item::{self, user_from_item, user_to_item, Item};
use super::{assign_identity, ensure_wipe_allowed, StoreError, UserStore, UserUpdate};
use crate::config::Config;
use crate::keys::{self, AlternateKey};
use crate::types::{NewUser, User};

const CREATE_CONDITION: &str = "attribute_not_exists(#PK)";
const UPDATE_CONDITION: &str = "attribute_exists(#PK) AND attribute_exists(#SK)";
const INDEX_KEY_CONDITION: &str = "#pk = :pk AND begins_with(#sk, :sk_prefix)";
const WIPE_FILTER: &str = "contains(#email, :email_filter)";

/// `UserStore` over one DynamoDB table with `GSI1` (username) and `GSI2` (email).
#[derive(Clone)]
pub struct DynamoDbStore {
    client: DynamoClient,
    config: Arc<Config>,
}

fn dynamo_error(context: &str, err: impl std::error::Error) -> StoreError {
    StoreError::Dynamo(format!("{}: {}", context, DisplayErrorContext(err)))
}

/// A failed conditional write becomes `on_condition`; anything else is a Dynamo error.
fn write_error(
    context: &str,
    condition_failed: bool,
    on_condition: StoreError,
    err: impl std::error::Error,
) -> StoreError {
    if condition_failed {
        on_condition
    } else {
        dynamo_error(context, err)
    }
}

fn primary_key(user_id: &str) -> Item {
    let key = keys::user_key(user_id);
    HashMap::from([
        (keys::PK.to_string(), AttributeValue::S(key.clone())),
        (keys::SK.to_string(), AttributeValue::S(key)),
    ])
}

fn key_names() -> HashMap<String, String> {
    HashMap::from([
        ("#PK".to_string(), keys::PK.to_string()),
        ("#SK".to_string(), keys::SK.to_string()),
    ])
}

/// Query parameters for a `USER#`-scoped lookup on an alternate index.
#[derive(Debug, PartialEq)]
struct IndexQuery {
    index_name: &'static str,
    names: HashMap<String, String>,
    values: Item,
}

fn index_query(key: AlternateKey, value: &str) -> IndexQuery {
    let (pk_attribute, sk_attribute) = key.attributes();
    IndexQuery {
        index_name: key.index_name(),
        names: HashMap::from([
            ("#pk".to_string(), pk_attribute.to_string()),
            ("#sk".to_string(), sk_attribute.to_string()),
        ]),
        values: HashMap::from([
            (":pk".to_string(), AttributeValue::S(key.partition_key(value))),
            (
                ":sk_prefix".to_string(),
                AttributeValue::S(keys::USER_PREFIX.to_string()),
            ),
        ]),
    }
}

/// Start key for the next scan page, or `None` on the last page.
fn next_page(last_evaluated_key: Option<&Item>) -> Option<Item> {
    last_evaluated_key.filter(|key| !key.is_empty()).cloned()
}

fn user_ids(items: &[Item]) -> impl Iterator<Item = String> + '_ {
    items
        .iter()
        .filter_map(|row| row.get(item::USER_ID).and_then(|v| v.as_s().ok()).cloned())
}

impl DynamoDbStore {
    pub fn new(client: DynamoClient, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }
}

#[async_trait]
impl UserStore for DynamoDbStore {
    async fn get_user(&self, user_id: &str) -> Result<User, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(self.table_name())
            .set_key(Some(primary_key(user_id)))
            .send()
            .await
            .map_err(|e| dynamo_error("unable to fetch user", e))?;

        match result.item() {
            Some(item) => user_from_item(item),
            None => Err(StoreError::NotFound),
        }
    }

    async fn get_user_by(&self, key: AlternateKey, value: &str) -> Result<User, StoreError> {
        let query = index_query(key, value);

        let result = self
            .client
            .query()
            .table_name(self.table_name())
            .index_name(query.index_name)
            .key_condition_expression(INDEX_KEY_CONDITION)
            .set_expression_attribute_names(Some(query.names))
            .set_expression_attribute_values(Some(query.values))
            .limit(1)
            .send()
            .await
            .map_err(|e| dynamo_error(&format!("unable to fetch user by {}", key), e))?;

        match result.items().first() {
            Some(item) => user_from_item(item),
            None => Err(StoreError::NoMatch {
                key,
                value: value.to_string(),
            }),
        }
    }

    async fn create_user(&self, user: NewUser) -> Result<String, StoreError> {
        let user = assign_identity(user);

        let result = self
            .client
            .put_item()
            .table_name(self.table_name())
            .set_item(Some(user_to_item(&user)))
            .condition_expression(CREATE_CONDITION)
            .expression_attribute_names("#PK", keys::PK)
            .send()
            .await;

        match result {
            Ok(_) => Ok(user.user_id),
            Err(err) => {
                let collision = err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                Err(write_error(
                    "unable to create user",
                    collision,
                    StoreError::AlreadyExists(user.user_id),
                    err,
                ))
            }
        }
    }

    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<(), StoreError> {
        let expression = update.expression(&Utc::now());

        let result = self
            .client
            .update_item()
            .table_name(self.table_name())
            .set_key(Some(primary_key(user_id)))
            .condition_expression(UPDATE_CONDITION)
            .update_expression(expression.expression)
            .set_expression_attribute_names(Some(
                expression.names.into_iter().chain(key_names()).collect(),
            ))
            .set_expression_attribute_values(Some(expression.values))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                Err(write_error(
                    "unable to update user",
                    missing,
                    StoreError::NotFound,
                    err,
                ))
            }
        }
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(self.table_name())
            .set_key(Some(primary_key(user_id)))
            .send()
            .await
            .map_err(|e| dynamo_error("unable to delete user", e))?;
        Ok(())
    }

    async fn wipe(&self, email_filter: &str) -> Result<usize, StoreError> {
        ensure_wipe_allowed(&self.config, email_filter)?;

        let mut matched = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let page = self
                .client
                .scan()
                .table_name(self.table_name())
                .filter_expression(WIPE_FILTER)
                .expression_attribute_names("#email", item::EMAIL_ADDRESS)
                .expression_attribute_values(
                    ":email_filter",
                    AttributeValue::S(email_filter.to_string()),
                )
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| dynamo_error("unable to scan users", e))?;

            matched.extend(user_ids(page.items()));

            start_key = next_page(page.last_evaluated_key());
            if start_key.is_none() {
                break;
            }
        }

        for user_id in &matched {
            self.delete_user(user_id).await?;
        }
        tracing::info!(count = matched.len(), filter = email_filter, "Wiped users");
        Ok(matched.len())
    }
}
