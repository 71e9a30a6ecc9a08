//! # API Key Service
//!
//! Issues and verifies API keys. Only an HMAC-SHA256 of the key is stored,
//! so a leaked table does not leak usable keys; the raw key is returned once
//! at creation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sea_orm::DatabaseConnection;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use super::to_utc;
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::secret::{self, SecretProvider, SecretType};
use crate::repositories::secret::{find_published_by_value, touch_last_used};
use crate::repositories::{SecretRepository, now};
use crate::types::{ListResult, Pagination, Status, TenantScope, ids};

type HmacSha256 = Hmac<Sha256>;

pub const PERMISSION_READ: &str = "read";
pub const PERMISSION_WRITE: &str = "write";

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateApiKeyRequest {
    pub name: String,
    /// `private_key` (default) or `publishable_key`
    pub secret_type: Option<SecretType>,
    /// Defaults to `["read", "write"]`
    pub permissions: Option<Vec<String>>,
    #[schema(value_type = Option<String>)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A secret as returned by the API; the stored hash never leaves the
/// service.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SecretView {
    pub id: String,
    pub name: String,
    pub secret_type: SecretType,
    pub provider: SecretProvider,
    pub display_id: String,
    pub permissions: Vec<String>,
    #[schema(value_type = Option<String>)]
    pub expires_at: Option<DateTimeWithTimeZone>,
    #[schema(value_type = Option<String>)]
    pub last_used_at: Option<DateTimeWithTimeZone>,
    #[schema(value_type = String)]
    pub created_at: DateTimeWithTimeZone,
    pub status: Status,
}

impl From<secret::Model> for SecretView {
    fn from(model: secret::Model) -> Self {
        Self {
            permissions: model.permission_list(),
            id: model.id,
            name: model.name,
            secret_type: model.secret_type,
            provider: model.provider,
            display_id: model.display_id,
            expires_at: model.expires_at,
            last_used_at: model.last_used_at,
            created_at: model.created_at,
            status: model.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedApiKey {
    pub secret: SecretView,
    /// The raw key; it cannot be retrieved again
    pub api_key: String,
}

#[derive(Clone)]
pub struct SecretService {
    db: Arc<DatabaseConnection>,
    hash_secret: String,
}

impl SecretService {
    pub fn new(db: Arc<DatabaseConnection>, hash_secret: impl Into<String>) -> Self {
        Self {
            db,
            hash_secret: hash_secret.into(),
        }
    }

    #[instrument(skip_all, fields(tenant_id = %scope.tenant_id))]
    pub async fn create_api_key(
        &self,
        scope: &TenantScope,
        req: CreateApiKeyRequest,
    ) -> RepositoryResult<CreatedApiKey> {
        scope.validate()?;
        if req.name.trim().is_empty() {
            return Err(RepositoryError::validation_error("name is required"));
        }
        let secret_type = req.secret_type.unwrap_or(SecretType::PrivateKey);
        let prefix = match secret_type {
            SecretType::PrivateKey => "sk",
            SecretType::PublishableKey => "pk",
            SecretType::Integration => {
                return Err(RepositoryError::validation_error(
                    "integration secrets cannot be issued as API keys",
                ));
            }
        };
        let permissions = req
            .permissions
            .unwrap_or_else(|| vec![PERMISSION_READ.to_string(), PERMISSION_WRITE.to_string()]);
        if permissions.is_empty()
            || permissions
                .iter()
                .any(|p| p != PERMISSION_READ && p != PERMISSION_WRITE)
        {
            return Err(RepositoryError::validation_error(
                "permissions must be a non-empty subset of [\"read\", \"write\"]",
            ));
        }
        if req.expires_at.is_some_and(|at| at <= Utc::now()) {
            return Err(RepositoryError::validation_error(
                "expires_at must be in the future",
            ));
        }

        let api_key = generate_api_key(prefix);
        let now = now();
        let model = SecretRepository::new(self.db.as_ref(), scope)
            .insert(secret::Model {
                id: ids::generate(ids::SECRET),
                tenant_id: scope.tenant_id.clone(),
                environment_id: scope.environment_id.clone(),
                status: Status::Published,
                created_at: now,
                updated_at: now,
                created_by: scope.actor(),
                updated_by: scope.actor(),
                name: req.name,
                secret_type,
                provider: SecretProvider::Flexprice,
                value: self.hash_api_key(&api_key)?,
                display_id: display_id(&api_key),
                permissions: serde_json::json!(permissions),
                expires_at: req.expires_at.map(Into::into),
                last_used_at: None,
            })
            .await?;

        info!(secret_id = %model.id, display_id = %model.display_id, "Issued API key");
        Ok(CreatedApiKey {
            secret: model.into(),
            api_key,
        })
    }

    /// The published, unexpired secret matching `raw_key`, or `None`.
    pub async fn verify_api_key(&self, raw_key: &str) -> RepositoryResult<Option<secret::Model>> {
        if raw_key.is_empty() {
            return Ok(None);
        }
        let db = self.db.as_ref();
        let Some(secret) = find_published_by_value(db, &self.hash_api_key(raw_key)?).await? else {
            debug!("API key not recognised");
            return Ok(None);
        };
        if secret
            .expires_at
            .is_some_and(|expires_at| to_utc(expires_at) <= Utc::now())
        {
            debug!(secret_id = %secret.id, "API key expired");
            return Ok(None);
        }
        touch_last_used(db, &secret).await?;
        Ok(Some(secret))
    }

    pub async fn list_api_keys(
        &self,
        scope: &TenantScope,
        page: &Pagination,
    ) -> RepositoryResult<ListResult<SecretView>> {
        let secrets = SecretRepository::new(self.db.as_ref(), scope)
            .list(None, page)
            .await?;
        Ok(secrets.map(SecretView::from))
    }

    pub async fn delete_api_key(&self, scope: &TenantScope, id: &str) -> RepositoryResult<()> {
        SecretRepository::new(self.db.as_ref(), scope)
            .delete(id)
            .await?;
        info!(secret_id = %id, "Revoked API key");
        Ok(())
    }

    fn hash_api_key(&self, raw_key: &str) -> RepositoryResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.hash_secret.as_bytes())
            .map_err(|e| RepositoryError::invalid_operation(format!("invalid hash key: {e}")))?;
        mac.update(raw_key.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// `"{prefix}_{32 hex chars}"`.
fn generate_api_key(prefix: &str) -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{prefix}_{}", hex::encode(bytes))
}

/// First five characters, `***`, last two.
fn display_id(api_key: &str) -> String {
    let head: String = api_key.chars().take(5).collect();
    let tail: String = api_key
        .chars()
        .rev()
        .take(2)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{head}***{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_have_prefix_and_hex_body() {
        let key = generate_api_key("sk");
        let body = key.strip_prefix("sk_").unwrap();
        assert_eq!(body.len(), 32);
        assert!(body.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_api_key("sk"));
    }

    #[test]
    fn display_id_masks_the_middle() {
        assert_eq!(display_id("sk_0123456789abcdef"), "sk_01***ef");
    }
}
