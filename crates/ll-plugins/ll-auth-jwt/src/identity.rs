//! Argon2-backed local identity provider.
//!
//! Accounts are kept in `account_<email>` slots of the same `KvStore` the
//! client store uses. Tokens are issued by a [`JwtIssuer`] whose secret the
//! proxy shares.

use std::sync::{Arc, PoisonError, RwLock};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use ll_core::error::{AppError, Result};
use ll_core::models::Session;
use ll_core::traits::{IdentityProvider, KvStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jwt::JwtIssuer;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    uid: String,
    email: String,
    display_name: Option<String>,
    password_hash: String,
}

impl Account {
    fn session(&self) -> Session {
        Session {
            uid: self.uid.clone(),
            email: Some(self.email.clone()),
            display_name: self.display_name.clone(),
        }
    }
}

fn account_key(email: &str) -> String {
    format!("account_{email}")
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct LocalIdentityProvider {
    kv: Arc<dyn KvStore>,
    issuer: JwtIssuer,
    session: RwLock<Option<Session>>,
}

impl LocalIdentityProvider {
    pub fn new(kv: Arc<dyn KvStore>, issuer: JwtIssuer) -> Self {
        Self {
            kv,
            issuer,
            session: RwLock::new(None),
        }
    }

    async fn load_account(&self, email: &str) -> Result<Option<Account>> {
        let raw = self
            .kv
            .get(&account_key(email))
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|e| AppError::Storage(format!("corrupt account record: {e}")))
        })
        .transpose()
    }

    async fn store_account(&self, account: &Account) -> Result<()> {
        let raw = serde_json::to_string(account).map_err(|e| AppError::Internal(e.to_string()))?;
        self.kv
            .set(&account_key(&account.email), &raw)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }

    fn set_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Verifies if a provided password matches a stored Argon2 hash.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(AppError::Validation("a valid email address is required".to_string()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.load_account(&email).await?.is_some() {
            return Err(AppError::AlreadyExists(format!("account for {email}")));
        }

        let account = Account {
            uid: Uuid::new_v4().to_string(),
            email,
            display_name: None,
            password_hash: hash_password(password)?,
        };
        self.store_account(&account).await?;
        tracing::info!(uid = %account.uid, "account created");

        let session = account.session();
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);
        let account = self
            .load_account(&email)
            .await?
            .filter(|account| verify_password(password, &account.password_hash))
            .ok_or_else(|| AppError::AuthenticationRequired("invalid email or password".to_string()))?;

        let session = account.session();
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.set_session(None);
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn id_token(&self) -> Result<String> {
        let session = self
            .current_session()
            .ok_or_else(|| AppError::login_required("obtain a token"))?;
        self.issuer.issue(&session)
    }

    async fn update_display_name(&self, name: &str) -> Result<()> {
        let session = self
            .current_session()
            .ok_or_else(|| AppError::login_required("update the profile"))?;
        let email = session
            .email
            .as_deref()
            .ok_or_else(|| AppError::Internal("session has no email".to_string()))?;
        let mut account = self
            .load_account(email)
            .await?
            .ok_or_else(|| AppError::NotFound("Account".to_string(), session.uid.clone()))?;

        account.display_name = Some(name.to_string());
        self.store_account(&account).await?;
        self.set_session(Some(account.session()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtVerifier;
    use ll_core::traits::TokenVerifier;
    use ll_kv_local::MemoryKvStore;

    const SECRET: &[u8] = b"local-identity-secret";

    fn provider(kv: Arc<MemoryKvStore>) -> LocalIdentityProvider {
        LocalIdentityProvider::new(kv, JwtIssuer::from_secret(SECRET, 3600))
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let kv = Arc::new(MemoryKvStore::new());
        let idp = provider(kv.clone());

        let created = idp.sign_up("Ada@Example.test ", "hunter22").await.unwrap();
        assert_eq!(created.email.as_deref(), Some("ada@example.test"));
        idp.sign_out().await.unwrap();
        assert!(idp.current_session().is_none());

        // A fresh provider over the same slots sees the account.
        let idp = provider(kv);
        let session = idp.sign_in("ada@example.test", "hunter22").await.unwrap();
        assert_eq!(session.uid, created.uid);
        assert_eq!(idp.current_session(), Some(session));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let idp = provider(Arc::new(MemoryKvStore::new()));
        idp.sign_up("ada@example.test", "hunter22").await.unwrap();
        idp.sign_out().await.unwrap();

        let err = idp.sign_in("ada@example.test", "nope-nope").await.unwrap_err();
        assert!(matches!(err, AppError::AuthenticationRequired(_)));
        assert!(idp.current_session().is_none());
    }

    #[tokio::test]
    async fn duplicate_and_weak_sign_ups_fail() {
        let idp = provider(Arc::new(MemoryKvStore::new()));
        idp.sign_up("ada@example.test", "hunter22").await.unwrap();

        let dup = idp.sign_up("ada@example.test", "hunter22").await.unwrap_err();
        assert!(matches!(dup, AppError::AlreadyExists(_)));

        let weak = idp.sign_up("bob@example.test", "123").await.unwrap_err();
        assert!(matches!(weak, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn issued_token_verifies_and_carries_new_name() {
        let idp = provider(Arc::new(MemoryKvStore::new()));
        let session = idp.sign_up("ada@example.test", "hunter22").await.unwrap();
        idp.update_display_name("Ada Lovelace").await.unwrap();

        let token = idp.id_token().await.unwrap();
        let identity = JwtVerifier::from_secret(SECRET).verify(&token).await.unwrap();
        assert_eq!(identity.uid, session.uid);
        assert_eq!(identity.name.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn token_requires_session() {
        let idp = provider(Arc::new(MemoryKvStore::new()));
        assert!(matches!(
            idp.id_token().await,
            Err(AppError::AuthenticationRequired(_))
        ));
    }
}
