use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::{Role, UserAccount};
use crate::storage;

/// bcrypt ignores everything past this many bytes.
const BCRYPT_MAX_BYTES: usize = 72;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Email já cadastrado")]
    DuplicateEmail,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Users kept in one JSON document, keyed by email.
pub struct AccountDirectory {
    path: PathBuf,
    hash_cost: u32,
    write_lock: Mutex<()>,
}

impl AccountDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_cost(path, bcrypt::DEFAULT_COST)
    }

    pub fn with_cost(path: impl Into<PathBuf>, hash_cost: u32) -> Self {
        Self {
            path: path.into(),
            hash_cost,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn list(&self) -> Result<Vec<UserAccount>, AccountError> {
        Ok(storage::load_list(&self.path).await?)
    }

    pub async fn register(&self, account: NewAccount) -> Result<UserAccount, AccountError> {
        let _guard = self.write_lock.lock().await;
        let mut values = storage::load_document(&self.path).await?;

        let taken = values
            .iter()
            .any(|v| v.get("email").and_then(Value::as_str) == Some(account.email.as_str()));
        if taken {
            return Err(AccountError::DuplicateEmail);
        }

        let user = UserAccount {
            id: values
                .iter()
                .filter_map(|v| v.get("id").and_then(Value::as_u64))
                .max()
                .unwrap_or(0)
                + 1,
            name: account.name,
            email: account.email,
            password_hash: Some(self.hash(&account.password)?),
            legacy_password: None,
            role: account.role,
        };
        values.push(storage::to_value(&user)?);
        storage::save_document(&self.path, &values).await?;

        info!("Registered {} as {}", user.email, user.role.as_str());
        Ok(user)
    }

    /// Returns the first account whose email matches and whose password checks out.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserAccount, AccountError> {
        let users: Vec<UserAccount> = storage::load_list(&self.path).await?;

        let found = users
            .into_iter()
            .filter(|u| u.email == email)
            .find(|u| password_matches(u, password));

        match found {
            Some(user) => Ok(user),
            None => {
                info!("Rejected login for {email}");
                Err(AccountError::InvalidCredentials)
            }
        }
    }

    /// Hashes every leftover plaintext password. Returns how many accounts changed.
    pub async fn migrate_passwords(&self) -> Result<usize, AccountError> {
        let _guard = self.write_lock.lock().await;
        let mut values = storage::load_document(&self.path).await?;
        let mut migrated = 0usize;

        for value in values.iter_mut() {
            let Value::Object(fields) = value else {
                continue;
            };
            let Some(plain) = fields.remove("senha") else {
                continue;
            };
            let plain = match plain {
                Value::Null => None,
                Value::String(plain) => Some(plain),
                other => Some(other.to_string()),
            };
            if let Some(plain) = plain {
                if fields.get("senha_hash").map_or(true, Value::is_null) {
                    fields.insert("senha_hash".to_string(), Value::String(self.hash(&plain)?));
                }
            }
            migrated += 1;
        }

        if migrated > 0 {
            storage::save_document(&self.path, &values).await?;
            info!("Hashed {migrated} plaintext passwords");
        }

        Ok(migrated)
    }

    fn hash(&self, password: &str) -> anyhow::Result<String> {
        Ok(bcrypt::hash(truncate(password), self.hash_cost)?)
    }
}

fn password_matches(user: &UserAccount, password: &str) -> bool {
    match (&user.password_hash, &user.legacy_password) {
        (Some(hash), _) => bcrypt::verify(truncate(password), hash).unwrap_or_else(|e| {
            warn!("Unreadable password hash for {}: {e}", user.email);
            false
        }),
        (None, Some(plain)) => plain == password,
        (None, None) => false,
    }
}

fn truncate(password: &str) -> &str {
    if password.len() <= BCRYPT_MAX_BYTES {
        return password;
    }
    let mut end = BCRYPT_MAX_BYTES;
    while !password.is_char_boundary(end) {
        end -= 1;
    }
    &password[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn directory(dir: &tempfile::TempDir) -> AccountDirectory {
        AccountDirectory::with_cost(dir.path().join("usuarios.json"), 4)
    }

    fn new_account(email: &str, password: &str) -> NewAccount {
        NewAccount {
            name: "Ana".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::Student,
        }
    }

    #[tokio::test]
    async fn register_hashes_and_assigns_ids() {
        let dir = tempdir().unwrap();
        let accounts = directory(&dir);

        let first = accounts.register(new_account("ana@escola.br", "segredo")).await.unwrap();
        let second = accounts.register(new_account("bia@escola.br", "outro")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        let hash = first.password_hash.unwrap();
        assert_ne!(hash, "segredo");
        assert!(first.legacy_password.is_none());

        let raw = std::fs::read_to_string(dir.path().join("usuarios.json")).unwrap();
        assert!(raw.contains("\"senha_hash\""));
        assert!(raw.contains("\"tipo\": \"aluno\""));
        assert!(!raw.contains("\"senha\":"));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let dir = tempdir().unwrap();
        let accounts = directory(&dir);

        accounts.register(new_account("ana@escola.br", "segredo")).await.unwrap();
        let err = accounts
            .register(new_account("ana@escola.br", "outra"))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::DuplicateEmail));
        assert_eq!(accounts.list().await.unwrap().len(), 1);

        // Email comparison is exact.
        accounts.register(new_account("Ana@escola.br", "outra")).await.unwrap();
        assert_eq!(accounts.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let dir = tempdir().unwrap();
        let accounts = directory(&dir);
        accounts.register(new_account("ana@escola.br", "segredo")).await.unwrap();

        let user = accounts.authenticate("ana@escola.br", "segredo").await.unwrap();
        assert_eq!(user.name, "Ana");

        let wrong = accounts.authenticate("ana@escola.br", "errada").await;
        assert!(matches!(wrong, Err(AccountError::InvalidCredentials)));

        let unknown = accounts.authenticate("zoe@escola.br", "segredo").await;
        assert!(matches!(unknown, Err(AccountError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn legacy_plaintext_accounts_log_in_and_migrate_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("usuarios.json");
        std::fs::write(
            &path,
            r#"[
                {"id": 1, "nome": "Prof", "email": "prof@escola.br", "senha": "1234", "tipo": "professor"},
                {"id": 2, "nome": "Broken", "email": "broken@escola.br", "senha_hash": "not-a-hash", "tipo": "aluno"}
            ]"#,
        )
        .unwrap();
        let accounts = directory(&dir);

        let user = accounts.authenticate("prof@escola.br", "1234").await.unwrap();
        assert_eq!(user.role, Role::Teacher);
        assert!(accounts.authenticate("broken@escola.br", "x").await.is_err());

        assert_eq!(accounts.migrate_passwords().await.unwrap(), 1);
        assert_eq!(accounts.migrate_passwords().await.unwrap(), 0);

        let users = accounts.list().await.unwrap();
        assert!(users.iter().all(|u| u.legacy_password.is_none()));
        assert!(accounts.authenticate("prof@escola.br", "1234").await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_emails_log_in_with_their_own_password() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("usuarios.json"),
            r#"[
                {"id": 1, "nome": "Primeira", "email": "d@x", "senha": "um", "tipo": "aluno"},
                {"id": 2, "nome": "Segunda", "email": "d@x", "senha": "dois", "tipo": "aluno"}
            ]"#,
        )
        .unwrap();
        let accounts = directory(&dir);

        assert_eq!(accounts.authenticate("d@x", "um").await.unwrap().id, 1);
        assert_eq!(accounts.authenticate("d@x", "dois").await.unwrap().id, 2);
        assert!(accounts.authenticate("d@x", "tres").await.is_err());
    }

    #[tokio::test]
    async fn unreadable_accounts_are_kept_on_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("usuarios.json");
        std::fs::write(
            &path,
            r#"[
                {"id": 1, "nome": "Prof", "email": "prof@escola.br", "senha": "1234", "tipo": "professor"},
                {"id": 5, "nome": "Root", "email": "root@escola.br", "senha": "x", "tipo": "admin"}
            ]"#,
        )
        .unwrap();
        let accounts = directory(&dir);

        assert!(accounts.authenticate("prof@escola.br", "1234").await.is_ok());

        let err = accounts
            .register(new_account("root@escola.br", "y"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail));

        let user = accounts.register(new_account("ana@escola.br", "segredo")).await.unwrap();
        assert_eq!(user.id, 6);
        assert_eq!(accounts.migrate_passwords().await.unwrap(), 2);

        let raw: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[1]["tipo"], "admin");
        assert!(raw[1].get("senha").is_none());
        assert!(accounts.authenticate("prof@escola.br", "1234").await.is_ok());
        assert_eq!(accounts.list().await.unwrap().len(), 2);
    }

    #[test]
    fn long_passwords_truncate_on_char_boundary() {
        let password = "é".repeat(40);
        let cut = truncate(&password);
        assert!(cut.len() <= BCRYPT_MAX_BYTES);
        assert_eq!(cut.chars().count(), 36);
        assert_eq!(truncate("curta"), "curta");
    }
}
