//! In-memory adapters and a ready-made `AppState` for unit and router tests.

use std::{
    borrow::Cow,
    error::Error as StdError,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::error::{DatabaseError, ErrorKind};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::{password::hash_password, roles::Role},
    books::repo::{Book, BookRepo, NewBook},
    config::{AppConfig, JwtConfig, MediaConfig, SmtpConfig},
    mail::{EmailMessage, Mailer},
    state::AppState,
    storage::StorageClient,
    users::{
        model::{NewUser, User},
        repo::UserRepo,
    },
};

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        frontend_url: "https://lib.test".into(),
        otp_ttl_minutes: 15,
        reset_ttl_minutes: 15,
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "bookworm-test".into(),
            audience: "bookworm-test-aud".into(),
            ttl_minutes: 5,
            cookie_expire_days: 3,
        },
        smtp: SmtpConfig {
            host: "localhost".into(),
            port: 2525,
            username: String::new(),
            password: String::new(),
            from_email: "noreply@lib.test".into(),
            from_name: "Bookworm".into(),
            starttls: false,
        },
        media: MediaConfig {
            endpoint: "http://localhost:9000".into(),
            bucket: "media".into(),
            access_key: "test".into(),
            secret_key: "test".into(),
            region: "us-east-1".into(),
            public_url: "https://media.test".into(),
        },
    }
}

/// Handles onto the fakes wired into the state returned by [`fake_state`].
pub struct FakeParts {
    pub users: Arc<InMemoryUserRepo>,
    pub books: Arc<InMemoryBookRepo>,
    pub mailer: Arc<RecordingMailer>,
    pub storage: Arc<FakeStorage>,
}

pub fn fake_state() -> (AppState, FakeParts) {
    let parts = FakeParts {
        users: Arc::new(InMemoryUserRepo::default()),
        books: Arc::new(InMemoryBookRepo::default()),
        mailer: Arc::new(RecordingMailer::default()),
        storage: Arc::new(FakeStorage::default()),
    };
    let state = AppState::from_parts(
        Arc::new(test_config()),
        parts.users.clone(),
        parts.books.clone(),
        parts.mailer.clone(),
        parts.storage.clone(),
    );
    (state, parts)
}

/// What Postgres reports when the verified-email index is violated.
#[derive(Debug, thiserror::Error)]
#[error("duplicate key value violates unique constraint \"users_verified_email_key\"")]
pub struct UniqueViolation;

impl DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint \"users_verified_email_key\""
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("23505"))
    }

    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }

    fn constraint(&self) -> Option<&str> {
        Some("users_verified_email_key")
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::UniqueViolation
    }
}

pub fn unique_violation() -> sqlx::Error {
    sqlx::Error::Database(Box::new(UniqueViolation))
}

#[derive(Default)]
pub struct InMemoryUserRepo {
    rows: Mutex<Vec<User>>,
    fail_create: AtomicBool,
}

impl InMemoryUserRepo {
    pub fn all(&self) -> Vec<User> {
        self.rows.lock().unwrap().clone()
    }

    pub fn insert_verified(&self, name: &str, email: &str, password: &str, role: Role) -> User {
        let mut rows = self.rows.lock().unwrap();
        let user = User {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: hash_password(password).unwrap(),
            role,
            account_verified: true,
            verification_code: None,
            verification_code_expire: None,
            reset_password_token: None,
            reset_password_expire: None,
            avatar_public_id: None,
            avatar_url: None,
            created_at: next_created_at(&rows),
        };
        rows.push(user.clone());
        user
    }

    pub fn update_all(&self, mut f: impl FnMut(&mut User)) {
        self.rows.lock().unwrap().iter_mut().for_each(|u| f(u));
    }

    pub fn remove(&self, id: Uuid) {
        self.rows.lock().unwrap().retain(|u| u.id != id);
    }

    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut User)) -> anyhow::Result<User> {
        let mut rows = self.rows.lock().unwrap();
        let user = rows
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| anyhow!("no user {id}"))?;
        f(user);
        Ok(user.clone())
    }
}

// Mirrors the partial unique index on users(email) WHERE account_verified.
fn verified_email_taken(rows: &[User], email: &str, except: Option<Uuid>) -> bool {
    rows.iter()
        .any(|u| u.account_verified && u.email == email && Some(u.id) != except)
}

// Strictly increasing so newest-first ordering is deterministic.
fn next_created_at(rows: &[User]) -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    match rows.iter().map(|u| u.created_at).max() {
        Some(last) if last >= now => last + Duration::milliseconds(1),
        _ => now,
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_verified_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.account_verified && u.email == email)
            .cloned())
    }

    async fn count_pending(&self, email: &str) -> anyhow::Result<i64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|u| !u.account_verified && u.email == email)
            .count() as i64)
    }

    async fn list_pending(&self, email: &str) -> anyhow::Result<Vec<User>> {
        let mut pending: Vec<User> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|u| !u.account_verified && u.email == email)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn list_verified(&self) -> anyhow::Result<Vec<User>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.account_verified)
            .cloned()
            .collect())
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("insert failed"));
        }
        let mut rows = self.rows.lock().unwrap();
        if user.account_verified && verified_email_taken(&rows, &user.email, None) {
            return Err(unique_violation().into());
        }
        let (avatar_public_id, avatar_url) = match user.avatar {
            Some(a) => (Some(a.public_id), Some(a.url)),
            None => (None, None),
        };
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            account_verified: user.account_verified,
            verification_code: user.verification_code,
            verification_code_expire: user.verification_code_expire,
            reset_password_token: None,
            reset_password_expire: None,
            avatar_public_id,
            avatar_url,
            created_at: next_created_at(&rows),
        };
        rows.push(created.clone());
        Ok(created)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        self.remove(id);
        Ok(())
    }

    async fn delete_pending_except(&self, email: &str, keep: Uuid) -> anyhow::Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|u| u.account_verified || u.email != email || u.id == keep);
        Ok((before - rows.len()) as u64)
    }

    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(idx) = rows.iter().position(|u| u.id == id && !u.account_verified) else {
            return Ok(None);
        };
        if verified_email_taken(&rows, &rows[idx].email, Some(id)) {
            return Err(unique_violation().into());
        }
        let user = &mut rows[idx];
        user.account_verified = true;
        user.verification_code = None;
        user.verification_code_expire = None;
        Ok(Some(user.clone()))
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: Option<(&str, OffsetDateTime)>,
    ) -> anyhow::Result<()> {
        self.update(id, |u| {
            u.reset_password_token = token.map(|(hash, _)| hash.to_string());
            u.reset_password_expire = token.map(|(_, expire)| expire);
        })?;
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| {
                u.account_verified
                    && u.reset_password_token.as_deref() == Some(token_hash)
                    && u.reset_password_expire.is_some_and(|e| e > now)
            })
            .cloned())
    }

    async fn replace_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<User> {
        self.update(id, |u| {
            u.password_hash = password_hash.to_string();
            u.reset_password_token = None;
            u.reset_password_expire = None;
        })
    }
}

#[derive(Default)]
pub struct InMemoryBookRepo {
    rows: Mutex<Vec<Book>>,
}

impl InMemoryBookRepo {
    pub fn all(&self) -> Vec<Book> {
        self.rows.lock().unwrap().clone()
    }

    pub fn insert(&self, title: &str, quantity: i32) -> Book {
        let book = Book {
            id: Uuid::new_v4(),
            title: title.into(),
            author: "Jane Austen".into(),
            description: "A novel.".into(),
            price: 9.5,
            quantity,
            availability: quantity > 0,
            average_rating: 0.0,
            created_at: OffsetDateTime::now_utc(),
        };
        self.rows.lock().unwrap().push(book.clone());
        book
    }
}

#[async_trait]
impl BookRepo for InMemoryBookRepo {
    async fn list_all(&self) -> anyhow::Result<Vec<Book>> {
        Ok(self.all())
    }

    async fn create(&self, book: NewBook) -> anyhow::Result<Book> {
        let created = Book {
            id: Uuid::new_v4(),
            title: book.title,
            author: book.author,
            description: book.description,
            price: book.price,
            quantity: book.quantity,
            availability: book.quantity > 0,
            average_rating: 0.0,
            created_at: OffsetDateTime::now_utc(),
        };
        self.rows.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|b| b.id != id);
        Ok(rows.len() != before)
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn last(&self) -> Option<EmailMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    /// Code from the most recent verification mail sent to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<i32> {
        let sent = self.sent.lock().unwrap();
        let body = &sent.iter().rev().find(|m| m.to == email)?.html_body;
        body.split(['>', '<'])
            .map(str::trim)
            .find(|s| s.len() == 5 && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse().ok())
    }

    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("smtp unavailable"));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<Vec<(String, Bytes)>>,
    fail: AtomicBool,
}

impl FakeStorage {
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("bucket unavailable"));
        }
        self.objects.lock().unwrap().push((key.to_string(), body));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().retain(|(k, _)| k != key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://media.test/{key}")
    }
}
