//! User repository over the `users` JSON blob.
//!
//! The whole record set lives under one key, so every mutation is a
//! read-modify-write of the blob. Mutations are serialized through a single
//! async lock; reads go straight to the store.

use crate::domain::errors::ServiceError;
use crate::domain::user::{NewUser, User, UserId, UserPool};
use crate::events::USERS_KEY;
use crate::ports::outbound::KeyValueStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Result of seeding the store at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The key was absent and this many records were written.
    Seeded(usize),
    /// The key already existed and was left untouched.
    AlreadyPresent,
}

pub struct UserRepository {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<UserPool, ServiceError> {
        match self.store.get(USERS_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(UserPool::default()),
        }
    }

    async fn save(&self, pool: &UserPool) -> Result<(), ServiceError> {
        let raw = serde_json::to_string(pool)?;
        self.store.set(USERS_KEY, raw).await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.load().await?.users)
    }

    pub async fn find(&self, id: UserId) -> Result<User, ServiceError> {
        self.load()
            .await?
            .find(id)
            .cloned()
            .ok_or(ServiceError::NotFound)
    }

    /// Append a record with the next free id.
    pub async fn create(&self, new_user: NewUser) -> Result<User, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut pool = self.load().await?;

        let user = new_user.with_id(pool.next_id());
        pool.users.push(user.clone());
        self.save(&pool).await?;

        debug!(user_id = user.id, "Created user");
        Ok(user)
    }

    pub async fn delete(&self, id: UserId) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut pool = self.load().await?;

        let before = pool.users.len();
        pool.users.retain(|user| user.id != id);
        if pool.users.len() == before {
            return Err(ServiceError::NotFoundForDelete);
        }
        self.save(&pool).await?;

        debug!(user_id = id, "Deleted user");
        Ok(())
    }

    /// Replace every field of a record except its id.
    pub async fn replace(&self, id: UserId, new_user: NewUser) -> Result<User, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut pool = self.load().await?;

        let slot = pool
            .users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(ServiceError::NotFoundForUpdate(id))?;
        *slot = new_user.with_id(id);
        let updated = slot.clone();
        self.save(&pool).await?;

        debug!(user_id = id, "Replaced user");
        Ok(updated)
    }

    /// Write the seed records unless the store already holds a record set.
    pub async fn bootstrap(&self, seed: Vec<User>) -> Result<BootstrapOutcome, ServiceError> {
        let _guard = self.write_lock.lock().await;

        if self.store.exists(USERS_KEY).await? {
            info!("Users already present in store, skipping seed");
            return Ok(BootstrapOutcome::AlreadyPresent);
        }

        let count = seed.len();
        self.save(&UserPool { users: seed }).await?;
        info!(count = count, "Seeded users into store");
        Ok(BootstrapOutcome::Seeded(count))
    }
}
