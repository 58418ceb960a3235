//! Per-browser client state.
//!
//! Each signed-in browser gets its own session context, favorites cache and
//! comment threads, identified by a cookie. Handlers lock one client at a time, so
//! mutations against a client's caches never interleave.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use tokio::{
    sync::{Mutex, watch},
    time::Instant,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    comments::CommentThread,
    favorites::Favorites,
    models::EntityRef,
    remote::{AuthService, DataService},
    session::{Session, SessionContext},
};

/// Comment threads kept per client; the least recently used is dropped first.
pub const MAX_THREADS: usize = 32;

pub struct ClientState {
    pub session: SessionContext,
    pub favorites: Favorites,
    threads: HashMap<EntityRef, CommentThread>,
    thread_order: VecDeque<EntityRef>,
    session_changes: watch::Receiver<Session>,
    last_seen: Instant,
}

impl ClientState {
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        let session = SessionContext::new(auth);
        let session_changes = session.subscribe();
        Self {
            session,
            favorites: Favorites::new(),
            threads: HashMap::new(),
            thread_order: VecDeque::new(),
            session_changes,
            last_seen: Instant::now(),
        }
    }

    /// Current session, with the favorites cache brought in line with it if
    /// the identity changed since the last call.
    pub async fn current_session(&mut self, data: &dyn DataService) -> Session {
        let changed = self.session_changes.has_changed().unwrap_or(false);
        let session = self.session_changes.borrow_and_update().clone();
        if changed {
            debug!(user_id = ?session.user_id(), "session changed");
        }
        self.favorites.sync(data, &session).await;
        session
    }

    pub fn thread(&mut self, target: EntityRef) -> &mut CommentThread {
        if let Some(pos) = self.thread_order.iter().position(|t| *t == target) {
            self.thread_order.remove(pos);
        } else if self.thread_order.len() >= MAX_THREADS {
            if let Some(oldest) = self.thread_order.pop_front() {
                self.threads.remove(&oldest);
            }
        }
        self.thread_order.push_back(target);
        self.threads.entry(target).or_insert_with(|| CommentThread::new(target))
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}

pub type SharedClient = Arc<Mutex<ClientState>>;

/// Client states of signed-in browsers, keyed by their session cookie.
///
/// Anonymous requests get an unregistered client that lives only for the
/// request, so only a successful sign-in adds an entry.
pub struct Clients {
    auth: Arc<dyn AuthService>,
    idle_ttl: Duration,
    inner: Mutex<HashMap<Uuid, SharedClient>>,
}

impl Clients {
    pub fn new(auth: Arc<dyn AuthService>, idle_ttl: Duration) -> Self {
        Self { auth, idle_ttl, inner: Mutex::new(HashMap::new()) }
    }

    /// A fresh client that is not tracked by the registry.
    pub fn ephemeral(&self) -> SharedClient {
        Arc::new(Mutex::new(ClientState::new(self.auth.clone())))
    }

    /// Returns the registered client for `id`, if any.
    pub async fn get(&self, id: Uuid) -> Option<SharedClient> {
        let client = self.inner.lock().await.get(&id).cloned()?;
        client.lock().await.touch();
        Some(client)
    }

    /// Starts tracking `client` under a new id.
    pub async fn register(&self, client: SharedClient) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().await.insert(id, client);
        debug!(%id, "registered client");
        id
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.lock().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Drops clients idle for longer than the configured TTL.
    pub async fn sweep(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.len();
        let ttl = self.idle_ttl;
        inner.retain(|_, client| match client.try_lock() {
            Ok(state) => state.last_seen.elapsed() < ttl,
            // Busy clients are in use right now.
            Err(_) => true,
        });
        let removed = before - inner.len();
        if removed > 0 {
            debug!(removed, remaining = inner.len(), "swept idle clients");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::{AppError, AppResult},
        session::Identity,
    };

    struct NoAuth;

    #[async_trait]
    impl AuthService for NoAuth {
        async fn sign_in(&self, _: &str, _: &str) -> AppResult<Identity> {
            Err(AppError::Auth("Invalid login credentials".into()))
        }

        async fn sign_up(&self, _: &str, _: &str, _: &str) -> AppResult<Option<Identity>> {
            Ok(None)
        }

        async fn sign_out(&self, _: &Identity) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn only_registered_clients_are_tracked() {
        let clients = Clients::new(Arc::new(NoAuth), Duration::from_secs(60));

        let _anonymous = clients.ephemeral();
        assert_eq!(clients.len().await, 0);
        assert!(clients.get(Uuid::new_v4()).await.is_none());

        let client = clients.ephemeral();
        let id = clients.register(client.clone()).await;
        let found = clients.get(id).await.unwrap();
        assert!(Arc::ptr_eq(&client, &found));
        assert_eq!(clients.len().await, 1);

        assert!(clients.remove(id).await);
        assert!(clients.get(id).await.is_none());
    }

    #[tokio::test]
    async fn sweep_drops_idle_clients() {
        let clients = Clients::new(Arc::new(NoAuth), Duration::from_millis(100));
        clients.register(clients.ephemeral()).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        let fresh = clients.register(clients.ephemeral()).await;

        assert_eq!(clients.sweep().await, 1);
        assert_eq!(clients.len().await, 1);

        let busy = clients.get(fresh).await.unwrap();
        let _guard = busy.lock().await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(clients.sweep().await, 0);
    }

    #[test]
    fn threads_are_capped_least_recently_used_first() {
        let mut client = ClientState::new(Arc::new(NoAuth));
        let first = EntityRef::Film(Uuid::new_v4());
        let second = EntityRef::Film(Uuid::new_v4());
        client.thread(first);
        client.thread(second);
        // Touching `first` again makes `second` the oldest.
        client.thread(first);

        for _ in 0..MAX_THREADS - 1 {
            client.thread(EntityRef::Celebrity(Uuid::new_v4()));
        }

        assert_eq!(client.thread_count(), MAX_THREADS);
        assert!(client.threads.contains_key(&first));
        assert!(!client.threads.contains_key(&second));
    }
}
