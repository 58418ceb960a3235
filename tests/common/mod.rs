#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use celebyfilm::{
    db,
    error::{AppError, AppResult},
    models::{CastLink, Celebrity, Comment, EntityRef, Favorite, Film, Profile},
    remote::{
        AuthService, DataService, FilmOrder,
        local::{CatalogSeed, LocalStore},
    },
    session::{Identity, Session},
};
use uuid::Uuid;

pub const TOM_HANKS: Uuid = Uuid::from_u128(0xc1);
pub const MERYL_STREEP: Uuid = Uuid::from_u128(0xc2);
pub const SONG_KANG_HO: Uuid = Uuid::from_u128(0xc3);

pub const FORREST_GUMP: Uuid = Uuid::from_u128(0xf1);
pub const PARASITE: Uuid = Uuid::from_u128(0xf2);
pub const THE_POST: Uuid = Uuid::from_u128(0xf3);

fn celebrity(id: Uuid, name: &str, known_for: &str, nationality: &str) -> Celebrity {
    Celebrity {
        id,
        name: name.to_string(),
        image_url: None,
        known_for: Some(known_for.to_string()),
        nationality: Some(nationality.to_string()),
        bio: None,
        birth_date: None,
        birth_place: None,
    }
}

fn film(id: Uuid, title: &str, year: i32, genre: &str, director: &str, rating: f64) -> Film {
    Film {
        id,
        title: title.to_string(),
        poster_url: None,
        release_year: Some(year),
        genre: Some(genre.to_string()),
        director: Some(director.to_string()),
        rating: Some(rating),
        duration_minutes: None,
    }
}

fn cast(film_id: Uuid, celebrity_id: Uuid, role: &str, is_lead: bool) -> CastLink {
    CastLink { film_id, celebrity_id, role_name: Some(role.to_string()), is_lead }
}

pub fn seed() -> CatalogSeed {
    CatalogSeed {
        celebrities: vec![
            celebrity(TOM_HANKS, "Tom Hanks", "Forrest Gump", "American"),
            celebrity(MERYL_STREEP, "Meryl Streep", "The Post", "American"),
            celebrity(SONG_KANG_HO, "Song Kang-ho", "Parasite", "South Korean"),
        ],
        films: vec![
            film(FORREST_GUMP, "Forrest Gump", 1994, "Drama", "Robert Zemeckis", 8.8),
            film(PARASITE, "Parasite", 2019, "Thriller", "Bong Joon-ho", 8.5),
            film(THE_POST, "The Post", 2017, "Drama", "Steven Spielberg", 7.2),
        ],
        cast: vec![
            cast(FORREST_GUMP, TOM_HANKS, "Forrest Gump", true),
            cast(THE_POST, TOM_HANKS, "Ben Bradlee", false),
            cast(THE_POST, MERYL_STREEP, "Kay Graham", true),
            cast(PARASITE, SONG_KANG_HO, "Kim Ki-taek", true),
        ],
    }
}

/// A fresh in-memory store with the sample catalog loaded.
pub async fn store() -> Arc<LocalStore> {
    let db = db::connect_and_migrate("sqlite::memory:").await.unwrap();
    let store = LocalStore::new(db).with_password_cost(4);
    store.import(&seed()).await.unwrap();
    Arc::new(store)
}

pub async fn sign_up(store: &LocalStore, email: &str, full_name: &str) -> Identity {
    store.sign_up(email, "secret123", full_name).await.unwrap().unwrap()
}

pub async fn signed_in(store: &LocalStore, email: &str) -> Session {
    Session::signed_in(sign_up(store, email, "").await)
}

/// Forwards to a [`LocalStore`] and counts every call that reaches it.
/// While `set_failing(true)` is in effect every call fails like an
/// unreachable backend.
pub struct Counting {
    inner: Arc<LocalStore>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl Counting {
    pub fn new(inner: Arc<LocalStore>) -> Self {
        Self { inner, calls: AtomicUsize::new(0), failing: AtomicBool::new(false) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn hit(&self) -> AppResult<&LocalStore> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            let message = "service unavailable".to_string();
            return Err(AppError::Remote { status: 503, message });
        }
        Ok(&self.inner)
    }
}

#[async_trait]
impl DataService for Counting {
    async fn celebrities(&self, limit: Option<u64>) -> AppResult<Vec<Celebrity>> {
        self.hit()?.celebrities(limit).await
    }

    async fn celebrity(&self, id: Uuid) -> AppResult<Option<Celebrity>> {
        self.hit()?.celebrity(id).await
    }

    async fn celebrities_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Celebrity>> {
        self.hit()?.celebrities_by_ids(ids).await
    }

    async fn search_celebrities(&self, needle: &str, limit: u64) -> AppResult<Vec<Celebrity>> {
        self.hit()?.search_celebrities(needle, limit).await
    }

    async fn films(&self, order: FilmOrder, limit: Option<u64>) -> AppResult<Vec<Film>> {
        self.hit()?.films(order, limit).await
    }

    async fn film(&self, id: Uuid) -> AppResult<Option<Film>> {
        self.hit()?.film(id).await
    }

    async fn films_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Film>> {
        self.hit()?.films_by_ids(ids).await
    }

    async fn search_films(&self, needle: &str, limit: u64) -> AppResult<Vec<Film>> {
        self.hit()?.search_films(needle, limit).await
    }

    async fn cast_for_film(&self, film_id: Uuid) -> AppResult<Vec<CastLink>> {
        self.hit()?.cast_for_film(film_id).await
    }

    async fn cast_for_celebrity(&self, celebrity_id: Uuid) -> AppResult<Vec<CastLink>> {
        self.hit()?.cast_for_celebrity(celebrity_id).await
    }

    async fn favorites(&self, owner: &Identity) -> AppResult<Vec<Favorite>> {
        self.hit()?.favorites(owner).await
    }

    async fn insert_favorite(&self, owner: &Identity, target: EntityRef) -> AppResult<Favorite> {
        self.hit()?.insert_favorite(owner, target).await
    }

    async fn delete_favorite(&self, owner: &Identity, id: Uuid) -> AppResult<u64> {
        self.hit()?.delete_favorite(owner, id).await
    }

    async fn count_favorites(&self, owner: &Identity) -> AppResult<u64> {
        self.hit()?.count_favorites(owner).await
    }

    async fn comments_for(&self, target: EntityRef) -> AppResult<Vec<Comment>> {
        self.hit()?.comments_for(target).await
    }

    async fn recent_comments(&self, limit: u64) -> AppResult<Vec<Comment>> {
        self.hit()?.recent_comments(limit).await
    }

    async fn insert_comment(
        &self,
        owner: &Identity,
        target: EntityRef,
        content: &str,
    ) -> AppResult<Comment> {
        self.hit()?.insert_comment(owner, target, content).await
    }

    async fn delete_comment(&self, owner: &Identity, id: Uuid) -> AppResult<u64> {
        self.hit()?.delete_comment(owner, id).await
    }

    async fn count_comments(&self, owner: &Identity) -> AppResult<u64> {
        self.hit()?.count_comments(owner).await
    }

    async fn profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        self.hit()?.profile(user_id).await
    }

    async fn profiles(&self, user_ids: &[Uuid]) -> AppResult<Vec<Profile>> {
        self.hit()?.profiles(user_ids).await
    }

    async fn update_profile(&self, owner: &Identity, profile: &Profile) -> AppResult<u64> {
        self.hit()?.update_profile(owner, profile).await
    }
}
