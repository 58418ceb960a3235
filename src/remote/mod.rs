//! Boundary to the hosted data and authentication services.
//!
//! Everything above this module talks to [`DataService`] and
//! [`AuthService`]; the hosted backend is [`supabase::SupabaseClient`] and
//! [`local::LocalStore`] serves the same tables from SQLite.

pub mod local;
pub mod supabase;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{CastLink, Celebrity, Comment, EntityRef, Favorite, Film, Profile},
    session::Identity,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FilmOrder {
    #[default]
    Natural,
    RatingDesc,
}

/// Row-level access to the catalog and community tables.
///
/// Methods taking an [`Identity`] run as that user and are scoped to rows
/// they own.
#[async_trait]
pub trait DataService: Send + Sync {
    /// All celebrities ordered by name.
    async fn celebrities(&self, limit: Option<u64>) -> AppResult<Vec<Celebrity>>;
    async fn celebrity(&self, id: Uuid) -> AppResult<Option<Celebrity>>;
    async fn celebrities_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Celebrity>>;
    /// Case-insensitive substring match on name, known_for or nationality.
    async fn search_celebrities(&self, needle: &str, limit: u64) -> AppResult<Vec<Celebrity>>;

    async fn films(&self, order: FilmOrder, limit: Option<u64>) -> AppResult<Vec<Film>>;
    async fn film(&self, id: Uuid) -> AppResult<Option<Film>>;
    async fn films_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Film>>;
    /// Case-insensitive substring match on title, genre or director.
    async fn search_films(&self, needle: &str, limit: u64) -> AppResult<Vec<Film>>;

    async fn cast_for_film(&self, film_id: Uuid) -> AppResult<Vec<CastLink>>;
    async fn cast_for_celebrity(&self, celebrity_id: Uuid) -> AppResult<Vec<CastLink>>;

    async fn favorites(&self, owner: &Identity) -> AppResult<Vec<Favorite>>;
    async fn insert_favorite(&self, owner: &Identity, target: EntityRef) -> AppResult<Favorite>;
    async fn delete_favorite(&self, owner: &Identity, id: Uuid) -> AppResult<u64>;
    async fn count_favorites(&self, owner: &Identity) -> AppResult<u64>;

    /// Comments on one target, newest first.
    async fn comments_for(&self, target: EntityRef) -> AppResult<Vec<Comment>>;
    /// Newest comments across every target.
    async fn recent_comments(&self, limit: u64) -> AppResult<Vec<Comment>>;
    async fn insert_comment(
        &self,
        owner: &Identity,
        target: EntityRef,
        content: &str,
    ) -> AppResult<Comment>;
    /// Deletes a comment only if `owner` wrote it; returns the rows removed.
    async fn delete_comment(&self, owner: &Identity, id: Uuid) -> AppResult<u64>;
    async fn count_comments(&self, owner: &Identity) -> AppResult<u64>;

    async fn profile(&self, user_id: Uuid) -> AppResult<Option<Profile>>;
    async fn profiles(&self, user_ids: &[Uuid]) -> AppResult<Vec<Profile>>;
    async fn update_profile(&self, owner: &Identity, profile: &Profile) -> AppResult<u64>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<Identity>;
    /// Returns `None` when the account still needs email confirmation.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> AppResult<Option<Identity>>;
    async fn sign_out(&self, identity: &Identity) -> AppResult<()>;
}
