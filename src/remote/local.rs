//! SQLite-backed stand-in for the hosted service, used for offline
//! development and as the backing store in tests.

use async_trait::async_trait;
use jiff::Timestamp;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, LikeExpr},
};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AuthService, DataService, FilmOrder};
use crate::{
    entities::{account, celebrity, comment, favorite, film, film_cast, profile},
    error::{AppError, AppResult},
    models::{CastLink, Celebrity, Comment, EntityRef, Favorite, Film, Profile},
    session::Identity,
};

#[derive(Clone)]
pub struct LocalStore {
    db: DatabaseConnection,
    password_cost: u32,
}

/// Catalog rows to preload into a fresh local store.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub celebrities: Vec<Celebrity>,
    #[serde(default)]
    pub films: Vec<Film>,
    #[serde(default)]
    pub cast: Vec<CastLink>,
}

impl LocalStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, password_cost: bcrypt::DEFAULT_COST }
    }

    /// bcrypt work factor for new local accounts (4..=31).
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Inserts catalog rows, replacing any with the same id.
    pub async fn import(&self, seed: &CatalogSeed) -> AppResult<()> {
        let txn = self.db.begin().await?;

        for c in &seed.celebrities {
            celebrity::Entity::delete_by_id(c.id).exec(&txn).await?;
            celebrity::ActiveModel {
                id: Set(c.id),
                name: Set(c.name.clone()),
                image_url: Set(c.image_url.clone()),
                known_for: Set(c.known_for.clone()),
                nationality: Set(c.nationality.clone()),
                bio: Set(c.bio.clone()),
                birth_date: Set(c.birth_date.map(|d| d.to_string())),
                birth_place: Set(c.birth_place.clone()),
            }
            .insert(&txn)
            .await?;
        }

        for f in &seed.films {
            film::Entity::delete_by_id(f.id).exec(&txn).await?;
            film::ActiveModel {
                id: Set(f.id),
                title: Set(f.title.clone()),
                poster_url: Set(f.poster_url.clone()),
                release_year: Set(f.release_year),
                genre: Set(f.genre.clone()),
                director: Set(f.director.clone()),
                rating: Set(f.rating),
                duration_minutes: Set(f.duration_minutes),
            }
            .insert(&txn)
            .await?;
        }

        for link in &seed.cast {
            film_cast::Entity::delete_many()
                .filter(film_cast::Column::FilmId.eq(link.film_id))
                .filter(film_cast::Column::CelebrityId.eq(link.celebrity_id))
                .exec(&txn)
                .await?;
            film_cast::ActiveModel {
                id: Set(Uuid::new_v4()),
                film_id: Set(link.film_id),
                celebrity_id: Set(link.celebrity_id),
                role_name: Set(link.role_name.clone()),
                is_lead: Set(link.is_lead),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(
            celebrities = seed.celebrities.len(),
            films = seed.films.len(),
            cast = seed.cast.len(),
            "imported catalog"
        );
        Ok(())
    }
}

fn contains_pattern(needle: &str) -> LikeExpr {
    let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    LikeExpr::new(format!("%{escaped}%")).escape('\\')
}

/// SQLite's LIKE ignores ASCII case, matching the hosted case-insensitive `imatch`.
fn any_contains<C: ColumnTrait>(columns: &[C], needle: &str) -> Condition {
    columns.iter().fold(Condition::any(), |cond, col| {
        cond.add(Expr::col(col.as_column_ref()).like(contains_pattern(needle)))
    })
}

fn to_celebrity(m: celebrity::Model) -> Celebrity {
    Celebrity {
        id: m.id,
        name: m.name,
        image_url: m.image_url,
        known_for: m.known_for,
        nationality: m.nationality,
        bio: m.bio,
        birth_date: m.birth_date.and_then(|d| d.parse().ok()),
        birth_place: m.birth_place,
    }
}

fn to_film(m: film::Model) -> Film {
    Film {
        id: m.id,
        title: m.title,
        poster_url: m.poster_url,
        release_year: m.release_year,
        genre: m.genre,
        director: m.director,
        rating: m.rating,
        duration_minutes: m.duration_minutes,
    }
}

fn to_cast_link(m: film_cast::Model) -> CastLink {
    CastLink {
        film_id: m.film_id,
        celebrity_id: m.celebrity_id,
        role_name: m.role_name,
        is_lead: m.is_lead,
    }
}

fn to_favorite(m: favorite::Model) -> Option<Favorite> {
    let target = EntityRef::from_columns(m.celebrity_id, m.film_id)?;
    Some(Favorite { id: m.id, user_id: m.user_id, target })
}

fn to_comment(m: comment::Model) -> Option<Comment> {
    let target = EntityRef::from_columns(m.celebrity_id, m.film_id)?;
    Some(Comment {
        id: m.id,
        user_id: m.user_id,
        content: m.content,
        created_at: Timestamp::from_microsecond(m.created_at).ok()?,
        target,
    })
}

fn to_profile(m: profile::Model) -> Profile {
    Profile {
        user_id: m.user_id,
        username: m.username,
        full_name: m.full_name,
        avatar_url: m.avatar_url,
        bio: m.bio,
        favorite_genre: m.favorite_genre,
    }
}

fn target_condition(target: EntityRef) -> Condition {
    match target {
        EntityRef::Celebrity(id) => Condition::all().add(comment::Column::CelebrityId.eq(id)),
        EntityRef::Film(id) => Condition::all().add(comment::Column::FilmId.eq(id)),
    }
}

#[async_trait]
impl DataService for LocalStore {
    async fn celebrities(&self, limit: Option<u64>) -> AppResult<Vec<Celebrity>> {
        let rows = celebrity::Entity::find()
            .order_by_asc(celebrity::Column::Name)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_celebrity).collect())
    }

    async fn celebrity(&self, id: Uuid) -> AppResult<Option<Celebrity>> {
        Ok(celebrity::Entity::find_by_id(id).one(&self.db).await?.map(to_celebrity))
    }

    async fn celebrities_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Celebrity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = celebrity::Entity::find()
            .filter(celebrity::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_celebrity).collect())
    }

    async fn search_celebrities(&self, needle: &str, limit: u64) -> AppResult<Vec<Celebrity>> {
        let columns = [
            celebrity::Column::Name,
            celebrity::Column::KnownFor,
            celebrity::Column::Nationality,
        ];
        let rows = celebrity::Entity::find()
            .filter(any_contains(&columns, needle))
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_celebrity).collect())
    }

    async fn films(&self, order: FilmOrder, limit: Option<u64>) -> AppResult<Vec<Film>> {
        let mut query = film::Entity::find();
        if order == FilmOrder::RatingDesc {
            query = query.order_by_desc(film::Column::Rating);
        }
        let rows = query.limit(limit).all(&self.db).await?;
        Ok(rows.into_iter().map(to_film).collect())
    }

    async fn film(&self, id: Uuid) -> AppResult<Option<Film>> {
        Ok(film::Entity::find_by_id(id).one(&self.db).await?.map(to_film))
    }

    async fn films_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Film>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = film::Entity::find()
            .filter(film::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_film).collect())
    }

    async fn search_films(&self, needle: &str, limit: u64) -> AppResult<Vec<Film>> {
        let columns = [film::Column::Title, film::Column::Genre, film::Column::Director];
        let rows = film::Entity::find()
            .filter(any_contains(&columns, needle))
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_film).collect())
    }

    async fn cast_for_film(&self, film_id: Uuid) -> AppResult<Vec<CastLink>> {
        let rows = film_cast::Entity::find()
            .filter(film_cast::Column::FilmId.eq(film_id))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_cast_link).collect())
    }

    async fn cast_for_celebrity(&self, celebrity_id: Uuid) -> AppResult<Vec<CastLink>> {
        let rows = film_cast::Entity::find()
            .filter(film_cast::Column::CelebrityId.eq(celebrity_id))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_cast_link).collect())
    }

    async fn favorites(&self, owner: &Identity) -> AppResult<Vec<Favorite>> {
        let rows = favorite::Entity::find()
            .filter(favorite::Column::UserId.eq(owner.user_id))
            .order_by_asc(favorite::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().filter_map(to_favorite).collect())
    }

    async fn insert_favorite(&self, owner: &Identity, target: EntityRef) -> AppResult<Favorite> {
        let model = favorite::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner.user_id),
            celebrity_id: Set(target.celebrity_id()),
            film_id: Set(target.film_id()),
            created_at: Set(Timestamp::now().as_microsecond()),
        }
        .insert(&self.db)
        .await?;
        debug!(id = %model.id, user_id = %owner.user_id, "inserted favorite");
        Ok(Favorite { id: model.id, user_id: model.user_id, target })
    }

    async fn delete_favorite(&self, owner: &Identity, id: Uuid) -> AppResult<u64> {
        let res = favorite::Entity::delete_many()
            .filter(favorite::Column::Id.eq(id))
            .filter(favorite::Column::UserId.eq(owner.user_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }

    async fn count_favorites(&self, owner: &Identity) -> AppResult<u64> {
        Ok(favorite::Entity::find()
            .filter(favorite::Column::UserId.eq(owner.user_id))
            .count(&self.db)
            .await?)
    }

    async fn comments_for(&self, target: EntityRef) -> AppResult<Vec<Comment>> {
        let rows = comment::Entity::find()
            .filter(target_condition(target))
            .order_by_desc(comment::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().filter_map(to_comment).collect())
    }

    async fn recent_comments(&self, limit: u64) -> AppResult<Vec<Comment>> {
        let rows = comment::Entity::find()
            .order_by_desc(comment::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().filter_map(to_comment).collect())
    }

    async fn insert_comment(
        &self,
        owner: &Identity,
        target: EntityRef,
        content: &str,
    ) -> AppResult<Comment> {
        let model = comment::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner.user_id),
            content: Set(content.to_string()),
            celebrity_id: Set(target.celebrity_id()),
            film_id: Set(target.film_id()),
            created_at: Set(Timestamp::now().as_microsecond()),
        }
        .insert(&self.db)
        .await?;
        to_comment(model).ok_or_else(|| AppError::Validation("invalid comment row".to_string()))
    }

    async fn delete_comment(&self, owner: &Identity, id: Uuid) -> AppResult<u64> {
        let res = comment::Entity::delete_many()
            .filter(comment::Column::Id.eq(id))
            .filter(comment::Column::UserId.eq(owner.user_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }

    async fn count_comments(&self, owner: &Identity) -> AppResult<u64> {
        Ok(comment::Entity::find()
            .filter(comment::Column::UserId.eq(owner.user_id))
            .count(&self.db)
            .await?)
    }

    async fn profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        Ok(profile::Entity::find_by_id(user_id).one(&self.db).await?.map(to_profile))
    }

    async fn profiles(&self, user_ids: &[Uuid]) -> AppResult<Vec<Profile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = profile::Entity::find()
            .filter(profile::Column::UserId.is_in(user_ids.iter().copied()))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_profile).collect())
    }

    async fn update_profile(&self, owner: &Identity, p: &Profile) -> AppResult<u64> {
        let res = profile::Entity::update_many()
            .col_expr(profile::Column::Username, Expr::value(p.username.clone()))
            .col_expr(profile::Column::FullName, Expr::value(p.full_name.clone()))
            .col_expr(profile::Column::AvatarUrl, Expr::value(p.avatar_url.clone()))
            .col_expr(profile::Column::Bio, Expr::value(p.bio.clone()))
            .col_expr(profile::Column::FavoriteGenre, Expr::value(p.favorite_genre.clone()))
            .filter(profile::Column::UserId.eq(owner.user_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }
}

async fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(anyhow::Error::new)?
        .map_err(|err| AppError::Other(anyhow::Error::new(err)))
}

async fn verify_password(password: &str, digest: &str) -> AppResult<bool> {
    let password = password.to_string();
    let digest = digest.to_string();
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &digest))
        .await
        .map_err(anyhow::Error::new)?;
    Ok(verified.unwrap_or(false))
}

fn issue_identity(user_id: Uuid, email: String) -> Identity {
    Identity { user_id, email, access_token: Uuid::new_v4().simple().to_string() }
}

#[async_trait]
impl AuthService for LocalStore {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<Identity> {
        let email = email.to_lowercase();
        let account = account::Entity::find()
            .filter(account::Column::Email.eq(email.as_str()))
            .one(&self.db)
            .await?;

        let invalid = || AppError::Auth("Invalid login credentials".to_string());
        let Some(account) = account else {
            return Err(invalid());
        };
        if !verify_password(password, &account.password_digest).await? {
            return Err(invalid());
        }
        Ok(issue_identity(account.user_id, account.email))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> AppResult<Option<Identity>> {
        let email = email.to_lowercase();
        let existing = account::Entity::find()
            .filter(account::Column::Email.eq(email.as_str()))
            .count(&self.db)
            .await?;
        if existing > 0 {
            return Err(AppError::Auth("User already registered".to_string()));
        }

        let user_id = Uuid::new_v4();
        let password_digest = hash_password(password, self.password_cost).await?;
        let txn = self.db.begin().await?;

        account::ActiveModel {
            user_id: Set(user_id),
            email: Set(email.clone()),
            password_digest: Set(password_digest),
            created_at: Set(Timestamp::now().as_second()),
        }
        .insert(&txn)
        .await?;

        let full_name = full_name.trim();
        profile::ActiveModel {
            user_id: Set(user_id),
            username: Set(None),
            full_name: Set((!full_name.is_empty()).then(|| full_name.to_string())),
            avatar_url: Set(None),
            bio: Set(None),
            favorite_genre: Set(None),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        debug!(user_id = %user_id, "created local account");
        Ok(Some(issue_identity(user_id, email)))
    }

    async fn sign_out(&self, _identity: &Identity) -> AppResult<()> {
        Ok(())
    }
}
