use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Celebrity, EntityKind, EntityRef, Favorite, Film},
    notice::Notice,
    remote::DataService,
    session::Session,
};

/// The signed-in user's favorites, mirrored from the remote table.
///
/// Mutations take `&mut self`, so a cache shared behind a mutex applies one
/// toggle at a time.
#[derive(Debug, Default)]
pub struct Favorites {
    owner: Option<Uuid>,
    items: Vec<Favorite>,
}

#[derive(Debug, Default, Serialize)]
pub struct FavoriteEntities {
    pub celebrities: Vec<Celebrity>,
    pub films: Vec<Film>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Favorite] {
        &self.items
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.owner
    }

    pub fn is_favorite(&self, id: Uuid, kind: EntityKind) -> bool {
        self.find(EntityRef::new(kind, id)).is_some()
    }

    fn find(&self, target: EntityRef) -> Option<&Favorite> {
        self.items.iter().find(|fav| fav.target == target)
    }

    /// Brings the cache in line with `session`: cleared when nobody is
    /// signed in, reloaded when the user differs from the cached owner.
    pub async fn sync(&mut self, data: &dyn DataService, session: &Session) {
        match session.user_id() {
            None => self.clear(),
            Some(user_id) if self.owner != Some(user_id) => self.reload(data, session).await,
            Some(_) => {},
        }
    }

    pub fn clear(&mut self) {
        self.owner = None;
        self.items.clear();
    }

    /// Replaces the cache with the remote rows. A failed load is logged; the
    /// previous contents survive only if they belong to the same user.
    pub async fn reload(&mut self, data: &dyn DataService, session: &Session) {
        let Some(identity) = session.identity() else {
            self.clear();
            return;
        };
        if self.owner != Some(identity.user_id) {
            self.clear();
        }

        match data.favorites(identity).await {
            Ok(items) => {
                debug!(user_id = %identity.user_id, count = items.len(), "loaded favorites");
                self.owner = Some(identity.user_id);
                self.items = items;
            },
            Err(err) => {
                warn!(user_id = %identity.user_id, error = %err, "failed to load favorites");
            },
        }
    }

    pub async fn toggle(
        &mut self,
        data: &dyn DataService,
        session: &Session,
        target: EntityRef,
    ) -> Notice {
        let Some(identity) = session.identity() else {
            return Notice::error("Please sign in to add favorites");
        };

        if self.owner != Some(identity.user_id) {
            self.reload(data, session).await;
            // Without this user's rows an add could duplicate one.
            if self.owner != Some(identity.user_id) {
                return Notice::error("Failed to update favorites");
            }
        }

        let result: AppResult<Notice> = async {
            if let Some(existing) = self.find(target).cloned() {
                let removed = data.delete_favorite(identity, existing.id).await?;
                if removed == 0 {
                    return Err(AppError::NotFound("Favorite".to_string()));
                }
                debug!(id = %existing.id, "deleted favorite");
                self.items.retain(|fav| fav.id != existing.id);
                Ok(Notice::success("Removed from favorites"))
            } else {
                let created = data.insert_favorite(identity, target).await?;
                debug!(id = %created.id, kind = %target.kind(), "added favorite");
                self.items.push(created);
                Ok(Notice::success("Added to favorites"))
            }
        }
        .await;

        result.unwrap_or_else(|err| {
            warn!(user_id = %identity.user_id, error = %err, "failed to toggle favorite");
            Notice::error("Failed to update favorites")
        })
    }

    /// Looks up the catalog rows behind the cached favorites.
    pub async fn resolve(&self, data: &dyn DataService) -> AppResult<FavoriteEntities> {
        let celebrity_ids: Vec<Uuid> =
            self.items.iter().filter_map(|fav| fav.target.celebrity_id()).collect();
        let film_ids: Vec<Uuid> = self.items.iter().filter_map(|fav| fav.target.film_id()).collect();

        let (celebrities, films) = futures::try_join!(
            data.celebrities_by_ids(&celebrity_ids),
            data.films_by_ids(&film_ids)
        )?;
        Ok(FavoriteEntities { celebrities, films })
    }
}
