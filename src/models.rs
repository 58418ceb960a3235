use std::{fmt, str::FromStr};

use jiff::{Timestamp, civil::Date};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Celebrity {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub known_for: Option<String>,
    pub nationality: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<Date>,
    pub birth_place: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Film {
    pub id: Uuid,
    pub title: String,
    pub poster_url: Option<String>,
    pub release_year: Option<i32>,
    pub genre: Option<String>,
    pub director: Option<String>,
    #[serde(default, deserialize_with = "de_rating")]
    pub rating: Option<f64>,
    pub duration_minutes: Option<i32>,
}

/// Numeric columns may arrive as JSON numbers or as decimal strings.
fn de_rating<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CastLink {
    pub film_id: Uuid,
    pub celebrity_id: Uuid,
    pub role_name: Option<String>,
    #[serde(default)]
    pub is_lead: bool,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Celebrity,
    Film,
}

impl EntityKind {
    /// Column holding the target id for this kind on favorites and comments.
    pub fn column(self) -> &'static str {
        match self {
            EntityKind::Celebrity => "celebrity_id",
            EntityKind::Film => "film_id",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Celebrity => "celebrity",
            EntityKind::Film => "film",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "celebrity" => Ok(EntityKind::Celebrity),
            "film" => Ok(EntityKind::Film),
            other => Err(format!("unknown entity kind '{other}'")),
        }
    }
}

/// The single catalog entry a favorite or comment points at.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EntityRef {
    Celebrity(Uuid),
    Film(Uuid),
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        match kind {
            EntityKind::Celebrity => EntityRef::Celebrity(id),
            EntityKind::Film => EntityRef::Film(id),
        }
    }

    pub fn kind(self) -> EntityKind {
        match self {
            EntityRef::Celebrity(_) => EntityKind::Celebrity,
            EntityRef::Film(_) => EntityKind::Film,
        }
    }

    pub fn id(self) -> Uuid {
        match self {
            EntityRef::Celebrity(id) | EntityRef::Film(id) => id,
        }
    }

    /// Rebuilds a target from the nullable column pair used in storage.
    ///
    /// Returns `None` unless exactly one of the two ids is present.
    pub fn from_columns(celebrity_id: Option<Uuid>, film_id: Option<Uuid>) -> Option<Self> {
        match (celebrity_id, film_id) {
            (Some(id), None) => Some(EntityRef::Celebrity(id)),
            (None, Some(id)) => Some(EntityRef::Film(id)),
            _ => None,
        }
    }

    pub fn celebrity_id(self) -> Option<Uuid> {
        match self {
            EntityRef::Celebrity(id) => Some(id),
            EntityRef::Film(_) => None,
        }
    }

    pub fn film_id(self) -> Option<Uuid> {
        match self {
            EntityRef::Film(id) => Some(id),
            EntityRef::Celebrity(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target: EntityRef,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: Timestamp,
    pub target: EntityRef,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub favorite_genre: Option<String>,
}

/// Editable profile fields; blank values are stored as null.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub favorite_genre: String,
    #[serde(default)]
    pub avatar_url: String,
}

impl ProfileUpdate {
    pub fn into_profile(self, user_id: Uuid) -> Profile {
        Profile {
            user_id,
            username: blank_to_none(self.username),
            full_name: blank_to_none(self.full_name),
            avatar_url: blank_to_none(self.avatar_url),
            bio: blank_to_none(self.bio),
            favorite_genre: blank_to_none(self.favorite_genre),
        }
    }
}

fn blank_to_none(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub const ANONYMOUS: &str = "Anonymous";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Author {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Author {
    pub fn from_profile(user_id: Uuid, profile: Option<&Profile>) -> Self {
        Self {
            user_id,
            username: profile.and_then(|p| p.username.clone()),
            full_name: profile.and_then(|p| p.full_name.clone()),
            avatar_url: profile.and_then(|p| p.avatar_url.clone()),
        }
    }

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().or(self.username.as_deref()).unwrap_or(ANONYMOUS)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Author,
    pub display_name: String,
}

/// A comment in the site-wide feed, with the name of whatever it was left on.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeedComment {
    #[serde(flatten)]
    pub view: CommentView,
    pub target_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Credit {
    pub film: Film,
    pub role_name: Option<String>,
    pub is_lead: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CastMember {
    pub celebrity: Celebrity,
    pub role_name: Option<String>,
    pub is_lead: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CelebrityDetail {
    pub celebrity: Celebrity,
    pub filmography: Vec<Credit>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilmDetail {
    pub film: Film,
    pub cast: Vec<CastMember>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub celebrities: Vec<Celebrity>,
    pub films: Vec<Film>,
}

impl SearchResults {
    pub fn total(&self) -> usize {
        self.celebrities.len() + self.films.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Featured {
    pub celebrities: Vec<Celebrity>,
    pub top_rated: Vec<Film>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ActivityStats {
    pub favorites: u64,
    pub comments: u64,
}
