use std::{num::NonZeroU32, sync::Arc};

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use jiff::Timestamp;
use reqwest::{Method, RequestBuilder, Response, header::HeaderValue};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{AuthService, DataService, FilmOrder};
use crate::{
    error::{AppError, AppResult},
    models::{CastLink, Celebrity, Comment, EntityRef, Favorite, Film, Profile},
    session::Identity,
};

type Params = Vec<(&'static str, String)>;

/// Client for a Supabase project: PostgREST for tables, GoTrue for auth.
pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl SupabaseClient {
    pub fn new(client: reqwest::Client, base_url: String, anon_key: String, rps: u32) -> Self {
        let rps = NonZeroU32::new(rps.max(1)).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(rps)));
        Self { client, base_url: base_url.trim_end_matches('/').to_string(), anon_key, limiter }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Builds a request carrying the project key and, when acting as a user,
    /// that user's access token.
    async fn request(
        &self,
        method: Method,
        url: String,
        as_user: Option<&Identity>,
    ) -> RequestBuilder {
        self.limiter.until_ready().await;
        let token = as_user.map(|i| i.access_token.as_str()).unwrap_or(&self.anon_key);
        self.client.request(method, url).header("apikey", &self.anon_key).bearer_auth(token)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        as_user: Option<&Identity>,
        params: Params,
    ) -> AppResult<Vec<T>> {
        debug!(table, ?params, "select");
        let resp = self
            .request(Method::GET, self.rest_url(table), as_user)
            .await
            .query(&params)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        params: Params,
    ) -> AppResult<Option<T>> {
        let rows: Vec<T> = self.select(table, None, params).await?;
        Ok(rows.into_iter().next())
    }

    async fn count(&self, table: &str, as_user: &Identity, params: Params) -> AppResult<u64> {
        let resp = self
            .request(Method::HEAD, self.rest_url(table), Some(as_user))
            .await
            .header("Prefer", "count=exact")
            .query(&params)
            .send()
            .await?;
        let resp = check(resp).await?;
        let total = resp.headers().get("content-range").and_then(parse_content_range_total);
        total.ok_or_else(|| AppError::Remote {
            status: resp.status().as_u16(),
            message: "missing row count".to_string(),
        })
    }

    async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        as_user: &Identity,
        body: &B,
    ) -> AppResult<T> {
        let resp = self
            .request(Method::POST, self.rest_url(table), Some(as_user))
            .await
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let rows: Vec<T> = check(resp).await?.json().await?;
        rows.into_iter().next().ok_or_else(|| AppError::Remote {
            status: 201,
            message: format!("insert into {table} returned no row"),
        })
    }

    /// Runs a PATCH or DELETE and returns how many rows it touched.
    async fn mutate(
        &self,
        method: Method,
        table: &str,
        as_user: &Identity,
        params: Params,
        body: Option<serde_json::Value>,
    ) -> AppResult<u64> {
        let mut req = self
            .request(method, self.rest_url(table), Some(as_user))
            .await
            .header("Prefer", "return=representation")
            .query(&params);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let rows: Vec<serde_json::Value> = check(req.send().await?).await?.json().await?;
        Ok(rows.len() as u64)
    }

    async fn auth_call(
        &self,
        path: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> AppResult<Response> {
        self.limiter.until_ready().await;
        let mut req = self.client.post(self.auth_url(path)).header("apikey", &self.anon_key);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.json(&body).send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let message = error_message(&text).unwrap_or_else(|| status.to_string());
        Err(AppError::Auth(message))
    }
}

async fn check(resp: Response) -> AppResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = error_message(&text).unwrap_or(text);
    Err(AppError::Remote { status: status.as_u16(), message })
}

/// Pulls the human-readable message out of a PostgREST or GoTrue error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

fn parse_content_range_total(value: &HeaderValue) -> Option<u64> {
    value.to_str().ok()?.rsplit_once('/')?.1.parse().ok()
}

fn eq(id: Uuid) -> String {
    format!("eq.{id}")
}

fn in_list(ids: &[Uuid]) -> String {
    let joined = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
    format!("in.({joined})")
}

/// `or=(a.imatch."q",b.imatch."q")`: case-insensitive substring match on
/// any column. The needle is regex-escaped so `*`, `%` and `_` match
/// themselves, then quoted so commas and parentheses stay literal.
fn imatch_any(columns: &[&str], needle: &str) -> String {
    let quoted = regex_literal(needle).replace('\\', "\\\\").replace('"', "\\\"");
    let clauses = columns
        .iter()
        .map(|col| format!("{col}.imatch.\"{quoted}\""))
        .collect::<Vec<_>>()
        .join(",");
    format!("({clauses})")
}

fn regex_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(
            ch,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn target_params(target: EntityRef) -> Params {
    vec![(target.kind().column(), eq(target.id()))]
}

#[derive(Debug, Deserialize)]
struct TargetRow {
    id: Uuid,
    user_id: Uuid,
    celebrity_id: Option<Uuid>,
    film_id: Option<Uuid>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    created_at: Option<Timestamp>,
}

impl TargetRow {
    fn target(&self) -> Option<EntityRef> {
        let target = EntityRef::from_columns(self.celebrity_id, self.film_id);
        if target.is_none() {
            warn!(id = %self.id, "row does not reference exactly one entity");
        }
        target
    }

    fn into_favorite(self) -> Option<Favorite> {
        let target = self.target()?;
        Some(Favorite { id: self.id, user_id: self.user_id, target })
    }

    fn into_comment(self) -> Option<Comment> {
        let target = self.target()?;
        Some(Comment {
            id: self.id,
            user_id: self.user_id,
            content: self.content.unwrap_or_default(),
            created_at: self.created_at.unwrap_or(Timestamp::UNIX_EPOCH),
            target,
        })
    }
}

#[derive(Serialize)]
struct NewTargetRow<'a> {
    user_id: Uuid,
    celebrity_id: Option<Uuid>,
    film_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
}

impl<'a> NewTargetRow<'a> {
    fn new(owner: &Identity, target: EntityRef, content: Option<&'a str>) -> Self {
        Self {
            user_id: owner.user_id,
            celebrity_id: target.celebrity_id(),
            film_id: target.film_id(),
            content,
        }
    }
}

const COMMENT_COLUMNS: &str = "id,user_id,content,created_at,celebrity_id,film_id";
const PROFILE_COLUMNS: &str = "user_id,username,full_name,avatar_url,bio,favorite_genre";

#[async_trait]
impl DataService for SupabaseClient {
    async fn celebrities(&self, limit: Option<u64>) -> AppResult<Vec<Celebrity>> {
        let mut params = vec![("select", "*".to_string()), ("order", "name.asc".to_string())];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        self.select("celebrities", None, params).await
    }

    async fn celebrity(&self, id: Uuid) -> AppResult<Option<Celebrity>> {
        self.select_one("celebrities", vec![("select", "*".to_string()), ("id", eq(id))]).await
    }

    async fn celebrities_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Celebrity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select("celebrities", None, vec![("select", "*".to_string()), ("id", in_list(ids))])
            .await
    }

    async fn search_celebrities(&self, needle: &str, limit: u64) -> AppResult<Vec<Celebrity>> {
        let params = vec![
            ("select", "*".to_string()),
            ("or", imatch_any(&["name", "known_for", "nationality"], needle)),
            ("limit", limit.to_string()),
        ];
        self.select("celebrities", None, params).await
    }

    async fn films(&self, order: FilmOrder, limit: Option<u64>) -> AppResult<Vec<Film>> {
        let mut params = vec![("select", "*".to_string())];
        if order == FilmOrder::RatingDesc {
            params.push(("order", "rating.desc.nullslast".to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        self.select("films", None, params).await
    }

    async fn film(&self, id: Uuid) -> AppResult<Option<Film>> {
        self.select_one("films", vec![("select", "*".to_string()), ("id", eq(id))]).await
    }

    async fn films_by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<Film>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select("films", None, vec![("select", "*".to_string()), ("id", in_list(ids))]).await
    }

    async fn search_films(&self, needle: &str, limit: u64) -> AppResult<Vec<Film>> {
        let params = vec![
            ("select", "*".to_string()),
            ("or", imatch_any(&["title", "genre", "director"], needle)),
            ("limit", limit.to_string()),
        ];
        self.select("films", None, params).await
    }

    async fn cast_for_film(&self, film_id: Uuid) -> AppResult<Vec<CastLink>> {
        let params = vec![
            ("select", "film_id,celebrity_id,role_name,is_lead".to_string()),
            ("film_id", eq(film_id)),
        ];
        self.select("film_cast", None, params).await
    }

    async fn cast_for_celebrity(&self, celebrity_id: Uuid) -> AppResult<Vec<CastLink>> {
        let params = vec![
            ("select", "film_id,celebrity_id,role_name,is_lead".to_string()),
            ("celebrity_id", eq(celebrity_id)),
        ];
        self.select("film_cast", None, params).await
    }

    async fn favorites(&self, owner: &Identity) -> AppResult<Vec<Favorite>> {
        let params = vec![
            ("select", "id,user_id,celebrity_id,film_id".to_string()),
            ("user_id", eq(owner.user_id)),
        ];
        let rows: Vec<TargetRow> = self.select("favorites", Some(owner), params).await?;
        Ok(rows.into_iter().filter_map(TargetRow::into_favorite).collect())
    }

    async fn insert_favorite(&self, owner: &Identity, target: EntityRef) -> AppResult<Favorite> {
        let row: TargetRow =
            self.insert("favorites", owner, &NewTargetRow::new(owner, target, None)).await?;
        row.into_favorite().ok_or_else(|| AppError::Remote {
            status: 201,
            message: "inserted favorite has no single target".to_string(),
        })
    }

    async fn delete_favorite(&self, owner: &Identity, id: Uuid) -> AppResult<u64> {
        let params = vec![("id", eq(id)), ("user_id", eq(owner.user_id))];
        self.mutate(Method::DELETE, "favorites", owner, params, None).await
    }

    async fn count_favorites(&self, owner: &Identity) -> AppResult<u64> {
        let params = vec![("select", "id".to_string()), ("user_id", eq(owner.user_id))];
        self.count("favorites", owner, params).await
    }

    async fn comments_for(&self, target: EntityRef) -> AppResult<Vec<Comment>> {
        let mut params = vec![("select", COMMENT_COLUMNS.to_string())];
        params.extend(target_params(target));
        params.push(("order", "created_at.desc".to_string()));
        let rows: Vec<TargetRow> = self.select("comments", None, params).await?;
        Ok(rows.into_iter().filter_map(TargetRow::into_comment).collect())
    }

    async fn recent_comments(&self, limit: u64) -> AppResult<Vec<Comment>> {
        let params = vec![
            ("select", COMMENT_COLUMNS.to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        let rows: Vec<TargetRow> = self.select("comments", None, params).await?;
        Ok(rows.into_iter().filter_map(TargetRow::into_comment).collect())
    }

    async fn insert_comment(
        &self,
        owner: &Identity,
        target: EntityRef,
        content: &str,
    ) -> AppResult<Comment> {
        let row: TargetRow = self
            .insert("comments", owner, &NewTargetRow::new(owner, target, Some(content)))
            .await?;
        row.into_comment().ok_or_else(|| AppError::Remote {
            status: 201,
            message: "inserted comment has no single target".to_string(),
        })
    }

    async fn delete_comment(&self, owner: &Identity, id: Uuid) -> AppResult<u64> {
        let params = vec![("id", eq(id)), ("user_id", eq(owner.user_id))];
        self.mutate(Method::DELETE, "comments", owner, params, None).await
    }

    async fn count_comments(&self, owner: &Identity) -> AppResult<u64> {
        let params = vec![("select", "id".to_string()), ("user_id", eq(owner.user_id))];
        self.count("comments", owner, params).await
    }

    async fn profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        let params = vec![("select", PROFILE_COLUMNS.to_string()), ("user_id", eq(user_id))];
        self.select_one("profiles", params).await
    }

    async fn profiles(&self, user_ids: &[Uuid]) -> AppResult<Vec<Profile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let params =
            vec![("select", PROFILE_COLUMNS.to_string()), ("user_id", in_list(user_ids))];
        self.select("profiles", None, params).await
    }

    async fn update_profile(&self, owner: &Identity, profile: &Profile) -> AppResult<u64> {
        let body = json!({
            "username": profile.username,
            "full_name": profile.full_name,
            "bio": profile.bio,
            "favorite_genre": profile.favorite_genre,
            "avatar_url": profile.avatar_url,
        });
        let params = vec![("user_id", eq(owner.user_id))];
        self.mutate(Method::PATCH, "profiles", owner, params, Some(body)).await
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

#[async_trait]
impl AuthService for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> AppResult<Identity> {
        let body = json!({ "email": email, "password": password });
        let token: TokenResponse =
            self.auth_call("token?grant_type=password", None, body).await?.json().await?;
        Ok(Identity {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
            access_token: token.access_token,
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> AppResult<Option<Identity>> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        });
        let value: serde_json::Value = self.auth_call("signup", None, body).await?.json().await?;

        // With email confirmation enabled GoTrue returns the bare user and no session.
        if value.get("access_token").is_none() {
            return Ok(None);
        }
        let token: TokenResponse = serde_json::from_value(value)?;
        Ok(Some(Identity {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
            access_token: token.access_token,
        }))
    }

    async fn sign_out(&self, identity: &Identity) -> AppResult<()> {
        self.auth_call("logout", Some(&identity.access_token), json!({})).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_search_needle() {
        assert_eq!(
            imatch_any(&["title", "genre"], "tom"),
            r#"(title.imatch."tom",genre.imatch."tom")"#
        );
        assert_eq!(imatch_any(&["title"], r#"a"b,(c)"#), r#"(title.imatch."a\"b,\\(c\\)")"#);
    }

    #[test]
    fn search_needle_wildcards_are_literal() {
        assert_eq!(regex_literal("50%_off*"), r"50%_off\*");
        assert_eq!(regex_literal(r"a.b\c"), r"a\.b\\c");
        assert_eq!(imatch_any(&["name"], "*"), r#"(name.imatch."\\*")"#);
    }

    #[test]
    fn builds_membership_filter() {
        let a = Uuid::nil();
        let b = Uuid::max();
        assert_eq!(
            in_list(&[a, b]),
            "in.(00000000-0000-0000-0000-000000000000,ffffffff-ffff-ffff-ffff-ffffffffffff)"
        );
    }

    #[test]
    fn reads_error_messages() {
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(
            error_message(r#"{"code":422,"msg":"User already registered"}"#).as_deref(),
            Some("User already registered")
        );
        assert_eq!(error_message("not json"), None);
    }

    #[test]
    fn reads_content_range_total() {
        assert_eq!(parse_content_range_total(&HeaderValue::from_static("0-9/42")), Some(42));
        assert_eq!(parse_content_range_total(&HeaderValue::from_static("*/0")), Some(0));
        assert_eq!(parse_content_range_total(&HeaderValue::from_static("*/*")), None);
    }

    #[test]
    fn rows_with_two_targets_are_dropped() {
        let row = TargetRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            celebrity_id: Some(Uuid::new_v4()),
            film_id: Some(Uuid::new_v4()),
            content: None,
            created_at: None,
        };
        assert!(row.into_favorite().is_none());
    }
}
