use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    catalog::{self, FilmSort},
    comments,
    error::{AppError, AppResult},
    favorites::FavoriteEntities,
    models::{
        Celebrity, CelebrityDetail, CommentView, EntityKind, EntityRef, FeedComment, Featured,
        Film, FilmDetail, ProfileUpdate, SearchResults,
    },
    notice::Notice,
    profile::{self, ProfilePage},
    session::{Credentials, Identity, Session},
    state::SharedClient,
};

pub const SESSION_COOKIE: &str = "celebyfilm_session";

/// Finds the registered client named by the session cookie. Unknown or
/// missing cookies yield `None`.
async fn registered(state: &AppState, jar: &CookieJar) -> Option<(Uuid, SharedClient)> {
    let id = jar.get(SESSION_COOKIE)?.value().parse::<Uuid>().ok()?;
    let client = state.clients.get(id).await?;
    Some((id, client))
}

/// The caller's client state; anonymous callers get one that is dropped
/// with the request.
async fn client(state: &AppState, jar: &CookieJar) -> SharedClient {
    match registered(state, jar).await {
        Some((_, client)) => client,
        None => state.clients.ephemeral(),
    }
}

/// Registers a client that just signed in and hands its browser a cookie.
async fn remember(
    state: &AppState,
    jar: CookieJar,
    known: bool,
    client: SharedClient,
    session: &Session,
) -> CookieJar {
    if known || session.identity().is_none() {
        return jar;
    }

    let id = state.clients.register(client).await;
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(state.config.session_ttl_days));
    jar.add(cookie)
}

#[derive(Debug, Serialize)]
pub struct HomePage {
    #[serde(flatten)]
    pub featured: Featured,
    pub recent_comments: Vec<FeedComment>,
}

pub async fn home(State(state): State<Arc<AppState>>) -> AppResult<Json<HomePage>> {
    let data = &*state.data;
    let (featured, recent_comments) = futures::try_join!(
        catalog::featured(data, state.config.featured_limit),
        comments::recent_feed(data, state.config.featured_limit)
    )?;
    Ok(Json(HomePage { featured, recent_comments }))
}

#[derive(Debug, Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub categories: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct CelebrityQuery {
    #[serde(default)]
    q: String,
    nationality: Option<String>,
}

pub async fn celebrities(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CelebrityQuery>,
) -> AppResult<Json<Listing<Celebrity>>> {
    let mut view = catalog::load_celebrities(&*state.data).await?;
    view.set_query(q.q);
    view.set_category(q.nationality.unwrap_or_else(|| catalog::ALL.to_string()));

    Ok(Json(Listing {
        items: view.view().to_vec(),
        categories: view.categories().to_vec(),
        total: view.all().len(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct FilmQuery {
    #[serde(default)]
    q: String,
    genre: Option<String>,
    #[serde(default)]
    sort: FilmSort,
}

pub async fn films(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FilmQuery>,
) -> AppResult<Json<Listing<Film>>> {
    let mut view = catalog::load_films(&*state.data).await?;
    view.set_query(q.q);
    view.set_category(q.genre.unwrap_or_else(|| catalog::ALL.to_string()));
    view.set_sort(q.sort);

    Ok(Json(Listing {
        items: view.view().to_vec(),
        categories: view.categories().to_vec(),
        total: view.all().len(),
    }))
}

#[derive(Debug, Serialize)]
pub struct DetailPage<T> {
    #[serde(flatten)]
    pub detail: T,
    pub is_favorite: bool,
}

async fn is_favorite(state: &AppState, client: &SharedClient, target: EntityRef) -> bool {
    let mut client = client.lock().await;
    client.current_session(&*state.data).await;
    client.favorites.is_favorite(target.id(), target.kind())
}

pub async fn celebrity(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DetailPage<CelebrityDetail>>> {
    let client = client(&state, &jar).await;
    let detail = catalog::celebrity_detail(&*state.data, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Celebrity".to_string()))?;
    let is_favorite = is_favorite(&state, &client, EntityRef::Celebrity(id)).await;
    Ok(Json(DetailPage { detail, is_favorite }))
}

pub async fn film(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DetailPage<FilmDetail>>> {
    let client = client(&state, &jar).await;
    let detail = catalog::film_detail(&*state.data, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Film".to_string()))?;
    let is_favorite = is_favorite(&state, &client, EntityRef::Film(id)).await;
    Ok(Json(DetailPage { detail, is_favorite }))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<SearchResults>> {
    let results = catalog::search(&*state.data, &q.q, state.config.search_limit).await?;
    Ok(Json(results))
}

pub async fn feed(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<FeedComment>>> {
    let feed = comments::recent_feed(&*state.data, state.config.feed_limit).await?;
    Ok(Json(feed))
}

#[derive(Debug, Serialize)]
pub struct ThreadPage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    pub target: EntityRef,
    pub comments: Vec<CommentView>,
}

pub async fn thread(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path((kind, id)): Path<(EntityKind, Uuid)>,
) -> Json<ThreadPage> {
    let client = client(&state, &jar).await;
    let target = EntityRef::new(kind, id);

    let mut client = client.lock().await;
    let thread = client.thread(target);
    thread.refresh(&*state.data).await;
    let comments = thread.comments().to_vec();

    Json(ThreadPage { notice: None, target, comments })
}

#[derive(Debug, Deserialize)]
pub struct NewComment {
    content: String,
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path((kind, id)): Path<(EntityKind, Uuid)>,
    Json(body): Json<NewComment>,
) -> Json<ThreadPage> {
    let client = client(&state, &jar).await;
    let target = EntityRef::new(kind, id);

    let mut client = client.lock().await;
    let session = client.current_session(&*state.data).await;
    let thread = client.thread(target);
    let notice = thread.add(&*state.data, &session, &body.content).await;
    let comments = thread.comments().to_vec();

    Json(ThreadPage { notice: Some(notice), target, comments })
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path((kind, id, comment_id)): Path<(EntityKind, Uuid, Uuid)>,
) -> Json<ThreadPage> {
    let client = client(&state, &jar).await;
    let target = EntityRef::new(kind, id);

    let mut client = client.lock().await;
    let session = client.current_session(&*state.data).await;
    let thread = client.thread(target);
    let notice = thread.delete(&*state.data, &session, comment_id).await;
    let comments = thread.comments().to_vec();

    Json(ThreadPage { notice: Some(notice), target, comments })
}

pub async fn favorites(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> AppResult<Json<FavoriteEntities>> {
    let client = client(&state, &jar).await;

    let mut client = client.lock().await;
    let session = client.current_session(&*state.data).await;
    session.require()?;
    let entities = client.favorites.resolve(&*state.data).await?;

    Ok(Json(entities))
}

#[derive(Debug, Serialize)]
pub struct ToggleResult {
    pub notice: Notice,
    pub is_favorite: bool,
}

pub async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(target): Json<EntityRef>,
) -> Json<ToggleResult> {
    let client = client(&state, &jar).await;

    let mut client = client.lock().await;
    let session = client.current_session(&*state.data).await;
    let notice = client.favorites.toggle(&*state.data, &session, target).await;
    let is_favorite = client.favorites.is_favorite(target.id(), target.kind());

    Json(ToggleResult { notice, is_favorite })
}

pub async fn profile(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> AppResult<Json<ProfilePage>> {
    let client = client(&state, &jar).await;
    let session = client.lock().await.current_session(&*state.data).await;
    let page = profile::load(&*state.data, &session).await?;
    Ok(Json(page))
}

#[derive(Debug, Serialize)]
pub struct NoticeResponse {
    pub notice: Notice,
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(update): Json<ProfileUpdate>,
) -> Json<NoticeResponse> {
    let client = client(&state, &jar).await;
    let session = client.lock().await.current_session(&*state.data).await;
    let notice = profile::update(&*state.data, &session, update).await;
    Json(NoticeResponse { notice })
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    pub identity: Option<Identity>,
}

impl SessionInfo {
    fn new(notice: Option<Notice>, session: &Session) -> Self {
        Self { notice, identity: session.identity().cloned() }
    }
}

pub async fn session(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<SessionInfo> {
    let client = client(&state, &jar).await;
    let session = client.lock().await.current_session(&*state.data).await;
    Json(SessionInfo::new(None, &session))
}

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<Credentials>,
) -> (CookieJar, Json<SessionInfo>) {
    let known = registered(&state, &jar).await;
    let client = known.as_ref().map_or_else(|| state.clients.ephemeral(), |(_, c)| c.clone());

    let mut guard = client.lock().await;
    let notice = guard.session.sign_in(&credentials).await;
    let session = guard.current_session(&*state.data).await;
    drop(guard);

    let jar = remember(&state, jar, known.is_some(), client, &session).await;
    (jar, Json(SessionInfo::new(Some(notice), &session)))
}

pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<Credentials>,
) -> (CookieJar, Json<SessionInfo>) {
    let known = registered(&state, &jar).await;
    let client = known.as_ref().map_or_else(|| state.clients.ephemeral(), |(_, c)| c.clone());

    let mut guard = client.lock().await;
    let notice = guard.session.sign_up(&credentials).await;
    let session = guard.current_session(&*state.data).await;
    drop(guard);

    let jar = remember(&state, jar, known.is_some(), client, &session).await;
    (jar, Json(SessionInfo::new(Some(notice), &session)))
}

/// Signs out and forgets the browser's client state along with its cookie.
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<SessionInfo>) {
    let Some((id, client)) = registered(&state, &jar).await else {
        let client = state.clients.ephemeral();
        let notice = client.lock().await.session.sign_out().await;
        return (jar, Json(SessionInfo::new(Some(notice), &Session::anonymous())));
    };

    let mut guard = client.lock().await;
    let notice = guard.session.sign_out().await;
    let session = guard.current_session(&*state.data).await;
    drop(guard);

    state.clients.remove(id).await;
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(SessionInfo::new(Some(notice), &session)))
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Page".to_string())
}
