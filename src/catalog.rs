//! Catalog reads: list views with local filtering and sorting, detail pages
//! assembled from two remote reads, and the search fan-out.

use std::{
    cmp::{Ordering, Reverse},
    collections::HashMap,
};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        CastLink, CastMember, Celebrity, CelebrityDetail, Credit, Featured, Film, FilmDetail,
        SearchResults,
    },
    remote::{DataService, FilmOrder},
};

/// Category value that disables category filtering.
pub const ALL: &str = "all";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilmSort {
    #[default]
    Rating,
    Year,
    Title,
}

/// A record that can be shown in a filterable list.
pub trait Listed: Clone {
    type Sort: Copy + Default + std::fmt::Debug;

    /// Fields searched by the free-text filter.
    fn text_fields(&self) -> [Option<&str>; 2];

    /// Field compared against the category filter.
    fn category(&self) -> Option<&str>;

    fn compare(a: &Self, b: &Self, sort: Self::Sort) -> Ordering;
}

impl Listed for Celebrity {
    type Sort = ();

    fn text_fields(&self) -> [Option<&str>; 2] {
        [Some(&self.name), self.known_for.as_deref()]
    }

    fn category(&self) -> Option<&str> {
        self.nationality.as_deref()
    }

    fn compare(_: &Self, _: &Self, _: ()) -> Ordering {
        Ordering::Equal
    }
}

impl Listed for Film {
    type Sort = FilmSort;

    fn text_fields(&self) -> [Option<&str>; 2] {
        [Some(&self.title), self.genre.as_deref()]
    }

    fn category(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    fn compare(a: &Self, b: &Self, sort: FilmSort) -> Ordering {
        match sort {
            FilmSort::Rating => b.rating.unwrap_or(0.0).total_cmp(&a.rating.unwrap_or(0.0)),
            FilmSort::Year => b.release_year.unwrap_or(0).cmp(&a.release_year.unwrap_or(0)),
            FilmSort::Title => a.title.cmp(&b.title),
        }
    }
}

/// Case-insensitive substring match against any of the record's text fields.
/// An empty query matches everything.
pub fn matches_query<T: Listed>(item: &T, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let query = query.to_lowercase();
    item.text_fields().into_iter().flatten().any(|field| field.to_lowercase().contains(&query))
}

pub fn matches_category<T: Listed>(item: &T, category: &str) -> bool {
    category == ALL || item.category() == Some(category)
}

pub fn sort_films(films: &mut [Film], sort: FilmSort) {
    films.sort_by(|a, b| Film::compare(a, b, sort));
}

/// Distinct non-empty categories in first-seen order.
pub fn categories<T: Listed>(items: &[T]) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for category in items.iter().filter_map(Listed::category) {
        if !category.is_empty() && !seen.iter().any(|c| c == category) {
            seen.push(category.to_string());
        }
    }
    seen
}

/// A list fetched once, with a derived view recomputed whenever the query,
/// category or sort changes.
#[derive(Clone, Debug)]
pub struct ListView<T: Listed> {
    all: Vec<T>,
    categories: Vec<String>,
    query: String,
    category: String,
    sort: T::Sort,
    view: Vec<T>,
}

impl<T: Listed> ListView<T> {
    pub fn new(all: Vec<T>) -> Self {
        let categories = categories(&all);
        let mut list = Self {
            view: Vec::new(),
            all,
            categories,
            query: String::new(),
            category: ALL.to_string(),
            sort: T::Sort::default(),
        };
        list.recompute();
        list
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.recompute();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
        self.recompute();
    }

    pub fn set_sort(&mut self, sort: T::Sort) {
        self.sort = sort;
        self.recompute();
    }

    pub fn all(&self) -> &[T] {
        &self.all
    }

    pub fn view(&self) -> &[T] {
        &self.view
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    fn recompute(&mut self) {
        let mut view: Vec<T> = self
            .all
            .iter()
            .filter(|item| matches_query(*item, &self.query))
            .filter(|item| matches_category(*item, &self.category))
            .cloned()
            .collect();
        view.sort_by(|a, b| T::compare(a, b, self.sort));
        self.view = view;
    }
}

pub async fn load_celebrities(data: &dyn DataService) -> AppResult<ListView<Celebrity>> {
    let all = data.celebrities(None).await?;
    debug!(count = all.len(), "loaded celebrities");
    Ok(ListView::new(all))
}

pub async fn load_films(data: &dyn DataService) -> AppResult<ListView<Film>> {
    let all = data.films(FilmOrder::Natural, None).await?;
    debug!(count = all.len(), "loaded films");
    Ok(ListView::new(all))
}

/// Runs the celebrity and film searches side by side. A blank query returns
/// nothing without touching the remote service.
pub async fn search(data: &dyn DataService, query: &str, limit: u64) -> AppResult<SearchResults> {
    let needle = query.trim();
    if needle.is_empty() {
        return Ok(SearchResults::default());
    }

    let (celebrities, films) = futures::try_join!(
        data.search_celebrities(needle, limit),
        data.search_films(needle, limit)
    )?;

    let results = SearchResults { query: needle.to_string(), celebrities, films };
    debug!(query = needle, total = results.total(), "search completed");
    Ok(results)
}

pub async fn featured(data: &dyn DataService, limit: u64) -> AppResult<Featured> {
    let (celebrities, top_rated) = futures::try_join!(
        data.celebrities(Some(limit)),
        data.films(FilmOrder::RatingDesc, Some(limit))
    )?;
    Ok(Featured { celebrities, top_rated })
}

/// Joins cast links to their films; links whose film is missing are
/// dropped. Newest release first, unknown years last.
pub fn join_filmography(links: Vec<CastLink>, films: &HashMap<Uuid, Film>) -> Vec<Credit> {
    let mut credits: Vec<Credit> = links
        .into_iter()
        .filter_map(|link| {
            let film = films.get(&link.film_id)?.clone();
            Some(Credit { film, role_name: link.role_name, is_lead: link.is_lead })
        })
        .collect();
    credits.sort_by_key(|c| Reverse(c.film.release_year.unwrap_or(0)));
    credits
}

/// Joins cast links to their celebrities; links whose celebrity is missing
/// are dropped. Leads first, otherwise in link order.
pub fn join_cast(links: Vec<CastLink>, celebrities: &HashMap<Uuid, Celebrity>) -> Vec<CastMember> {
    let mut cast: Vec<CastMember> = links
        .into_iter()
        .filter_map(|link| {
            let celebrity = celebrities.get(&link.celebrity_id)?.clone();
            Some(CastMember { celebrity, role_name: link.role_name, is_lead: link.is_lead })
        })
        .collect();
    cast.sort_by_key(|m| !m.is_lead);
    cast
}

pub async fn celebrity_detail(
    data: &dyn DataService,
    id: Uuid,
) -> AppResult<Option<CelebrityDetail>> {
    let Some(celebrity) = data.celebrity(id).await? else {
        return Ok(None);
    };

    let links = data.cast_for_celebrity(id).await?;
    let film_ids: Vec<Uuid> = links.iter().map(|l| l.film_id).collect();
    let films = index_by_id(data.films_by_ids(&film_ids).await?, |f| f.id);

    let filmography = join_filmography(links, &films);
    debug!(celebrity_id = %id, credits = filmography.len(), "loaded filmography");
    Ok(Some(CelebrityDetail { celebrity, filmography }))
}

pub async fn film_detail(data: &dyn DataService, id: Uuid) -> AppResult<Option<FilmDetail>> {
    let Some(film) = data.film(id).await? else {
        return Ok(None);
    };

    let links = data.cast_for_film(id).await?;
    let celebrity_ids: Vec<Uuid> = links.iter().map(|l| l.celebrity_id).collect();
    let celebrities = index_by_id(data.celebrities_by_ids(&celebrity_ids).await?, |c| c.id);

    let cast = join_cast(links, &celebrities);
    debug!(film_id = %id, cast = cast.len(), "loaded cast");
    Ok(Some(FilmDetail { film, cast }))
}

pub(crate) fn index_by_id<T>(rows: Vec<T>, id: impl Fn(&T) -> Uuid) -> HashMap<Uuid, T> {
    rows.into_iter().map(|row| (id(&row), row)).collect()
}
