//! Comment threads on catalog entries and the site-wide feed.
//!
//! Comments are read in two steps: the rows themselves, then the profiles of
//! their distinct authors, merged client-side. A comment whose author has no
//! profile is shown as "Anonymous".

use std::{
    cmp::Reverse,
    collections::{BTreeSet, HashMap},
};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    catalog::index_by_id,
    error::AppResult,
    models::{Author, Comment, CommentView, EntityRef, FeedComment, Profile},
    notice::Notice,
    remote::DataService,
    session::Session,
};

fn distinct_authors(comments: &[Comment]) -> Vec<Uuid> {
    comments.iter().map(|c| c.user_id).collect::<BTreeSet<_>>().into_iter().collect()
}

/// Left-joins comments with author profiles, newest first.
pub fn enrich(comments: Vec<Comment>, profiles: &HashMap<Uuid, Profile>) -> Vec<CommentView> {
    let mut views: Vec<CommentView> = comments
        .into_iter()
        .map(|comment| {
            let author = Author::from_profile(comment.user_id, profiles.get(&comment.user_id));
            let display_name = author.display_name().to_string();
            CommentView { comment, author, display_name }
        })
        .collect();
    views.sort_by_key(|v| Reverse(v.comment.created_at));
    views
}

pub async fn with_authors(
    data: &dyn DataService,
    comments: Vec<Comment>,
) -> AppResult<Vec<CommentView>> {
    let authors = distinct_authors(&comments);
    let profiles = index_by_id(data.profiles(&authors).await?, |p| p.user_id);
    Ok(enrich(comments, &profiles))
}

/// The newest comments across the whole catalog, each labelled with the
/// celebrity or film it was left on.
pub async fn recent_feed(data: &dyn DataService, limit: u64) -> AppResult<Vec<FeedComment>> {
    let comments = data.recent_comments(limit).await?;
    if comments.is_empty() {
        return Ok(Vec::new());
    }

    let authors = distinct_authors(&comments);
    let celebrity_ids: Vec<Uuid> =
        comments.iter().filter_map(|c| c.target.celebrity_id()).collect();
    let film_ids: Vec<Uuid> = comments.iter().filter_map(|c| c.target.film_id()).collect();

    let (profiles, celebrities, films) = futures::try_join!(
        data.profiles(&authors),
        data.celebrities_by_ids(&celebrity_ids),
        data.films_by_ids(&film_ids)
    )?;

    let profiles = index_by_id(profiles, |p| p.user_id);
    let names: HashMap<EntityRef, String> = celebrities
        .into_iter()
        .map(|c| (EntityRef::Celebrity(c.id), c.name))
        .chain(films.into_iter().map(|f| (EntityRef::Film(f.id), f.title)))
        .collect();

    Ok(enrich(comments, &profiles)
        .into_iter()
        .map(|view| {
            let target_name = names.get(&view.comment.target).cloned();
            FeedComment { view, target_name }
        })
        .collect())
}

/// Comments on a single celebrity or film.
#[derive(Debug)]
pub struct CommentThread {
    target: EntityRef,
    comments: Vec<CommentView>,
}

impl CommentThread {
    pub fn new(target: EntityRef) -> Self {
        Self { target, comments: Vec::new() }
    }

    pub fn target(&self) -> EntityRef {
        self.target
    }

    pub fn comments(&self) -> &[CommentView] {
        &self.comments
    }

    /// Reloads the thread. On failure the error is logged and the previous
    /// comments stay in place.
    pub async fn refresh(&mut self, data: &dyn DataService) {
        let result = async {
            let comments = data.comments_for(self.target).await?;
            with_authors(data, comments).await
        }
        .await;

        match result {
            Ok(comments) => {
                debug!(entity = ?self.target, count = comments.len(), "loaded comments");
                self.comments = comments;
            },
            Err(err) => {
                warn!(entity = ?self.target, error = %err, "failed to load comments");
            },
        }
    }

    pub async fn add(&mut self, data: &dyn DataService, session: &Session, content: &str) -> Notice {
        let Some(identity) = session.identity() else {
            return Notice::error("Please sign in to comment");
        };

        let content = content.trim();
        if content.is_empty() {
            return Notice::error("Comment cannot be empty");
        }

        match data.insert_comment(identity, self.target, content).await {
            Ok(comment) => {
                debug!(id = %comment.id, entity = ?self.target, "added comment");
                self.refresh(data).await;
                Notice::success("Comment added")
            },
            Err(err) => {
                warn!(user_id = %identity.user_id, error = %err, "failed to add comment");
                Notice::error("Failed to add comment")
            },
        }
    }

    /// Deletes one of the signed-in user's comments. The remote delete is
    /// scoped to the author, so someone else's comment is never removed.
    pub async fn delete(&mut self, data: &dyn DataService, session: &Session, id: Uuid) -> Notice {
        let Some(identity) = session.identity() else {
            return Notice::error("Please sign in to delete comments");
        };

        match data.delete_comment(identity, id).await {
            Ok(0) => {
                warn!(id = %id, user_id = %identity.user_id, "no comment of this user to delete");
                Notice::error("Failed to delete comment")
            },
            Ok(_) => {
                self.comments.retain(|c| c.comment.id != id);
                Notice::success("Comment deleted")
            },
            Err(err) => {
                warn!(id = %id, error = %err, "failed to delete comment");
                Notice::error("Failed to delete comment")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;

    fn comment(user_id: Uuid, at_second: i64) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            user_id,
            content: format!("posted at {at_second}"),
            created_at: Timestamp::from_second(at_second).unwrap(),
            target: EntityRef::Film(Uuid::nil()),
        }
    }

    #[test]
    fn enrich_orders_newest_first_and_defaults_to_anonymous() {
        let known = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let profiles = index_by_id(
            vec![Profile {
                user_id: known,
                username: Some("cinephile".into()),
                ..Default::default()
            }],
            |p| p.user_id,
        );

        let views = enrich(
            vec![comment(known, 10), comment(stranger, 30), comment(known, 20)],
            &profiles,
        );

        let seconds: Vec<i64> = views.iter().map(|v| v.comment.created_at.as_second()).collect();
        assert_eq!(seconds, [30, 20, 10]);
        assert_eq!(views[0].display_name, "Anonymous");
        assert_eq!(views[0].author.username, None);
        assert_eq!(views[1].display_name, "cinephile");
    }

    #[test]
    fn distinct_authors_deduplicates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let authors = distinct_authors(&[comment(a, 1), comment(b, 2), comment(a, 3)]);
        assert_eq!(authors.len(), 2);
        assert!(authors.contains(&a) && authors.contains(&b));
    }
}
