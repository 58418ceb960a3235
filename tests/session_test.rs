mod common;

use std::sync::Arc;

use celebyfilm::{
    error::AppError,
    models::{EntityRef, ProfileUpdate},
    profile,
    remote::AuthService,
    session::{Credentials, Session, SessionContext},
};
use common::PARASITE;

fn credentials(email: &str, password: &str) -> Credentials {
    Credentials { email: email.into(), password: password.into(), full_name: None }
}

#[tokio::test]
async fn test_sign_up_then_sign_in() {
    let store = common::store().await;
    let context = SessionContext::new(store.clone());
    let mut changes = context.subscribe();

    let notice = context.sign_up(&credentials("Ada@Example.com", "secret123")).await;
    assert_eq!(notice.message, "Account created successfully!");
    assert!(changes.has_changed().unwrap());
    assert_eq!(changes.borrow_and_update().identity().unwrap().email, "ada@example.com");

    context.sign_out().await;
    assert_eq!(context.session(), Session::anonymous());

    let notice = context.sign_in(&credentials("ada@example.com", "secret123")).await;
    assert_eq!(notice.message, "Welcome back!");
    assert!(context.session().identity().is_some());
}

#[tokio::test]
async fn test_auth_failures_keep_session_anonymous() {
    let store = common::store().await;
    let context = SessionContext::new(store.clone());
    common::sign_up(&store, "ada@example.com", "").await;

    let notice = context.sign_in(&credentials("ada@example.com", "wrong-password")).await;
    assert!(notice.is_error());
    assert_eq!(notice.message, "Invalid email or password");

    let notice = context.sign_up(&credentials("ada@example.com", "secret123")).await;
    assert_eq!(notice.message, "This email is already registered. Please sign in instead.");

    let notice = context.sign_in(&credentials("not-an-email", "secret123")).await;
    assert_eq!(notice.message, "Please enter a valid email");

    let notice = context.sign_up(&credentials("bob@example.com", "123")).await;
    assert_eq!(notice.message, "Password must be at least 6 characters");

    assert_eq!(context.session(), Session::anonymous());
}

#[tokio::test]
async fn test_sign_out_when_anonymous_is_harmless() {
    let store = common::store().await;
    let auth: Arc<dyn AuthService> = store;
    let context = SessionContext::new(auth);

    let notice = context.sign_out().await;
    assert_eq!(notice.message, "Signed out successfully");
    assert_eq!(context.session(), Session::anonymous());
}

#[tokio::test]
async fn test_profile_requires_sign_in() {
    let store = common::store().await;

    let err = profile::load(&*store, &Session::anonymous()).await.unwrap_err();
    assert!(matches!(err, AppError::NotAuthenticated));

    let notice = profile::update(&*store, &Session::anonymous(), ProfileUpdate::default()).await;
    assert_eq!(notice.message, "Please sign in to edit your profile");
}

#[tokio::test]
async fn test_profile_update_and_stats() {
    let store = common::store().await;
    let identity = common::sign_up(&store, "ada@example.com", "Ada Lovelace").await;
    let session = Session::signed_in(identity.clone());

    let page = profile::load(&*store, &session).await.unwrap();
    assert_eq!(page.email, "ada@example.com");
    assert_eq!(page.profile.unwrap().full_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(page.stats.favorites, 0);

    let notice = profile::update(
        &*store,
        &session,
        ProfileUpdate {
            username: "  countess ".into(),
            full_name: "Ada King".into(),
            favorite_genre: "Thriller".into(),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(notice.message, "Profile updated successfully!");

    let mut favorites = celebyfilm::favorites::Favorites::new();
    favorites.toggle(&*store, &session, EntityRef::Film(PARASITE)).await;
    let mut thread = celebyfilm::comments::CommentThread::new(EntityRef::Film(PARASITE));
    thread.add(&*store, &session, "Masterpiece").await;
    thread.add(&*store, &session, "Saw it again").await;

    let page = profile::load(&*store, &session).await.unwrap();
    let profile = page.profile.unwrap();
    assert_eq!(profile.username.as_deref(), Some("countess"));
    assert_eq!(profile.full_name.as_deref(), Some("Ada King"));
    assert_eq!(profile.bio, None);
    assert_eq!(page.stats.favorites, 1);
    assert_eq!(page.stats.comments, 2);
    assert_eq!(thread.comments()[0].display_name, "Ada King");
}

#[tokio::test]
async fn test_passwords_are_stored_as_bcrypt_hashes() {
    use celebyfilm::entities::account;
    use sea_orm::EntityTrait;

    let store = common::store().await;
    let ada = common::sign_up(&store, "ada@example.com", "").await;
    common::sign_up(&store, "bob@example.com", "").await;

    let rows = account::Entity::find().all(store.db()).await.unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert!(row.password_digest.starts_with("$2"));
        assert!(!row.password_digest.contains("secret123"));
    }
    // Same password, different salts.
    assert_ne!(rows[0].password_digest, rows[1].password_digest);

    let ada_row = rows.iter().find(|r| r.user_id == ada.user_id).unwrap();
    assert!(bcrypt::verify("secret123", &ada_row.password_digest).unwrap());
    assert!(!bcrypt::verify("secret124", &ada_row.password_digest).unwrap());
}
