use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    error::AppResult,
    models::{ActivityStats, Profile, ProfileUpdate},
    notice::Notice,
    remote::DataService,
    session::Session,
};

#[derive(Debug, Serialize)]
pub struct ProfilePage {
    pub email: String,
    pub profile: Option<Profile>,
    pub stats: ActivityStats,
}

pub async fn load(data: &dyn DataService, session: &Session) -> AppResult<ProfilePage> {
    let identity = session.require()?;

    let profile = data.profile(identity.user_id).await?;
    let (favorites, comments) = futures::try_join!(
        data.count_favorites(identity),
        data.count_comments(identity)
    )?;

    Ok(ProfilePage {
        email: identity.email.clone(),
        profile,
        stats: ActivityStats { favorites, comments },
    })
}

pub async fn update(data: &dyn DataService, session: &Session, update: ProfileUpdate) -> Notice {
    let Some(identity) = session.identity() else {
        return Notice::error("Please sign in to edit your profile");
    };

    let profile = update.into_profile(identity.user_id);
    match data.update_profile(identity, &profile).await {
        Ok(0) => {
            warn!(user_id = %identity.user_id, "no profile row to update");
            Notice::error("Failed to update profile")
        },
        Ok(_) => {
            debug!(user_id = %identity.user_id, "updated profile");
            Notice::success("Profile updated successfully!")
        },
        Err(err) => {
            warn!(user_id = %identity.user_id, error = %err, "failed to update profile");
            Notice::error("Failed to update profile")
        },
    }
}
