pub mod account;
pub mod celebrity;
pub mod comment;
pub mod favorite;
pub mod film;
pub mod film_cast;
pub mod profile;
