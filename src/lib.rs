pub mod artifact;
pub mod auth;
pub mod config;
pub mod drive;
pub mod inspect;
pub mod logging;
pub mod records;
pub mod sync;
