pub mod database;
pub mod media_host;
pub mod post_service;
pub mod staging;
