//! Photo and video feed API: uploads go to an external media host, post
//! metadata lives in SQLite, and the feed lists posts newest first.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
