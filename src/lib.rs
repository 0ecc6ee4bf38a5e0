pub mod admin_app;
pub mod app;
pub mod assets;
pub mod config;
pub mod data_uri;
pub mod db;
pub mod editor;
pub mod error;
pub mod models;
pub mod record_store;
pub mod textures;
pub mod video_links;
pub mod viewer;
