pub mod allocator;
pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod normalize;
pub mod redirect;
pub mod storage;
