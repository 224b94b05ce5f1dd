pub mod app;
pub mod config;
pub mod error;
pub mod api {
    pub mod errors;
    pub mod pages;
}
pub mod auth {
    pub mod authorizer;
    pub mod middleware;
    pub mod models;
}
pub mod db {
    pub mod page_repository;
}
pub mod models {
    pub mod content;
    pub mod page;
    pub mod templates;
}
pub mod storage {
    pub mod file_store;
}
pub mod sync {
    pub mod engine;
    pub mod throttle;
}
