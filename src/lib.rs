pub mod api;
pub mod caption;
pub mod config;
pub mod storage;
pub mod view;
