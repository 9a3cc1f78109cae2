pub mod app;
pub mod archive;
pub mod builder;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod http;
pub mod images;
pub mod inaturalist;
pub mod output;
pub mod records;
pub mod render;
pub mod tui;
pub mod wikipedia;
