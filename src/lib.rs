pub mod commands;
pub mod config;
pub mod drive;
pub mod error_utils;
pub mod filename_utils;
pub mod media;
pub mod oauth;
pub mod twitter;
