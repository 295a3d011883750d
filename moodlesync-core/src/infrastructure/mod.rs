// moodlesync-core/src/infrastructure/mod.rs

pub mod config;
pub mod error;
pub mod moodle;
pub mod sheets;
