//! Bilingual academic portal: roster-verified registration, token auth and
//! the admin/student surfaces built on one SQLite database.

pub mod analytics;
pub mod api;
pub mod articles;
pub mod backup;
pub mod config;
pub mod cookies;
pub mod db;
pub mod i18n;
pub mod mailer;
pub mod model;
pub mod notifications;
pub mod password;
pub mod rate_limit;
pub mod reset_codes;
pub mod roster;
pub mod roster_import;
pub mod schedule;
pub mod tasks;
pub mod tokens;
pub mod users;
pub mod validate;
