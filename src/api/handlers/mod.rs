pub mod admin_analytics;
pub mod admin_auth;
pub mod admin_content;
pub mod admin_notifications;
pub mod admin_roster;
pub mod admin_users;
pub mod auth;
pub mod core;
pub mod student;
