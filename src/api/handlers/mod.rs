pub mod admin;
pub mod assignments;
pub mod auth;
pub mod catalog;
pub mod class_subjects;
pub mod classes;
pub mod core;
pub mod dashboards;
pub mod exports;
pub mod grading;
pub mod navigation;
pub mod notifications;
pub mod parents;
pub mod subjects;
pub mod submissions;
