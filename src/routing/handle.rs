pub mod pages;
pub mod auth;
pub mod admin;
