pub mod app;
pub mod bot;
pub mod config;
pub mod logging;
pub mod pages;
pub mod registration;
pub mod state;
pub mod web;
