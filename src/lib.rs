pub mod app;
pub mod calendar;
pub mod config;
pub mod db;
pub mod holidays;
pub mod render;
pub mod sync;
pub mod ui;
