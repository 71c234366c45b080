pub mod agent;
pub mod config;
pub mod context;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod store;
pub mod tools;
pub mod trace;
