pub mod models;
pub mod placeholder;
