pub mod desktop;
pub mod history;
pub mod search_path;
