pub mod config;
pub mod project;

pub use config::TetherConfig;
pub use project::TetherProject;
