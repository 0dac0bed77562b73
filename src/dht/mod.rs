pub mod directory;
pub mod files;
pub mod finger;
pub mod membership;
pub mod peer;
pub mod render;
pub mod routing;
pub mod service;
pub mod state;
