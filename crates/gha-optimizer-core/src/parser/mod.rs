pub mod github;
pub mod model;
