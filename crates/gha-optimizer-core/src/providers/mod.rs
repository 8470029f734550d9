pub mod github_api;
