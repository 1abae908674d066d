pub mod app;
pub mod bimap;
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod install;
pub mod platform;
pub mod platforms;
pub mod plugin;
pub mod repository;
pub mod resolve;
pub mod similarity;
pub mod task;
pub mod tasks;
pub mod ui;
pub mod workspace;

pub use app::App;
pub use context::Context;
pub use error::{Error, MultiError, Result};
pub use workspace::Workspace;
