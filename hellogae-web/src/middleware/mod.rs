//! Middlewares specific to hellogae.

mod app_engine;

pub use self::app_engine::AppEngineEntry;
