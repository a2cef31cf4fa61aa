// HTTP server layer

pub mod app;
pub mod routes;

pub use app::{build_app, build_engine, AxumAppState};
