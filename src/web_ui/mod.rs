mod server;
mod config;
pub mod api_routes;
pub mod errors;
pub mod throttle;

#[cfg(test)]
mod tests;

pub use api_routes::ApiState;
pub use config::WebUIConfig;
pub use server::{routes, WebUI};
