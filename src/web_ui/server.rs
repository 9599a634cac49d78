use std::convert::Infallible;
use std::future::Future;
use log::{info, warn};
use warp::{Filter, Reply};
use super::api_routes::{api_routes, ApiState};
use super::config::WebUIConfig;
use super::errors::handle_rejection;
use super::throttle::{throttled, RequestThrottle};

pub struct WebUI {
    state: ApiState,
    web_config: WebUIConfig,
    throttle: RequestThrottle,
}

impl WebUI {
    pub fn new(state: ApiState, web_config: WebUIConfig) -> Self {
        WebUI {
            state,
            web_config,
            throttle: RequestThrottle::default(),
        }
    }

    pub async fn run(
        &self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.web_config.socket_addr()?;
        if !self.web_config.static_dir.is_dir() {
            warn!(
                "Panel directory {} does not exist; only the API will be served",
                self.web_config.static_dir.display()
            );
        }

        let routes = routes(self.state.clone(), &self.web_config, self.throttle.clone());
        let (bound, server) = warp::serve(routes).try_bind_with_graceful_shutdown(addr, shutdown_signal)?;
        info!("Starting web UI server on {}", bound);

        let server_handle = tokio::spawn(server);
        server_handle.await?;

        info!("Web UI server has shut down.");
        Ok(())
    }
}

/// The full filter tree: throttle, API, static panel, CORS, error recovery and request logging.
pub fn routes(
    state: ApiState,
    web_config: &WebUIConfig,
    throttle: RequestThrottle,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let static_files = warp::get().and(warp::fs::dir(web_config.static_dir.clone()));

    throttled(throttle)
        .and(api_routes(state).or(static_files))
        .with(cors(web_config))
        .recover(handle_rejection)
        .with(warp::log::custom(|req| {
            info!("{} {} {}", req.method(), req.path(), req.status().as_u16());
        }))
}

fn cors(web_config: &WebUIConfig) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization"]);

    match &web_config.cors_origin {
        Some(origin) => builder.allow_origin(origin.as_str()),
        None => builder.allow_any_origin(),
    }
}
