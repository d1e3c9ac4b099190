use anyhow::Result;
use axum::{Router, routing::get};

use crate::WebServices;

pub mod api;

pub fn make_router(services: WebServices) -> Result<Router> {
	let router = Router::new()
		.route("/", get(handler))
		.nest("/api", api::api_router())
		.with_state(services);

	Ok(router)
}

async fn handler() -> &'static str {
	concat!("Hiro Web ", env!("CARGO_PKG_VERSION"))
}
