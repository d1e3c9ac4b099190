use anyhow::Result;
use axum::{Router, routing::get};

use crate::WorkerServices;

pub fn make_router(services: WorkerServices) -> Result<Router> {
	let router = Router::new().route("/", get(handler)).with_state(services);

	Ok(router)
}

async fn handler() -> &'static str {
	concat!("Hiro Worker ", env!("CARGO_PKG_VERSION"))
}
