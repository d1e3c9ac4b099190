use std::{
	fs,
	path::PathBuf,
	sync::{Arc, OnceLock},
};

use anyhow::{Result, bail};
use bus::WorkerBusFactory;
use clap::Parser;
use config::WorkerConfig;
use hiro_backend_service::{BackendServices, bus::BackendBusFactory, bus::BoxedBusService};
use hiro_jobrunner::JobRunner;
use tokio::net::{TcpListener, UnixListener};
use tracing::info;

mod bus;
mod config;
mod routes;

#[derive(clap::Parser)]
struct Args {
	#[arg(short, long, default_value = "hiro-worker.toml")]
	config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	tracing::subscriber::set_global_default(
		tracing_subscriber::FmtSubscriber::builder()
			.with_max_level(tracing::Level::INFO)
			.finish(),
	)?;

	let config_path = &args.config;
	let config = toml::from_str::<WorkerConfig>(&fs::read_to_string(config_path)?)?;
	info!("loaded configuration from file: {:?}", config_path);

	info!("initializing backend services ...");
	let services_ref = Arc::new(OnceLock::new());
	let backend_services = Arc::new(BackendServices::new(config.clone().try_into()?).await?);
	let bus = Arc::new(
		WorkerBusFactory(services_ref.clone())
			.construct(backend_services.redis.clone())
			.await?,
	);
	info!("initializing runner service ...");
	let runner = JobRunner::new(backend_services.clone(), bus.clone())?;
	let services = WorkerServices {
		config: Arc::new(config),
		backend: backend_services,
		bus,
		runner: Arc::new(runner),
	};
	services_ref.set(services.clone()).unwrap();

	tokio::spawn(bus::handle_bus_message(services.clone()));
	for i in 0..services.config.runners.max(1) {
		tokio::spawn(services.runner.clone().run(i));
	}
	tokio::spawn(services.runner.clone().run_watcher());

	let listen_addr = services.config.http.listen.clone();
	let router = routes::make_router(services)?;
	if let Some(path) = listen_addr.strip_prefix("unix://") {
		let path = PathBuf::from(path);
		_ = fs::remove_file(&path);
		fs::create_dir_all(path.parent().unwrap())?;

		let listener = UnixListener::bind(&path)?;
		info!("listening on UDS: {:?}", path);
		axum::serve(listener, router).await?;
	} else if let Some(addr) = listen_addr.strip_prefix("tcp://") {
		let listener = TcpListener::bind(addr).await?;
		info!("listening on TCP {}", listener.local_addr()?);
		axum::serve(listener, router).await.unwrap();
	} else {
		bail!("unsupported http.listen schema")
	}

	Ok(())
}

#[derive(Debug, Clone)]
pub struct WorkerServices {
	pub config: Arc<WorkerConfig>,
	pub backend: Arc<BackendServices>,
	pub bus: Arc<BoxedBusService>,
	pub runner: Arc<JobRunner>,
}
