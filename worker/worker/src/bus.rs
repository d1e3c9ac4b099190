//! [BackendBusService] implementation for the worker.

use std::sync::{Arc, OnceLock};

use hiro_backend_model::bus::{BackendBusMessage, DispatchBusMessage};
use hiro_backend_service::{
	Result,
	bus::{
		BACKEND_BUS_CHANNEL, BACKEND_BUS_DISPATCH_CHANNEL, BackendBusFactory, BackendBusService,
		BoxedBusService,
	},
	redis::{RedisError, RedisService},
};
use futures::{
	FutureExt, StreamExt,
	future::{BoxFuture, ready},
};
use redis::AsyncCommands;
use tracing::{debug, error, info};

use crate::WorkerServices;

#[derive(Debug)]
pub struct WorkerBusService {
	redis: Arc<RedisService>,
	services: Arc<OnceLock<WorkerServices>>,
}

impl BackendBusService for WorkerBusService {
	fn broadcast(&self, message: BackendBusMessage) -> BoxFuture<'_, Result<()>> {
		async move {
			let message = serde_json::to_string(&message)?;
			let _: () = self
				.redis
				.get()
				.await?
				.publish(BACKEND_BUS_CHANNEL, message.as_str())
				.await
				.map_err(RedisError::RedisError)?;
			Ok(())
		}
		.boxed()
	}

	fn dispatch(&self, message: DispatchBusMessage) -> BoxFuture<'_, Result<()>> {
		// Dispatch messages posted from a worker are handled locally
		// instead of being published to the whole fleet.
		async move {
			if let Some(services) = self.services.get() {
				if let Err(error) = process_dispatch_message(message, services).await {
					error!(%error, "failed to handle local-looped dispatch bus message");
				}
			}
			Ok(())
		}
		.boxed()
	}
}

pub struct WorkerBusFactory(pub Arc<OnceLock<WorkerServices>>);

impl BackendBusFactory for WorkerBusFactory {
	fn construct(self, redis: Arc<RedisService>) -> BoxFuture<'static, Result<BoxedBusService>> {
		ready(Ok(Box::new(WorkerBusService {
			redis,
			services: self.0,
		}) as Box<dyn BackendBusService>))
		.boxed()
	}
}

pub async fn handle_bus_message(services: WorkerServices) {
	let client = services.backend.redis.make_client().await.unwrap();
	let mut pubsub = client.get_async_pubsub().await.unwrap();
	pubsub.subscribe(BACKEND_BUS_CHANNEL).await.unwrap();
	pubsub.subscribe(BACKEND_BUS_DISPATCH_CHANNEL).await.unwrap();
	info!("subscribed to backend bus channels");
	while let Some(msg) = pubsub.on_message().next().await {
		let channel = msg.get_channel_name();
		let payload = msg.get_payload::<String>();
		let payload = match payload {
			Ok(value) => value,
			Err(error) => {
				error!(channel, %error, "failed to decode bus message");
				continue;
			}
		};
		match channel {
			BACKEND_BUS_CHANNEL => {
				let result = handle_backend_bus_message(payload, &services).await;
				if let Err(error) = result {
					error!(channel, %error, "failed to handle backend bus message");
				}
			}
			BACKEND_BUS_DISPATCH_CHANNEL => {
				let result = handle_dispatch_bus_message(payload, &services).await;
				if let Err(error) = result {
					error!(channel, %error, "failed to handle dispatch bus message");
				}
			}
			_ => {
				error!(channel, "received bus message from unknown channel");
			}
		}
	}
}

async fn handle_backend_bus_message(
	message: String,
	_services: &WorkerServices,
) -> anyhow::Result<()> {
	let message = serde_json::from_str::<BackendBusMessage>(&message)?;
	debug!(?message, "received backend bus message");
	Ok(())
}

async fn handle_dispatch_bus_message(
	message: String,
	services: &WorkerServices,
) -> anyhow::Result<()> {
	let message = serde_json::from_str::<DispatchBusMessage>(&message)?;
	process_dispatch_message(message, services).await
}

async fn process_dispatch_message(
	message: DispatchBusMessage,
	services: &WorkerServices,
) -> anyhow::Result<()> {
	debug!(?message, "processing dispatch bus message");
	match message {
		DispatchBusMessage::ResumeJobRunner => services.runner.notify_one(),
	}
	Ok(())
}
