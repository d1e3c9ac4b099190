//! [BackendBusService] implementation for the web server.

use std::sync::Arc;

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

use crate::WebServices;

/// Publishes both message classes over Redis; the worker fleet does
/// the actual job execution.
#[derive(Debug)]
pub struct WebBusService {
	redis: Arc<RedisService>,
}

impl BackendBusService for WebBusService {
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
		async move {
			let message = serde_json::to_string(&message)?;
			let _: () = self
				.redis
				.get()
				.await?
				.publish(BACKEND_BUS_DISPATCH_CHANNEL, message.as_str())
				.await
				.map_err(RedisError::RedisError)?;
			Ok(())
		}
		.boxed()
	}
}

pub struct WebBusFactory;

impl BackendBusFactory for WebBusFactory {
	fn construct(self, redis: Arc<RedisService>) -> BoxFuture<'static, Result<BoxedBusService>> {
		ready(Ok(
			Box::new(WebBusService { redis }) as Box<dyn BackendBusService>
		))
		.boxed()
	}
}

pub async fn handle_bus_message(services: WebServices) {
	let client = services.backend.redis.make_client().await.unwrap();
	let mut pubsub = client.get_async_pubsub().await.unwrap();
	pubsub.subscribe(BACKEND_BUS_CHANNEL).await.unwrap();
	info!("subscribed to backend bus channel");
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
			_ => {
				error!(channel, "received bus message from unknown channel");
			}
		}
	}
}

async fn handle_backend_bus_message(
	message: String,
	_services: &WebServices,
) -> anyhow::Result<()> {
	let message = serde_json::from_str::<BackendBusMessage>(&message)?;
	debug!(?message, "received backend bus message");
	Ok(())
}
