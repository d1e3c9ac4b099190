//! Backend bus

use std::{fmt::Debug, sync::Arc};

use futures::future::BoxFuture;
use hiro_backend_model::bus::{BackendBusMessage, DispatchBusMessage};

use crate::{Result, redis::RedisService};

pub trait BackendBusService
where
	Self: Send + Sync + Debug,
{
	fn broadcast(&self, message: BackendBusMessage) -> BoxFuture<'_, Result<()>>;
	fn dispatch(&self, message: DispatchBusMessage) -> BoxFuture<'_, Result<()>>;
}

pub type BoxedBusService = Box<dyn BackendBusService + 'static>;

pub trait BackendBusFactory {
	fn construct(self, redis: Arc<RedisService>) -> BoxFuture<'static, Result<BoxedBusService>>;
}

pub const BACKEND_BUS_CHANNEL: &str = "bus:backend";
pub const BACKEND_BUS_DISPATCH_CHANNEL: &str = "bus:dispatch";

/// A bus that drops all messages, for tests and one-shot tools.
#[derive(Debug, Default)]
pub struct NullBusService;

impl BackendBusService for NullBusService {
	fn broadcast(&self, _message: BackendBusMessage) -> BoxFuture<'_, Result<()>> {
		Box::pin(async { Ok(()) })
	}

	fn dispatch(&self, _message: DispatchBusMessage) -> BoxFuture<'_, Result<()>> {
		Box::pin(async { Ok(()) })
	}
}
