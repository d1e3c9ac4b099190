//! Backend bus

use serde::{Deserialize, Serialize};

use crate::job::JobRef;

/// A backend bus message that can be broadcasted across the backend bus.
///
/// Backend bus messages are received by all server and worker
/// instances listening on the bus.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub enum BackendBusMessage {
	/// A test job reached a terminal state.
	JobFinished { job: JobRef },
}

/// A bus message from the web server to the worker fleet.
///
/// Not all worker instances will receive a posted dispatch message.
/// When a dispatch message is posted from a worker instance, it is
/// handled locally and not published to other instances.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub enum DispatchBusMessage {
	/// Wake a parked job runner so it re-polls the pending queue.
	ResumeJobRunner,
}
