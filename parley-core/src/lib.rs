pub mod ai;
pub mod bus;
pub mod config;
pub mod db;
pub mod encoding;
pub mod error;
pub mod models;
pub mod queue;

pub use ai::{AiError, AiFallbackRequest, AiResponder, HttpAiResponder};
pub use bus::{BusError, HttpMessageBus, MessageBus};
pub use config::ParleyConfig;
pub use error::ParleyError;
pub use queue::{HttpQueueTrigger, QueueError, QueueTrigger};
