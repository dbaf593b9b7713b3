pub mod dispatcher;
pub mod error;
pub mod history;
pub mod message;

pub use dispatcher::{handler_fn, Dispatcher, MethodHandler};
pub use error::RpcError;
pub use history::{BoundedHistory, HistoryEntry};
pub use message::{ErrorResponse, Reply, Request, Response, SuccessResponse, JSONRPC_VERSION};
