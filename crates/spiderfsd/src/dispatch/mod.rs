//! JSONL request dispatch over standard input and output.
//!
//! ## Protocol
//!
//! Each request is one JSON object on one line:
//!
//! ```json
//! {"id":1,"tool":"read_range","arguments":{"path":"src/lib.rs","line_start":1,"line_end":20}}
//! ```
//!
//! Every response line echoes the request `id` and carries a `status`:
//!
//! ```json
//! {"status":"ok","id":1,"result":{"lines":["..."],"metadata":{"total_lines":120}}}
//! {"status":"error","id":2,"error":{"kind":"write_failed","message":"...","restored":true}}
//! ```
//!
//! Streaming tools (`stream_lines`, `stream_bytes`) answer with one
//! `{"status":"chunk","chunk":...}` line per chunk followed by a final `ok`
//! line whose result counts the chunks. A failure mid-stream ends the
//! request with an `error` line instead.
//!
//! Lines that are not JSON objects, or that exceed [`MAX_REQUEST_BYTES`],
//! are answered with a `validation_error` under a `null` id and the server
//! moves on to the next line.

mod errors;
mod handlers;
mod request;
mod response;
mod router;
mod server;

pub use self::errors::DispatchError;
pub use self::handlers::ToolContext;
pub use self::request::ToolRequest;
pub use self::response::{ErrorBody, ResponseWriter, ToolResponse};
pub use self::router::{Tool, ToolRouter};
pub use self::server::{MAX_REQUEST_BYTES, Server};
