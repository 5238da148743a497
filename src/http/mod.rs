//! HTTP protocol implementation.
//!
//! A small HTTP/1.1 adapter with keep-alive support in front of the kernel.
//!
//! # Architecture
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: The main connection handler implementing the request-response state machine
//! - **`parser`**: Parses incoming HTTP requests from byte buffers
//! - **`request`**: Immutable request snapshot with typed accessors
//! - **`response`**: Response model, factories and redirect checks
//! - **`writer`**: Writes in-memory, file and event-stream bodies to the client
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! Each client connection goes through a state machine:
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Session read, pipeline, session write
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```
//!
//! Each parsed request is handed to [`crate::app::App::serve`]. Redirect,
//! file and event-stream responses close the connection after writing;
//! `HEAD` responses go out without a body.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keel::App;
//! use keel::config::Config;
//! use keel::http::connection::Connection;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let app = Arc::new(App::new(Config::default()));
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!
//!     loop {
//!         let (socket, peer) = listener.accept().await?;
//!         let app = Arc::clone(&app);
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(socket, peer, app);
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod request;
pub mod response;
pub mod parser;
pub mod connection;
pub mod writer;
pub mod mime;
