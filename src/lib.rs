//! # Ubersmith - A client for the Ubersmith billing API
//!
//! Ubersmith exposes a single HTTP endpoint that takes the method name as a
//! query parameter (`?method=client.get`) and the arguments as a form body.
//! Replies are wrapped in an envelope (`status`, `error_code`,
//! `error_message`, `data`), unless the method returns a file.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ubersmith::{Call, Cleaner, Params, RequestHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ubersmith::Error> {
//!     let handler = RequestHandler::builder()
//!         .base_url("https://billing.example.com/api/2.0/")?
//!         .credentials("admin", "secret")
//!         .connect()
//!         .await?;
//!
//!     let client_get = Call::new("client.get")
//!         .require_any(["client_id", "user_login"])
//!         .cleaner(
//!             Cleaner::fields()
//!                 .field("clientid", Cleaner::Int)
//!                 .field("balance", Cleaner::Decimal)
//!                 .field("created", Cleaner::Timestamp),
//!         );
//!
//!     let client = client_get
//!         .render(&handler, Some(&Params::new().with("client_id", 50)))
//!         .await?;
//!     println!("Client: {}", client);
//!     println!("Took {} attempt(s)", client.attempts());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Method discovery** - the handler refuses methods the server did not list
//! - **Token-update retries** - the "Updating Token" page is retried on a schedule
//! - **Error classification** - maintenance, API errors and HTTP errors stay distinct
//! - **Typed responses** - maps, integers and files get their own wrappers
//! - **Value cleaning** - string fields become integers, decimals, booleans and timestamps
//! - **Method indexes** - version-pinned call metadata, generated from a live server
//!
//! ## Error Handling
//!
//! ```no_run
//! use ubersmith::{Error, Params, RequestHandler};
//!
//! # async fn example(handler: RequestHandler) -> Result<(), Error> {
//! match handler.process_request("client.get", Some(&Params::new().with("client_id", 1))).await {
//!     Ok(response) => println!("Data: {}", response.data()?),
//!     Err(Error::Maintenance(_)) => eprintln!("Ubersmith is down for maintenance"),
//!     Err(Error::Response(envelope)) => {
//!         eprintln!("Error {:?}: {}", envelope.error_code, envelope.error_message);
//!     }
//!     Err(Error::UpdatingToken { attempts }) => {
//!         eprintln!("Still updating its token after {} attempts", attempts);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

mod call;
pub mod coerce;
mod config;
mod context;
mod error;
mod handler;
mod index;
mod params;
mod response;
pub mod retry;
mod value;

pub use call::{BoundCall, BoundModule, Call, Registry, Required};
pub use coerce::Cleaner;
pub use config::Config;
pub use context::Context;
pub use error::{Error, ErrorKind, Result};
pub use handler::{RequestHandler, RequestHandlerBuilder, METHOD_GET, METHOD_LIST, SYSTEM_INFO};
pub use index::{GenerateOptions, IndexData, MethodIndex, MethodInfo};
pub use params::{EncodedParams, FilePart, Param, Params};
pub use response::{
    BaseResponse, Envelope, FilePayload, FileResponse, IntResponse, MapResponse, RawResponse,
    Response, TypedResponse, MAINTENANCE_MESSAGE,
};
pub use retry::RetryStrategy;
pub use value::{Map, Value};
