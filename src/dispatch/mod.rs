//! Request dispatch.
//!
//! A [`Dispatcher`] runs every logical call through the same pipeline:
//!
//! 1. resolve the base URL and fill `{param}` placeholders in the path
//! 2. reserve the endpoint cost on the throttler
//! 3. sign with the profile's signer for the API type, using a fresh nonce
//! 4. commit the reservation and send
//! 5. classify the response; retry transient kinds with backoff or fail with a
//!    [`ClassifiedError`](crate::error::ClassifiedError)
//!
//! Everything exchange-specific comes from an [`ExchangeProfile`].

mod dispatcher;
mod endpoint;
mod profile;
mod retry;
mod transport;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use endpoint::{ApiRequest, extract_params, implode_params};
pub use profile::{ExchangeProfile, TimeEndpoint};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, RawResponse, Transport, TransportError};
