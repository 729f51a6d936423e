//! Auxo wire protocol: the plumbing between agents and the broker.
//!
//! ## Architecture
//!
//! - **codec**: MessagePack encoding of [`DiscoveryMessage`] and the
//!   length-prefixed framing shared by every Auxo stream
//! - **endpoint**: `tcp://host:port` addresses with wildcard handling
//! - **shutdown**: the watch-based stop signal every loop selects on
//! - **transport**: [`Router`] (many connections, per-connection identity)
//!   and [`Dealer`] (one outbound connection)
//!
//! [`DiscoveryMessage`]: auxo_types::DiscoveryMessage

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod shutdown;
pub mod transport;

pub use codec::{decode, encode, DecodeError, EncodeError};
pub use endpoint::Endpoint;
pub use error::{BindError, EndpointFailure, WireError};
pub use shutdown::Shutdown;
pub use transport::{Dealer, Identity, Router};
