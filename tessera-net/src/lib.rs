pub mod codec;
pub mod error;
pub mod node;
pub mod peer;
pub mod sync;

pub use error::NetError;
pub use node::Node;
pub use peer::Peer;
pub use sync::{BlockValidator, Syncer};
