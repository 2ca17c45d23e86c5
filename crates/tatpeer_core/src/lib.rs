pub mod config;
pub mod error;
pub mod history;
pub mod messages;
pub mod peer_id;
pub mod pieces;

pub use error::{Error, Result};
pub use peer_id::PeerId;
pub use pieces::PieceIndex;
