//! Domain model (statuses, types, ids, nodes, errors).
//!
//! Nothing here performs I/O or knows about trees as a whole; see
//! [`crate::tree`] for the arena that owns nodes.

pub mod errors;
pub mod ids;
pub mod node;
pub mod result_type;
pub mod status;

pub use self::errors::{ErrorObject, TrackingError};
pub use self::ids::{NodeId, TreeId};
pub use self::node::{ResultNode, StatusOverride};
pub use self::result_type::ResultType;
pub use self::status::ResultStatus;
