//! Domain layer: value objects, entities, events and the seams the
//! infrastructure layer implements.

pub mod broadcast;
pub mod entity;
pub mod error;
pub mod event;
pub mod sanitize;
pub mod transport;
pub mod value_object;

pub use broadcast::{BroadcastTarget, Identity, Priority, Sender, authorize};
pub use entity::{Connection, ConnectionFilter, ConnectionSnapshot, RoomSummary};
pub use error::{DispatchError, RegistryError, SanitizeError, TokenError, TransportError, ValueObjectError};
pub use event::{Event, EventKind};
pub use transport::{ConnectionTransport, OutboundFrame};
pub use value_object::{ConnectionId, ConnectionIdFactory, EventId, Role, RoomName, Timestamp, UserId};
