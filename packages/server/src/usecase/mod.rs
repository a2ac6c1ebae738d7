//! UseCase layer: one struct per application operation.
//!
//! 各ユースケースは `Arc` で共有されたインフラ層のコンポーネントを受け取り、
//! UI 層（HTTP ハンドラ）から呼び出されます。

pub mod admin_broadcast;
pub mod admin_query;
pub mod disconnect;
pub mod error;
pub mod issue_token;
pub mod notify;
pub mod open_stream;
pub mod send_event;

pub use admin_broadcast::{AdminBroadcast, AdminBroadcastUseCase};
pub use admin_query::{AdminQueryUseCase, RealtimeStats};
pub use disconnect::DisconnectUseCase;
pub use error::{AdminError, IssueTokenError, NotifyError, OpenStreamError, SendEventError};
pub use issue_token::IssueTokenUseCase;
pub use notify::{Notification, NotifyUseCase, project_room};
pub use open_stream::{ConnectionGuard, OpenStreamUseCase, OpenedStream};
pub use send_event::{SendEventUseCase, SendOutcome};
