//! Bus core: packet codec, dispatcher, pipes, streaming and announce
//! scheduling.
//!
//! ```text
//!   transport ──(id, Packet)──▶ Dispatcher::dispatch ──▶ Option<Report>
//!   caller loop ──tick(Δ)─────▶ Dispatcher::tick ──────▶ AnnounceDelegate
//! ```

pub mod announce;
pub mod codec;
pub mod dispatch;
pub mod packet;
pub mod pipe;
pub mod stream;

pub use announce::{AnnounceDue, AnnounceScheduler};
pub use codec::{CommandSpec, CommandTable, GenericOp, Operation, PayloadRule};
pub use dispatch::Dispatcher;
pub use packet::{Packet, Report, ReportKind};
pub use pipe::{PipeHandle, PipeOrigin, PipePair, PipeRecord, PipeState, PipeTable, Sequenced};
pub use stream::{StreamManager, StreamState};
