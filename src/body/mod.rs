//! Request body subsystem.
//!
//! # Data Flow
//! ```text
//! frontend packet
//!     → manager.rs (FrontendRegistry::accept, routing by Rid)
//!     → stream.rs (inline body, or upload file mode)
//!         → file_reader.rs (bounded incremental reads)
//!         → watch.rs (growth notifications)
//!     → owner pulls ReadyRead* / Finished | Error and reads bytes
//! ```
//!
//! # Design Decisions
//! - Unread bytes per request are capped by `body.buffer_size`; the file is
//!   not read while the window is full
//! - The terminal event is produced once; file, watch and manager link are
//!   released before it is delivered
//! - The upload file is append-only from the frontend's side

pub mod file_reader;
pub mod manager;
pub mod stream;
pub mod types;
pub mod watch;

pub use file_reader::BufferedFileReader;
pub use manager::{FrontendRegistry, RequestManager, ResponseHandle};
pub use stream::{BodyControl, RequestBodyStream, StreamState};
pub use types::{BodyError, BodyErrorCondition, BodyEvent, RequestPacket, Rid};
pub use watch::{FileGrowthObserver, GrowthSignal, ManualObserver, NotifyObserver, WatchGuard};
