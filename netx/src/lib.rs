//! Duplex byte relaying between connections with socket-style deadlines.

pub mod addr;
pub mod conn;
pub mod deadline;
pub mod dial;
pub mod io_copy;
pub mod resolve;
pub mod tcp;
pub mod udp;

pub use conn::{Conn, is_timeout};
pub use io_copy::{BidiCopy, BidiCopyResult, CopyError, DRAIN_TIMEOUT, bidi_copy};
