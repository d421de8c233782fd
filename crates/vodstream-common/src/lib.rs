//! Vodstream-Common: shared types, IDs, time ranges and errors.
//!
//! This crate provides functionality used across the vodstream crates:
//!
//! - **Typed IDs**: UUID newtypes for loader instances and playback sessions
//! - **Time Ranges**: buffered-range arithmetic in seconds
//! - **Core Types**: track kinds and the normalized error report surfaced to
//!   the playback layer
//! - **Error Handling**: common error type and result alias
//!
//! # Examples
//!
//! ```
//! use vodstream_common::{ErrorKind, HlsError, TimeRanges};
//!
//! let mut buffered = TimeRanges::new();
//! buffered.add(0.0, 5.0);
//! buffered.add(5.0, 10.0);
//! assert_eq!(buffered.len(), 1);
//! assert!(buffered.contains(7.5));
//!
//! let err = HlsError::new(ErrorKind::SegmentLoad, "loader", "timed out", true);
//! assert_eq!(err.details, "[loader]: timed out");
//! ```

pub mod error;
pub mod ids;
pub mod time_range;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use time_range::{TimeRange, TimeRanges};
pub use types::*;
