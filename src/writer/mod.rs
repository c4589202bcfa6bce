//! PDF writing.
//!
//! ```text
//! SourceDocument + replaced/new objects
//!     ↓
//! [IncrementalUpdate] (original bytes + appended section)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! PDF bytes
//! ```

mod incremental;
mod object_serializer;

pub use incremental::{IncrementalUpdate, UpdatedDocument};
pub use object_serializer::{to_hex, ObjectSerializer};
