pub mod errors;
pub mod key;
pub mod layout;
pub mod reader;
#[cfg(feature = "writer")]
pub mod writer;

pub use errors::SegmentError;
pub use key::SegmentKey;
pub use layout::{BoundingBox, DetectionSnapshot};
pub use reader::SegmentReader;
#[cfg(feature = "writer")]
pub use writer::SegmentWriter;
