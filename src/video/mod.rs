pub mod handle;

pub use handle::{VideoHandle, VideoMetadata, frame_index_for_time};
