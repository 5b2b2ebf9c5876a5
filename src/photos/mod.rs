//! Progress photo storage.

pub mod encoding;
pub mod store;
pub mod types;

pub use encoding::{
    bytes_to_data_url, decode_data_url, file_to_persistable_encoding, make_thumbnail,
    DEFAULT_THUMBNAIL_EDGE,
};
pub use store::PhotoStore;
pub use types::{ImportReport, ProgressPhoto};
