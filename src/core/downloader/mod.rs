pub mod http_item;
pub mod manager;

pub use http_item::{part_path, write_atomic, Checksum, HttpItem};
pub use manager::{
    AttemptError, DownloadEvent, DownloadManager, Downloadable, ProgressCallback,
};
