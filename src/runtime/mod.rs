//! Runtime adapters: the tokio spawner and the HTTP fetch helpers.

pub mod api;
pub mod http;
pub mod tokio_spawner;

pub use http::{
    require_image, BoxSink, ChunkCallback, Destination, FetchOptions, ResponseFilter,
    ResponseHead, SaveOptions, SavedStream, SinkFactory, TextResponse,
};
pub use tokio_spawner::TokioSpawner;
