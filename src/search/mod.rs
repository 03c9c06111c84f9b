pub mod engine;
pub mod stream;
pub mod yellow;
pub mod zh;

pub use engine::{search_all_buffered, search_all_streaming, SearchOptions};
pub use stream::{EventChannel, StreamEvent};
pub use zh::{SearchQuery, ZhConverter};
