pub mod adapter;
pub mod http;
pub mod registry;

pub use adapter::{AdapterHealth, ChannelAdapter, SendReceipt, SendRequest};
pub use http::HttpChannelAdapter;
pub use registry::ChannelRegistry;
