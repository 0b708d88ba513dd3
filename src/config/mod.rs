pub mod loader;
pub mod schema;

pub use loader::load_config;
pub use schema::{
    AiConfig, BusConfig, ChannelEndpoint, ChannelsConfig, Config, Environment, HealthConfig,
    LimitSettings, ServerConfig,
};
