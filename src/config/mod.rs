mod settings;

pub use settings::{
    Config, TomlAgentConfig, TomlBridgeConfig, TomlConfig, TomlLoggingConfig, EXAMPLE_CONFIG,
};
