mod load;
mod types;

pub use load::{
    apply_env_overrides, get_imagegen_data_dir, load_default, load_from, ENV_CONCURRENCY,
    ENV_MODEL, ENV_RELAY_URL,
};
pub use types::{AppConfig, ClientConfig, LoggingConfig};
