//! Experiment configuration: layered YAML resolution and tool settings.

pub mod configuration;
pub mod resolver;
pub mod settings;

pub use configuration::{ALGO_NAME_KEY, ConfigMap, Configuration, LayerSource};
pub use resolver::{
    BASE_CONFIG_FILE, ConfigResolver, DEFAULT_CONFIG_ROOT, MODEL_CONFIG_DIR, get_config,
    load_layer, normalize_yaml, parse_layer,
};
pub use settings::{LogSettings, SETTINGS_FILE, Settings, load_settings, project_dirs, settings_exist};
