mod collect;
mod types;

pub use collect::{
    collect_interactive_tasks, collect_static_tasks, collect_tasks, count_interactive_images,
    effective_image_config, has_interactive_images, parse_image_config, CollectOptions, ALT_KEY,
    REMOVE_SENTINEL, URL_KEY,
};
pub use types::{
    Dimensions, ImageTask, TaskKind, TaskTarget, PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_MEDIUM,
};
