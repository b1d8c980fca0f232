mod attr;
mod options;
mod query;
mod targets;

pub use attr::cmd_attr;
pub use options::cmd_options;
pub use query::cmd_query;
pub use targets::cmd_targets;
