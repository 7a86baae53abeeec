mod collection;
pub mod entities;
pub mod environment;
mod load;
mod loader;
pub mod placeholder;
mod registry;
pub mod schema;

pub use cfg_core::{CfgError, CfgValue, FieldValue, Problem, Problems, ValueType};
pub use environment::EnvironmentOptions;
pub use load::{default_of, default_of_with, load, load_into, LoadOptions};
pub use placeholder::Parameters;
pub use registry::{describe, schema_problems};
pub use schema::{Domain, FieldBuilder, FieldSpec, SchemaBuilder, SchemaDescriptor};

/// A type that can be bound from a configuration element.
///
/// `describe` declares the fields once per type; the registry caches the
/// result for the life of the process. `modify` runs after a node's
/// attributes and collections are bound, `validate` right after it.
pub trait CfgNode: Default + Send + Sync + 'static {
    fn describe(schema: &mut SchemaBuilder<Self>);

    fn modify(&mut self) {}

    fn validate(&self, _problems: &mut Problems) {}
}
