//! Schema model: registry, mapping builder, and the tenant-scoping configurator.
//!
//! Building a model is a one-time step per schema instance:
//!
//! 1. The application lists its view entities and database functions in an
//!    [`EntityRegistry`].
//! 2. [`ModelConfigurator::on_model_creating`] walks the registry and records the
//!    mappings on a [`ModelBuilder`], attaching the tenant filter to every view.
//! 3. [`ModelBuilder::build`] freezes the result into a [`MappingModel`], which
//!    hands out [`EntityQuery`] values that always carry the standing filter.

mod builder;
mod configurator;
mod registry;

pub use builder::{EntityMapping, EntityQuery, EntityTypeBuilder, MappingModel, ModelBuilder};
pub use configurator::{ConnectionOptions, InitState, ModelConfigurator, tenant_filter};
pub use registry::{
    ContainerKind, DbFunctionSignature, EntityRegistry, ViewEntity, ViewFactory, ViewRegistration,
};
