//! Explicit registration of view entities and database functions.
//!
//! Nothing is discovered at runtime: the application lists its views and function
//! signatures in an [`EntityRegistry`] and hands it to the configurator.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::{QueryError, QueryResult};

/// A mapped type that reads from a database view instead of a table.
///
/// The view name is read from an instance, so a view type must be constructible
/// at model-build time.
pub trait ViewEntity: Send + Sync + 'static {
    /// Name of the database view this entity maps to.
    fn view_name(&self) -> Cow<'static, str>;
}

/// Builds an instance of a registered view entity.
pub type ViewFactory = Arc<dyn Fn() -> QueryResult<Box<dyn ViewEntity>> + Send + Sync>;

/// A registered view entity.
#[derive(Clone)]
pub struct ViewRegistration {
    entity: String,
    factory: ViewFactory,
}

impl ViewRegistration {
    /// The entity name the view is mapped under.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Construct an instance of the view entity.
    pub fn instantiate(&self) -> QueryResult<Box<dyn ViewEntity>> {
        (self.factory)()
    }
}

impl fmt::Debug for ViewRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRegistration")
            .field("entity", &self.entity)
            .finish()
    }
}

/// How a function's declaring container can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerKind {
    /// A container with no instances (a module or unit namespace).
    #[default]
    Static,
    /// A container that can be instantiated.
    Instantiable,
}

/// Signature of a callable database function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbFunctionSignature {
    /// Declaring container name.
    pub container: String,
    /// Container kind. Only functions on static containers are registered.
    pub container_kind: ContainerKind,
    /// Function name as known to the database.
    pub name: String,
    /// Parameter types, in order.
    pub parameters: Vec<String>,
    /// Return type.
    pub return_type: String,
}

impl DbFunctionSignature {
    /// Create a signature declared on a static container.
    pub fn new(container: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            container_kind: ContainerKind::Static,
            name: name.into(),
            parameters: Vec::new(),
            return_type: "void".to_string(),
        }
    }

    /// Append a parameter type.
    pub fn param(mut self, type_name: impl Into<String>) -> Self {
        self.parameters.push(type_name.into());
        self
    }

    /// Set the return type.
    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = type_name.into();
        self
    }

    /// Mark the declaring container as instantiable.
    pub fn on_instantiable_container(mut self) -> Self {
        self.container_kind = ContainerKind::Instantiable;
        self
    }

    /// Whether the function can be registered with the model.
    pub fn is_registrable(&self) -> bool {
        self.container_kind == ContainerKind::Static
    }

    /// `Container.Name`, the key the model stores the function under.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.container, self.name)
    }
}

impl fmt::Display for DbFunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -> {}",
            self.qualified_name(),
            self.parameters.join(", "),
            self.return_type
        )
    }
}

/// The views and functions an application exposes to the model.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    views: Vec<ViewRegistration>,
    functions: Vec<DbFunctionSignature>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view entity built with `Default`.
    ///
    /// The entity is named after the type's last path segment.
    pub fn view<V: ViewEntity + Default>(self) -> Self {
        self.view_with(short_type_name::<V>(), || Ok(V::default()))
    }

    /// Register a view entity with a fallible factory.
    pub fn view_with<V, F>(mut self, entity: impl Into<String>, factory: F) -> Self
    where
        V: ViewEntity,
        F: Fn() -> QueryResult<V> + Send + Sync + 'static,
    {
        let factory: ViewFactory = Arc::new(move || {
            factory().map(|view| Box::new(view) as Box<dyn ViewEntity>)
        });
        self.views.push(ViewRegistration {
            entity: entity.into(),
            factory,
        });
        self
    }

    /// Register a database function.
    pub fn function(mut self, signature: DbFunctionSignature) -> Self {
        self.functions.push(signature);
        self
    }

    /// Registered views, in registration order.
    pub fn views(&self) -> &[ViewRegistration] {
        &self.views
    }

    /// Registered functions, in registration order.
    pub fn functions(&self) -> &[DbFunctionSignature] {
        &self.functions
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty() && self.functions.is_empty()
    }

    /// Reject duplicate entity names.
    pub fn validate(&self) -> QueryResult<()> {
        for (i, view) in self.views.iter().enumerate() {
            if self.views[..i].iter().any(|v| v.entity == view.entity) {
                return Err(QueryError::configuration(format!(
                    "view entity '{}' is registered more than once",
                    view.entity
                ))
                .with_entity(&view.entity));
            }
        }
        Ok(())
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
