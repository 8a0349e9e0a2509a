//! Stored procedure and function statement composition.
//!
//! Turns an invocation kind, a routine name, and a parameter model into SQL text
//! plus the ordered parameter bindings.
//!
//! | Kind                              | Prefix                   | Suffix |
//! |-----------------------------------|--------------------------|--------|
//! | [`InvocationKind::Procedure`]     | `EXECUTE <name>`         |        |
//! | [`InvocationKind::ScalarFunction`]| `SELECT <name>(`         | `)`    |
//! | [`InvocationKind::TableFunction`] | `SELECT * FROM <name>(`  | `)`    |
//!
//! Routine and parameter names are emitted verbatim; they must come from trusted
//! code, never from user input.
//!
//! # Example
//!
//! ```rust
//! use serde::Serialize;
//! use stratum_query::procedure::{compose, InvocationKind, ParameterModel};
//!
//! #[derive(Serialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct Totals {
//!     order_id: i32,
//!     region: Option<String>,
//! }
//!
//! impl ParameterModel for Totals {}
//!
//! let model = Totals { order_id: 7, region: None };
//! let stmt = compose(InvocationKind::TableFunction, "GetTotals", Some(&model)).unwrap();
//! assert_eq!(stmt.sql, "SELECT * FROM GetTotals( @OrderId, @Region)");
//! assert_eq!(stmt.null_substituted, vec!["Region".to_string()]);
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{QueryError, QueryResult};
use crate::filter::FilterValue;

mod scalars;

/// How a routine is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvocationKind {
    /// A stored procedure.
    Procedure,
    /// A function returning a single value.
    ScalarFunction,
    /// A function returning rows.
    TableFunction,
}

impl InvocationKind {
    /// Whether the kind is a function call (parenthesized argument list).
    pub fn is_function(&self) -> bool {
        !matches!(self, Self::Procedure)
    }

    fn prefix(&self, name: &str) -> String {
        match self {
            Self::Procedure => format!("EXECUTE {}", name),
            Self::ScalarFunction => format!("SELECT {}(", name),
            Self::TableFunction => format!("SELECT * FROM {}(", name),
        }
    }

    fn suffix(&self) -> &'static str {
        if self.is_function() { ")" } else { "" }
    }
}

impl fmt::Display for InvocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Procedure => write!(f, "procedure"),
            Self::ScalarFunction => write!(f, "scalar function"),
            Self::TableFunction => write!(f, "table function"),
        }
    }
}

/// Parameter direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParameterDirection {
    /// Input parameter (default).
    #[default]
    Input,
    /// Output parameter.
    Output,
    /// Input/output parameter.
    InputOutput,
    /// The routine's return value.
    ReturnValue,
}

impl ParameterDirection {
    /// Whether the driver writes a value back into this parameter.
    pub fn is_output(&self) -> bool {
        !matches!(self, Self::Input)
    }
}

/// Per-property marker giving a procedure parameter its own SQL name and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterAttribute {
    /// Parameter name as declared by the procedure.
    pub name: &'static str,
    /// Parameter direction.
    pub direction: ParameterDirection,
}

impl ParameterAttribute {
    /// Create an attribute.
    pub const fn new(name: &'static str, direction: ParameterDirection) -> Self {
        Self { name, direction }
    }

    /// An input parameter declared under another name.
    pub const fn input(name: &'static str) -> Self {
        Self::new(name, ParameterDirection::Input)
    }

    /// An output parameter declared under another name.
    pub const fn output(name: &'static str) -> Self {
        Self::new(name, ParameterDirection::Output)
    }
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    /// Parameter name.
    pub name: String,
    /// Value; [`FilterValue::Null`] is the SQL null.
    pub value: FilterValue,
    /// Direction.
    pub direction: ParameterDirection,
}

impl SqlParameter {
    /// Create a parameter.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<FilterValue>,
        direction: ParameterDirection,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            direction,
        }
    }

    /// Create an input parameter.
    pub fn input(name: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(name, value, ParameterDirection::Input)
    }

    /// Create an output parameter with a null initial value.
    pub fn output(name: impl Into<String>) -> Self {
        Self::new(name, FilterValue::Null, ParameterDirection::Output)
    }

    /// Create an input/output parameter.
    pub fn input_output(name: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(name, value, ParameterDirection::InputOutput)
    }

    /// Create a return-value parameter.
    pub fn return_value(name: impl Into<String>) -> Self {
        Self::new(name, FilterValue::Null, ParameterDirection::ReturnValue)
    }
}

/// A structured parameter model.
///
/// Properties are the model's serialized fields, in declaration order. A property
/// serialized as `null` binds the SQL null.
///
/// ```rust
/// use serde::Serialize;
/// use stratum_query::procedure::{ParameterAttribute, ParameterModel};
///
/// #[derive(Serialize)]
/// struct Archive {
///     #[serde(rename = "Out")]
///     out: Option<i32>,
/// }
///
/// impl ParameterModel for Archive {
///     fn attributes() -> Vec<(&'static str, ParameterAttribute)> {
///         vec![("Out", ParameterAttribute::output("OutParam"))]
///     }
/// }
/// ```
pub trait ParameterModel: Serialize {
    /// Explicit parameter attributes, keyed by serialized property name.
    fn attributes() -> Vec<(&'static str, ParameterAttribute)> {
        Vec::new()
    }
}

impl ParameterModel for () {}

impl ParameterModel for serde_json::Value {}

/// One property of a parameter model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProperty {
    /// Serialized property name.
    pub name: String,
    /// Property value.
    pub value: FilterValue,
    /// Explicit attribute, if any.
    pub attribute: Option<ParameterAttribute>,
}

/// Extract a model's properties in declaration order.
///
/// A model serializing to `null` has no properties. Anything other than an object
/// or `null` is rejected, as is a property holding a non-finite float or an
/// integer outside the signed 64-bit range.
pub fn model_properties<M: ParameterModel + ?Sized>(model: &M) -> QueryResult<Vec<ModelProperty>> {
    scalars::check_properties(model)?;

    let value = serde_json::to_value(model).map_err(|e| {
        QueryError::invalid_input("parameter model", "serialization failed").with_source(e)
    })?;

    let map = match value {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => return Ok(Vec::new()),
        other => {
            return Err(QueryError::invalid_input(
                "parameter model",
                format!("expected a struct or map, got {}", json_kind(&other)),
            ));
        }
    };

    let attributes = M::attributes();
    Ok(map
        .into_iter()
        .map(|(name, value)| {
            let attribute = attributes
                .iter()
                .find(|(prop, _)| *prop == name)
                .map(|(_, attr)| *attr);
            ModelProperty {
                name,
                value: FilterValue::from(value),
                attribute,
            }
        })
        .collect())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// SQL text and bindings for a routine invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComposedStatement {
    /// The SQL text.
    pub sql: String,
    /// Parameter bindings, in the order they appear in `sql`.
    pub parameters: Vec<SqlParameter>,
    /// Properties whose value was absent and bound as null.
    pub null_substituted: Vec<String>,
}

impl ComposedStatement {
    /// Whether any property was bound as null because its value was absent.
    pub fn has_null_substitutions(&self) -> bool {
        !self.null_substituted.is_empty()
    }
}

/// Compose an invocation from a parameter model.
///
/// For procedures, a property carrying a [`ParameterAttribute`] is emitted as
/// `@Declared=@Property` and bound with the declared direction. Every other
/// property is emitted as `@Property` and bound as input. Absent values bind null
/// and are listed in [`ComposedStatement::null_substituted`].
pub fn compose<M: ParameterModel + ?Sized>(
    kind: InvocationKind,
    name: &str,
    model: Option<&M>,
) -> QueryResult<ComposedStatement> {
    let properties = match model {
        Some(model) => model_properties(model)?,
        None => Vec::new(),
    };

    let mut sql = kind.prefix(name);
    let mut parameters = Vec::with_capacity(properties.len());
    let mut null_substituted = Vec::new();

    for property in properties {
        let direction = match (kind, property.attribute) {
            (InvocationKind::Procedure, Some(attr)) => {
                sql.push_str(&format!(" @{}=@{},", attr.name, property.name));
                attr.direction
            }
            _ => {
                sql.push_str(&format!(" @{},", property.name));
                ParameterDirection::Input
            }
        };

        if property.value.is_null() {
            null_substituted.push(property.name.clone());
        }
        parameters.push(SqlParameter::new(property.name, property.value, direction));
    }

    if !parameters.is_empty() {
        sql.pop();
    }
    sql.push_str(kind.suffix());

    if !null_substituted.is_empty() {
        warn!(routine = name, properties = ?null_substituted, "absent parameter values bound as null");
    }
    debug!(%kind, sql = %sql, params = parameters.len(), "composed routine statement");

    Ok(ComposedStatement {
        sql,
        parameters,
        null_substituted,
    })
}

/// Compose an invocation that takes no parameters.
pub fn compose_without_model(kind: InvocationKind, name: &str) -> ComposedStatement {
    let mut sql = kind.prefix(name);
    sql.push_str(kind.suffix());
    ComposedStatement {
        sql,
        ..Default::default()
    }
}

/// Compose the SQL text for pre-built parameters.
///
/// Leading `@` characters are stripped from each name before one is emitted.
pub fn compose_sql(kind: InvocationKind, name: &str, parameters: &[SqlParameter]) -> String {
    let mut sql = kind.prefix(name);
    for param in parameters {
        sql.push_str(&format!(" @{},", param.name.trim_start_matches('@')));
    }
    if !parameters.is_empty() {
        sql.pop();
    }
    sql.push_str(kind.suffix());
    sql
}

/// Prefix a parameter name with `@` unless it already starts with one.
pub fn normalize_parameter_name(name: &str) -> Cow<'_, str> {
    if name.starts_with('@') {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("@{}", name))
    }
}

/// A command ready for a driver.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DbCommand {
    /// The SQL text.
    pub sql: String,
    /// Attached parameters, with `@`-prefixed names.
    pub parameters: Vec<SqlParameter>,
}

impl DbCommand {
    /// Create a command with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    /// Look up an attached parameter by name, with or without the `@`.
    pub fn parameter(&self, name: &str) -> Option<&SqlParameter> {
        let name = normalize_parameter_name(name);
        self.parameters.iter().find(|p| p.name == name)
    }
}

impl From<ComposedStatement> for DbCommand {
    fn from(stmt: ComposedStatement) -> Self {
        let mut command = DbCommand::new(stmt.sql);
        attach_parameters(&mut command, stmt.parameters);
        command
    }
}

/// Attach parameters to a command, normalizing each name to start with `@`.
pub fn attach_parameters(command: &mut DbCommand, parameters: impl IntoIterator<Item = SqlParameter>) {
    command.parameters.extend(parameters.into_iter().map(|mut param| {
        if let Cow::Owned(name) = normalize_parameter_name(&param.name) {
            param.name = name;
        }
        param
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Serialize)]
    struct TwoArgs {
        #[serde(rename = "A")]
        a: i32,
        #[serde(rename = "B")]
        b: String,
    }

    impl ParameterModel for TwoArgs {}

    #[derive(Serialize)]
    struct WithOutput {
        #[serde(rename = "Out")]
        out: Option<i32>,
    }

    impl ParameterModel for WithOutput {
        fn attributes() -> Vec<(&'static str, ParameterAttribute)> {
            vec![("Out", ParameterAttribute::output("OutParam"))]
        }
    }

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Mixed {
        customer_id: i32,
        note: Option<String>,
        total: Option<f64>,
    }

    impl ParameterModel for Mixed {
        fn attributes() -> Vec<(&'static str, ParameterAttribute)> {
            vec![(
                "Total",
                ParameterAttribute::new("OrderTotal", ParameterDirection::InputOutput),
            )]
        }
    }

    #[test]
    fn test_procedure_without_model() {
        let stmt = compose::<()>(InvocationKind::Procedure, "Proc1", None).unwrap();
        assert_eq!(stmt.sql, "EXECUTE Proc1");
        assert!(stmt.parameters.is_empty());
        assert_eq!(stmt, compose_without_model(InvocationKind::Procedure, "Proc1"));
    }

    #[test]
    fn test_scalar_function_without_model() {
        let stmt = compose_without_model(InvocationKind::ScalarFunction, "Fn1");
        assert_eq!(stmt.sql, "SELECT Fn1()");
        assert!(stmt.parameters.is_empty());
    }

    #[test]
    fn test_table_function_with_model() {
        let model = TwoArgs {
            a: 1,
            b: "x".into(),
        };
        let stmt = compose(InvocationKind::TableFunction, "Fn2", Some(&model)).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM Fn2( @A, @B)");
        assert_eq!(
            stmt.parameters,
            vec![SqlParameter::input("A", 1), SqlParameter::input("B", "x")]
        );
        assert!(!stmt.has_null_substitutions());
    }

    #[test]
    fn test_procedure_with_output_attribute() {
        let model = WithOutput { out: None };
        let stmt = compose(InvocationKind::Procedure, "Proc2", Some(&model)).unwrap();
        assert_eq!(stmt.sql, "EXECUTE Proc2 @OutParam=@Out");
        assert_eq!(stmt.parameters.len(), 1);
        assert_eq!(stmt.parameters[0].name, "Out");
        assert_eq!(stmt.parameters[0].direction, ParameterDirection::Output);
        assert_eq!(stmt.parameters[0].value, FilterValue::Null);
    }

    #[test]
    fn test_attribute_ignored_for_functions() {
        let model = WithOutput { out: Some(3) };
        let stmt = compose(InvocationKind::ScalarFunction, "Fn3", Some(&model)).unwrap();
        assert_eq!(stmt.sql, "SELECT Fn3( @Out)");
        assert_eq!(stmt.parameters[0].direction, ParameterDirection::Input);
    }

    #[test]
    fn test_mixed_procedure_properties() {
        let model = Mixed {
            customer_id: 4,
            note: None,
            total: Some(9.5),
        };
        let stmt = compose(InvocationKind::Procedure, "SaveOrder", Some(&model)).unwrap();
        assert_eq!(
            stmt.sql,
            "EXECUTE SaveOrder @CustomerId, @Note, @OrderTotal=@Total"
        );
        assert_eq!(
            stmt.parameters,
            vec![
                SqlParameter::input("CustomerId", 4),
                SqlParameter::input("Note", FilterValue::Null),
                SqlParameter::input_output("Total", 9.5),
            ]
        );
        assert_eq!(stmt.null_substituted, vec!["Note".to_string()]);
    }

    #[test]
    fn test_json_model_keeps_order() {
        let model = json!({"Zeta": 1, "Alpha": null});
        let stmt = compose(InvocationKind::TableFunction, "Fn", Some(&model)).unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM Fn( @Zeta, @Alpha)");
        assert_eq!(stmt.null_substituted, vec!["Alpha".to_string()]);
    }

    #[test]
    fn test_null_model_has_no_parameters() {
        let stmt = compose(InvocationKind::ScalarFunction, "Fn", Some(&json!(null))).unwrap();
        assert_eq!(stmt.sql, "SELECT Fn()");
    }

    #[test]
    fn test_non_object_model_rejected() {
        let err = compose(InvocationKind::Procedure, "P", Some(&json!([1, 2]))).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidParameter);
        assert!(err.message.contains("an array"));
    }

    #[derive(Serialize)]
    struct Measurement {
        #[serde(rename = "Serial")]
        serial: u64,
        #[serde(rename = "Ratio")]
        ratio: Option<f64>,
    }

    impl ParameterModel for Measurement {}

    #[test]
    fn test_unsigned_above_signed_range_rejected() {
        let model = Measurement { serial: u64::MAX, ratio: Some(1.5) };
        let err = compose(InvocationKind::Procedure, "Log", Some(&model)).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidParameter);
        assert_eq!(err.context.field.as_deref(), Some("Serial"));

        let model = Measurement { serial: i64::MAX as u64, ratio: Some(1.5) };
        let stmt = compose(InvocationKind::Procedure, "Log", Some(&model)).unwrap();
        assert_eq!(stmt.parameters[0].value, FilterValue::Int(i64::MAX));
        assert_eq!(stmt.parameters[1].value, FilterValue::Float(1.5));
    }

    #[test]
    fn test_non_finite_float_rejected_not_nulled() {
        for ratio in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let model = Measurement { serial: 1, ratio: Some(ratio) };
            let err = compose(InvocationKind::TableFunction, "Fn", Some(&model)).unwrap_err();
            assert_eq!(err.code, crate::error::ErrorCode::InvalidParameter);
            assert_eq!(err.context.field.as_deref(), Some("Ratio"));
        }

        let model = Measurement { serial: 1, ratio: None };
        let stmt = compose(InvocationKind::TableFunction, "Fn", Some(&model)).unwrap();
        assert_eq!(stmt.null_substituted, vec!["Ratio".to_string()]);
    }

    #[test]
    fn test_compose_sql_strips_at() {
        let params = vec![
            SqlParameter::input("@A", 1),
            SqlParameter::input("B", 2),
            SqlParameter::input("@@C", 3),
        ];
        assert_eq!(
            compose_sql(InvocationKind::TableFunction, "Fn2", &params),
            "SELECT * FROM Fn2( @A, @B, @C)"
        );
        assert_eq!(
            compose_sql(InvocationKind::Procedure, "Proc", &params[..1]),
            "EXECUTE Proc @A"
        );
        assert_eq!(compose_sql(InvocationKind::ScalarFunction, "Fn1", &[]), "SELECT Fn1()");
    }

    #[test]
    fn test_normalize_parameter_name() {
        assert_eq!(normalize_parameter_name("Id"), "@Id");
        assert_eq!(normalize_parameter_name("@Id"), "@Id");
        let once = normalize_parameter_name("Id").into_owned();
        assert_eq!(normalize_parameter_name(&once), "@Id");
    }

    #[test]
    fn test_attach_parameters() {
        let mut command = DbCommand::new("EXECUTE P @Id, @Name");
        attach_parameters(
            &mut command,
            vec![SqlParameter::input("Id", 1), SqlParameter::input("@Name", "n")],
        );
        let names: Vec<_> = command.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@Id", "@Name"]);
        assert_eq!(command.parameter("Id").unwrap().value, FilterValue::Int(1));

        attach_parameters(&mut command, Vec::new());
        assert_eq!(command.parameters.len(), 2);
    }

    #[test]
    fn test_command_from_statement() {
        let model = TwoArgs {
            a: 1,
            b: "x".into(),
        };
        let stmt = compose(InvocationKind::TableFunction, "Fn2", Some(&model)).unwrap();
        let command = DbCommand::from(stmt);
        assert_eq!(command.sql, "SELECT * FROM Fn2( @A, @B)");
        assert_eq!(command.parameters[1].name, "@B");
    }
}
