//! Rejects top-level model properties that cannot bind without loss.
//!
//! JSON conversion turns non-finite floats into `null` and integers above
//! `i64::MAX` into floats. Both are caught here, on the model itself, before
//! conversion. Nested values travel as JSON and are not inspected.

use std::fmt;

use serde::ser::{self, Serialize, Serializer};

use crate::error::QueryError;

/// A property value that has no lossless binding.
#[derive(Debug, thiserror::Error)]
pub(super) enum PropertyError {
    #[error("property '{property}': {reason}")]
    Unbindable {
        property: String,
        reason: &'static str,
    },

    #[error("{0}")]
    Custom(String),
}

impl ser::Error for PropertyError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

impl From<PropertyError> for QueryError {
    fn from(err: PropertyError) -> Self {
        match err {
            PropertyError::Unbindable { property, reason } => {
                QueryError::invalid_input(property, reason)
            }
            PropertyError::Custom(msg) => QueryError::invalid_input(
                "parameter model",
                format!("serialization failed: {}", msg),
            ),
        }
    }
}

const NON_FINITE: &str = "non-finite float value";
const OUT_OF_RANGE: &str = "integer outside the signed 64-bit range";

/// Walk the model's top-level fields and reject unbindable scalars.
pub(super) fn check_properties<M: Serialize + ?Sized>(model: &M) -> Result<(), PropertyError> {
    model.serialize(ModelSerializer)
}

macro_rules! accept {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(self, _v: $ty) -> Result<(), PropertyError> {
                Ok(())
            }
        )*
    };
}

macro_rules! compound_types {
    ($map:ty, $strukt:ty) => {
        type SerializeSeq = Skip;
        type SerializeTuple = Skip;
        type SerializeTupleStruct = Skip;
        type SerializeTupleVariant = Skip;
        type SerializeMap = $map;
        type SerializeStruct = $strukt;
        type SerializeStructVariant = Skip;
    };
}

macro_rules! forward_unit_and_compounds {
    ($map:expr, $strukt:expr) => {
        fn serialize_none(self) -> Result<(), PropertyError> {
            Ok(())
        }

        fn serialize_unit(self) -> Result<(), PropertyError> {
            Ok(())
        }

        fn serialize_unit_struct(self, _name: &'static str) -> Result<(), PropertyError> {
            Ok(())
        }

        fn serialize_unit_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            _variant: &'static str,
        ) -> Result<(), PropertyError> {
            Ok(())
        }

        fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), PropertyError> {
            value.serialize(self)
        }

        fn serialize_newtype_struct<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            value: &T,
        ) -> Result<(), PropertyError> {
            value.serialize(self)
        }

        fn serialize_newtype_variant<T: ?Sized + Serialize>(
            self,
            _name: &'static str,
            _variant_index: u32,
            _variant: &'static str,
            _value: &T,
        ) -> Result<(), PropertyError> {
            Ok(())
        }

        fn serialize_seq(self, _len: Option<usize>) -> Result<Skip, PropertyError> {
            Ok(Skip)
        }

        fn serialize_tuple(self, _len: usize) -> Result<Skip, PropertyError> {
            Ok(Skip)
        }

        fn serialize_tuple_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Skip, PropertyError> {
            Ok(Skip)
        }

        fn serialize_tuple_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Skip, PropertyError> {
            Ok(Skip)
        }

        fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, PropertyError> {
            Ok($map)
        }

        fn serialize_struct(
            self,
            _name: &'static str,
            _len: usize,
        ) -> Result<Self::SerializeStruct, PropertyError> {
            Ok($strukt)
        }

        fn serialize_struct_variant(
            self,
            _name: &'static str,
            _variant_index: u32,
            _variant: &'static str,
            _len: usize,
        ) -> Result<Skip, PropertyError> {
            Ok(Skip)
        }
    };
}

/// Serializer for the model itself. Only struct and map fields are checked.
struct ModelSerializer;

impl Serializer for ModelSerializer {
    type Ok = ();
    type Error = PropertyError;
    compound_types!(Fields, Fields);

    accept! {
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_i128(i128),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_u128(u128),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
    }

    forward_unit_and_compounds!(Fields::default(), Fields::default());
}

/// Serializer for one property value.
#[derive(Clone, Copy)]
struct PropertySerializer<'a> {
    property: &'a str,
}

impl PropertySerializer<'_> {
    fn reject(&self, reason: &'static str) -> PropertyError {
        PropertyError::Unbindable {
            property: self.property.to_string(),
            reason,
        }
    }
}

impl Serializer for PropertySerializer<'_> {
    type Ok = ();
    type Error = PropertyError;
    compound_types!(Skip, Skip);

    accept! {
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_char(char),
        serialize_str(&str),
        serialize_bytes(&[u8]),
    }

    fn serialize_u64(self, v: u64) -> Result<(), PropertyError> {
        if i64::try_from(v).is_err() {
            return Err(self.reject(OUT_OF_RANGE));
        }
        Ok(())
    }

    fn serialize_u128(self, v: u128) -> Result<(), PropertyError> {
        if i64::try_from(v).is_err() {
            return Err(self.reject(OUT_OF_RANGE));
        }
        Ok(())
    }

    fn serialize_i128(self, v: i128) -> Result<(), PropertyError> {
        if i64::try_from(v).is_err() {
            return Err(self.reject(OUT_OF_RANGE));
        }
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<(), PropertyError> {
        if !v.is_finite() {
            return Err(self.reject(NON_FINITE));
        }
        Ok(())
    }

    fn serialize_f64(self, v: f64) -> Result<(), PropertyError> {
        if !v.is_finite() {
            return Err(self.reject(NON_FINITE));
        }
        Ok(())
    }

    forward_unit_and_compounds!(Skip, Skip);
}

/// Field collector for the top-level struct or map.
#[derive(Default)]
struct Fields {
    key: Option<String>,
}

impl ser::SerializeStruct for Fields {
    type Ok = ();
    type Error = PropertyError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), PropertyError> {
        value.serialize(PropertySerializer { property: key })
    }

    fn end(self) -> Result<(), PropertyError> {
        Ok(())
    }
}

impl ser::SerializeMap for Fields {
    type Ok = ();
    type Error = PropertyError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), PropertyError> {
        let key = serde_json::to_value(key).map_err(|e| PropertyError::Custom(e.to_string()))?;
        self.key = Some(match key {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), PropertyError> {
        let property = self.key.take().unwrap_or_default();
        value.serialize(PropertySerializer { property: &property })
    }

    fn end(self) -> Result<(), PropertyError> {
        Ok(())
    }
}

/// Accepts any nested value unchecked.
struct Skip;

macro_rules! skip_elements {
    ($($trait:ident :: $method:ident),* $(,)?) => {
        $(
            impl ser::$trait for Skip {
                type Ok = ();
                type Error = PropertyError;

                fn $method<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), PropertyError> {
                    Ok(())
                }

                fn end(self) -> Result<(), PropertyError> {
                    Ok(())
                }
            }
        )*
    };
}

skip_elements! {
    SerializeSeq::serialize_element,
    SerializeTuple::serialize_element,
    SerializeTupleStruct::serialize_field,
    SerializeTupleVariant::serialize_field,
}

impl ser::SerializeMap for Skip {
    type Ok = ();
    type Error = PropertyError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, _key: &T) -> Result<(), PropertyError> {
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, _value: &T) -> Result<(), PropertyError> {
        Ok(())
    }

    fn end(self) -> Result<(), PropertyError> {
        Ok(())
    }
}

impl ser::SerializeStruct for Skip {
    type Ok = ();
    type Error = PropertyError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        _value: &T,
    ) -> Result<(), PropertyError> {
        Ok(())
    }

    fn end(self) -> Result<(), PropertyError> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for Skip {
    type Ok = ();
    type Error = PropertyError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        _value: &T,
    ) -> Result<(), PropertyError> {
        Ok(())
    }

    fn end(self) -> Result<(), PropertyError> {
        Ok(())
    }
}
