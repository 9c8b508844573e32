//! Column descriptors.
//!
//! A [`Column`] is a plain configuration record consumed by
//! [`SchemaBuilder`](crate::SchemaBuilder). It never holds data.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, TimeUnit};
use strata_expr::{Literal, Validator};

use crate::schema::TableSchema;
use crate::types::{LogicalType, PrimitiveType};

/// Declared shape of one column: name, type, nullability, optional
/// validator and optional default.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    logical_type: LogicalType,
    nullable: bool,
    validator: Option<Validator>,
    default: Option<Literal>,
    metadata: HashMap<String, String>,
}

macro_rules! primitive_constructors {
    ($($fn_name:ident => $variant:ident),* $(,)?) => {
        $(
            #[doc = concat!("Non-nullable `", stringify!($variant), "` column.")]
            pub fn $fn_name(name: impl Into<String>) -> Self {
                Self::new(name, PrimitiveType::$variant)
            }
        )*
    };
}

impl Column {
    pub fn new(name: impl Into<String>, logical_type: impl Into<LogicalType>) -> Self {
        Self {
            name: name.into(),
            logical_type: logical_type.into(),
            nullable: false,
            validator: None,
            default: None,
            metadata: HashMap::new(),
        }
    }

    primitive_constructors! {
        boolean => Boolean,
        int8 => Int8,
        int16 => Int16,
        int32 => Int32,
        int64 => Int64,
        uint8 => UInt8,
        uint16 => UInt16,
        uint32 => UInt32,
        uint64 => UInt64,
        float32 => Float32,
        float64 => Float64,
        utf8 => Utf8,
        large_utf8 => LargeUtf8,
        binary => Binary,
        large_binary => LargeBinary,
        date32 => Date32,
        date64 => Date64,
    }

    pub fn timestamp(name: impl Into<String>, unit: TimeUnit) -> Self {
        Self::new(name, PrimitiveType::Timestamp(unit))
    }

    pub fn decimal128(name: impl Into<String>, precision: u8, scale: i8) -> Self {
        Self::new(name, PrimitiveType::Decimal128(precision, scale))
    }

    pub fn list(name: impl Into<String>, item: PrimitiveType) -> Self {
        Self::new(name, LogicalType::list(item))
    }

    pub fn fixed_size_list(name: impl Into<String>, item: PrimitiveType, size: i32) -> Self {
        Self::new(name, LogicalType::fixed_size_list(item, size))
    }

    /// Column holding a nested sub-table of `schema`.
    pub fn table(name: impl Into<String>, schema: &Arc<TableSchema>) -> Self {
        Self::new(name, Arc::clone(schema))
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Value broadcast into the column when construction omits it.
    pub fn with_default(mut self, value: impl Into<Literal>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    pub fn default_value(&self) -> Option<&Literal> {
        self.default.as_ref()
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// The nested definition, if this column holds a sub-table.
    pub fn nested(&self) -> Option<&Arc<TableSchema>> {
        self.logical_type.as_table()
    }

    pub fn data_type(&self) -> DataType {
        self.logical_type.to_arrow()
    }

    pub fn to_arrow_field(&self) -> Field {
        Field::new(&self.name, self.data_type(), self.nullable).with_metadata(self.metadata.clone())
    }

    /// Structural identity: name, type and nullability.
    pub(crate) fn same_shape(&self, other: &Column) -> bool {
        self.name == other.name
            && self.nullable == other.nullable
            && self.logical_type == other.logical_type
    }
}
