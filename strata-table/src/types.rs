//! Logical column types and their Arrow representation.

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, TimeUnit};

use crate::schema::TableSchema;

/// Name given to the item field of list columns.
pub const LIST_ITEM_NAME: &str = "item";

/// Scalar column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    LargeUtf8,
    Binary,
    LargeBinary,
    Date32,
    Date64,
    Timestamp(TimeUnit),
    Duration(TimeUnit),
    Decimal128(u8, i8),
}

impl PrimitiveType {
    pub fn to_arrow(self) -> DataType {
        match self {
            PrimitiveType::Boolean => DataType::Boolean,
            PrimitiveType::Int8 => DataType::Int8,
            PrimitiveType::Int16 => DataType::Int16,
            PrimitiveType::Int32 => DataType::Int32,
            PrimitiveType::Int64 => DataType::Int64,
            PrimitiveType::UInt8 => DataType::UInt8,
            PrimitiveType::UInt16 => DataType::UInt16,
            PrimitiveType::UInt32 => DataType::UInt32,
            PrimitiveType::UInt64 => DataType::UInt64,
            PrimitiveType::Float32 => DataType::Float32,
            PrimitiveType::Float64 => DataType::Float64,
            PrimitiveType::Utf8 => DataType::Utf8,
            PrimitiveType::LargeUtf8 => DataType::LargeUtf8,
            PrimitiveType::Binary => DataType::Binary,
            PrimitiveType::LargeBinary => DataType::LargeBinary,
            PrimitiveType::Date32 => DataType::Date32,
            PrimitiveType::Date64 => DataType::Date64,
            PrimitiveType::Timestamp(unit) => DataType::Timestamp(unit, None),
            PrimitiveType::Duration(unit) => DataType::Duration(unit),
            PrimitiveType::Decimal128(p, s) => DataType::Decimal128(p, s),
        }
    }
}

/// The declared type of a column.
///
/// The set of variants is closed: every column is a primitive, a list of
/// primitives, or a nested table whose columns are themselves typed.
#[derive(Debug, Clone)]
pub enum LogicalType {
    Primitive(PrimitiveType),
    /// List of nullable primitive items, optionally of fixed length.
    List {
        item: PrimitiveType,
        fixed_size: Option<i32>,
    },
    /// Nested sub-table, stored as a struct array.
    Table(Arc<TableSchema>),
}

impl LogicalType {
    pub fn list(item: PrimitiveType) -> Self {
        LogicalType::List {
            item,
            fixed_size: None,
        }
    }

    pub fn fixed_size_list(item: PrimitiveType, size: i32) -> Self {
        LogicalType::List {
            item,
            fixed_size: Some(size),
        }
    }

    pub fn to_arrow(&self) -> DataType {
        match self {
            LogicalType::Primitive(p) => p.to_arrow(),
            LogicalType::List { item, fixed_size } => {
                let field = Arc::new(Field::new(LIST_ITEM_NAME, item.to_arrow(), true));
                match fixed_size {
                    Some(size) => DataType::FixedSizeList(field, *size),
                    None => DataType::List(field),
                }
            }
            LogicalType::Table(schema) => DataType::Struct(schema.arrow_fields().clone()),
        }
    }

    /// Whether values of this type have a total order usable as a sort key.
    pub fn is_orderable(&self) -> bool {
        match self {
            LogicalType::Primitive(_) => true,
            LogicalType::List { .. } => false,
            LogicalType::Table(schema) => schema
                .columns()
                .iter()
                .all(|c| c.logical_type().is_orderable()),
        }
    }

    /// The nested definition, if this is a sub-table column.
    pub fn as_table(&self) -> Option<&Arc<TableSchema>> {
        match self {
            LogicalType::Table(schema) => Some(schema),
            _ => None,
        }
    }
}

impl From<PrimitiveType> for LogicalType {
    fn from(p: PrimitiveType) -> Self {
        LogicalType::Primitive(p)
    }
}

impl From<Arc<TableSchema>> for LogicalType {
    fn from(schema: Arc<TableSchema>) -> Self {
        LogicalType::Table(schema)
    }
}

/// Structural equality: nested tables compare by their columns, not by
/// definition name or identity.
impl PartialEq for LogicalType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LogicalType::Primitive(a), LogicalType::Primitive(b)) => a == b,
            (
                LogicalType::List {
                    item: a,
                    fixed_size: fa,
                },
                LogicalType::List {
                    item: b,
                    fixed_size: fb,
                },
            ) => a == b && fa == fb,
            (LogicalType::Table(a), LogicalType::Table(b)) => {
                Arc::ptr_eq(a, b) || a.as_ref() == b.as_ref()
            }
            _ => false,
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Primitive(p) => write!(f, "{}", p.to_arrow()),
            LogicalType::List {
                item,
                fixed_size: None,
            } => write!(f, "List<{}>", item.to_arrow()),
            LogicalType::List {
                item,
                fixed_size: Some(n),
            } => write!(f, "FixedSizeList<{}; {n}>", item.to_arrow()),
            LogicalType::Table(schema) => write!(f, "Table<{}>", schema.name()),
        }
    }
}
