//! Table definitions.
//!
//! A [`TableSchema`] is built once per definition with [`SchemaBuilder`] and
//! shared by every instance through an `Arc`. Definition errors (duplicate
//! names, composition cycles) surface from [`SchemaBuilder::build`], never
//! per instance.
//!
//! ```
//! use std::sync::{Arc, LazyLock};
//! use strata_table::{Column, SchemaBuilder, TableSchema};
//!
//! static POINT: LazyLock<Arc<TableSchema>> = LazyLock::new(|| {
//!     SchemaBuilder::new("Point")
//!         .column(Column::float64("x"))
//!         .column(Column::float64("y").nullable(true))
//!         .build()
//!         .expect("valid definition")
//! });
//!
//! assert_eq!(POINT.num_columns(), 2);
//! assert_eq!(POINT.index_of("y"), Some(1));
//! ```

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields, Schema, SchemaRef};
use rustc_hash::{FxHashMap, FxHashSet};
use strata_result::{Error, Result};
use tracing::debug;

use crate::attribute::Attribute;
use crate::builder::TableBuilder;
use crate::column::Column;

/// Separator between the segments of a nested column path.
pub const PATH_SEPARATOR: char = '.';

// ============================================================================
// SchemaBuilder
// ============================================================================

/// Collects column and attribute declarations for one definition.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    columns: Vec<Column>,
    attributes: Vec<Attribute>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Check the declarations and freeze them into a shared schema.
    pub fn build(self) -> Result<Arc<TableSchema>> {
        let SchemaBuilder {
            name,
            columns,
            mut attributes,
        } = self;

        if name.is_empty() {
            return Err(Error::Schema("definition name must not be empty".into()));
        }

        let mut lookup = FxHashMap::default();
        for (idx, column) in columns.iter().enumerate() {
            check_name(&name, "column", column.name())?;
            if lookup.insert(column.name().to_string(), idx).is_some() {
                return Err(Error::Schema(format!(
                    "duplicate column '{}' in '{name}'",
                    column.name()
                )));
            }
            if let Some(nested) = column.nested()
                && nested.embeds_definition(&name)
            {
                return Err(Error::Schema(format!(
                    "composition cycle: '{name}' embeds itself through column '{}'",
                    column.name()
                )));
            }
        }

        let mut seen = FxHashSet::default();
        for attribute in attributes.iter_mut() {
            check_name(&name, "attribute", attribute.name())?;
            if lookup.contains_key(attribute.name()) {
                return Err(Error::Schema(format!(
                    "attribute '{}' collides with a column of '{name}'",
                    attribute.name()
                )));
            }
            if !seen.insert(attribute.name().to_string()) {
                return Err(Error::Schema(format!(
                    "duplicate attribute '{}' in '{name}'",
                    attribute.name()
                )));
            }
            if let Some(default) = attribute.default_value().cloned() {
                let coerced = default
                    .coerce(attribute.name(), attribute.kind())
                    .map_err(|e| Error::Schema(e.to_string()))?;
                attribute.set_default(Some(coerced));
            }
        }

        let fields: Vec<Field> = columns.iter().map(Column::to_arrow_field).collect();
        let arrow = Arc::new(Schema::new(fields));
        debug!(
            definition = %name,
            columns = columns.len(),
            attributes = attributes.len(),
            "built table schema"
        );
        Ok(Arc::new(TableSchema {
            name,
            columns,
            attributes,
            arrow,
            lookup,
        }))
    }
}

fn check_name(definition: &str, what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Schema(format!("empty {what} name in '{definition}'")));
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(Error::Schema(format!(
            "{what} name '{name}' in '{definition}' contains '{PATH_SEPARATOR}'"
        )));
    }
    Ok(())
}

// ============================================================================
// TableSchema
// ============================================================================

/// Immutable, shared description of a table definition.
///
/// Equality is structural: two schemas are equal when their columns agree
/// in order, name, logical type and nullability, recursively. Definition
/// names, validators, defaults, metadata and attribute declarations do not
/// participate.
#[derive(Debug)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    attributes: Vec<Attribute>,
    arrow: SchemaRef,
    /// Column name -> position.
    lookup: FxHashMap<String, usize>,
}

impl TableSchema {
    /// Definition name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index_of(name).map(|i| &self.columns[i])
    }

    pub(crate) fn require(&self, name: &str) -> Result<(usize, &Column)> {
        self.index_of(name)
            .map(|i| (i, &self.columns[i]))
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    /// Resolve a dotted path into one `(position, descriptor)` per segment.
    pub fn resolve_path(&self, path: &str) -> Result<Vec<(usize, &Column)>> {
        let mut out = Vec::new();
        let mut schema = self;
        let mut segments = path.split(PATH_SEPARATOR).peekable();
        while let Some(segment) = segments.next() {
            let (idx, column) = schema
                .require(segment)
                .map_err(|_| Error::UnknownColumn(path.to_string()))?;
            out.push((idx, column));
            if segments.peek().is_some() {
                schema = column
                    .nested()
                    .map(Arc::as_ref)
                    .ok_or_else(|| Error::UnknownColumn(path.to_string()))?;
            }
        }
        Ok(out)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Declaration for an attribute path such as `"id"` or `"inner.id"`.
    pub fn attribute(&self, path: &str) -> Option<&Attribute> {
        match path.rsplit_once(PATH_SEPARATOR) {
            None => self.attributes.iter().find(|a| a.name() == path),
            Some((columns, name)) => {
                let (_, column) = *self.resolve_path(columns).ok()?.last()?;
                column.nested()?.attribute(name)
            }
        }
    }

    /// Every attribute declared here or in a nested definition, keyed by
    /// its path from this definition.
    pub fn attribute_paths(&self) -> Vec<(String, &Attribute)> {
        let mut out: Vec<(String, &Attribute)> = self
            .attributes
            .iter()
            .map(|a| (a.name().to_string(), a))
            .collect();
        for column in &self.columns {
            if let Some(nested) = column.nested() {
                for (path, attribute) in nested.attribute_paths() {
                    out.push((format!("{}{PATH_SEPARATOR}{path}", column.name()), attribute));
                }
            }
        }
        out
    }

    pub fn arrow_schema(&self) -> &SchemaRef {
        &self.arrow
    }

    pub fn arrow_fields(&self) -> &Fields {
        self.arrow.fields()
    }

    /// A column descriptor embedding this definition as a sub-table.
    pub fn as_column(self: &Arc<Self>, name: impl Into<String>) -> Column {
        Column::table(name, self)
    }

    /// Start constructing an instance of this definition.
    pub fn builder(self: &Arc<Self>) -> TableBuilder {
        TableBuilder::new(self)
    }

    /// `true` if this definition or any definition nested in it is named
    /// `name`.
    fn embeds_definition(&self, name: &str) -> bool {
        self.name == name
            || self
                .columns
                .iter()
                .filter_map(Column::nested)
                .any(|nested| nested.embeds_definition(name))
    }
}

impl PartialEq for TableSchema {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.same_shape(b))
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", column.name(), column.logical_type())?;
            if column.is_nullable() {
                write!(f, "?")?;
            }
        }
        write!(f, ")")
    }
}

// ============================================================================
// Structural checks over raw Arrow schemas
// ============================================================================

/// Require `actual` to match `expected` field by field: same names, order,
/// nullability and types, recursing into structs and lists. List item
/// names and field metadata are ignored.
pub fn ensure_fields_match(expected: &Fields, actual: &Fields) -> Result<()> {
    fields_diff("", expected, actual).map_or(Ok(()), |msg| Err(Error::SchemaMismatch(msg)))
}

fn fields_diff(prefix: &str, expected: &Fields, actual: &Fields) -> Option<String> {
    if expected.len() != actual.len() {
        let names = |fields: &Fields| {
            fields
                .iter()
                .map(|f| f.name().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        return Some(format!(
            "{}expected columns [{}], found [{}]",
            if prefix.is_empty() {
                String::new()
            } else {
                format!("in '{prefix}': ")
            },
            names(expected),
            names(actual)
        ));
    }
    for (e, a) in expected.iter().zip(actual.iter()) {
        let path = if prefix.is_empty() {
            e.name().clone()
        } else {
            format!("{prefix}{PATH_SEPARATOR}{}", e.name())
        };
        if e.name() != a.name() {
            return Some(format!("expected column '{path}', found '{}'", a.name()));
        }
        if e.is_nullable() != a.is_nullable() {
            return Some(format!(
                "column '{path}' nullability differs: expected {}, found {}",
                e.is_nullable(),
                a.is_nullable()
            ));
        }
        match (e.data_type(), a.data_type()) {
            (DataType::Struct(ef), DataType::Struct(af)) => {
                if let Some(msg) = fields_diff(&path, ef, af) {
                    return Some(msg);
                }
            }
            (et, at) if !data_types_match(et, at) => {
                return Some(format!("column '{path}' expected {et}, found {at}"));
            }
            _ => {}
        }
    }
    None
}

/// Structural equality of two Arrow types, ignoring list item names and
/// field metadata.
pub fn data_types_match(expected: &DataType, actual: &DataType) -> bool {
    match (expected, actual) {
        (DataType::Struct(e), DataType::Struct(a)) => fields_diff("", e, a).is_none(),
        (DataType::List(e), DataType::List(a)) | (DataType::LargeList(e), DataType::LargeList(a)) => {
            e.is_nullable() == a.is_nullable() && data_types_match(e.data_type(), a.data_type())
        }
        (DataType::FixedSizeList(e, en), DataType::FixedSizeList(a, an)) => {
            en == an
                && e.is_nullable() == a.is_nullable()
                && data_types_match(e.data_type(), a.data_type())
        }
        (e, a) => e == a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeValue;
    use crate::types::PrimitiveType;
    use strata_expr::gt;

    fn pair() -> Arc<TableSchema> {
        SchemaBuilder::new("Pair")
            .column(Column::float64("x"))
            .column(Column::float64("y"))
            .build()
            .unwrap()
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = SchemaBuilder::new("Dup")
            .column(Column::int64("a"))
            .column(Column::utf8("a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(ref m) if m.contains("duplicate column 'a'")));
    }

    #[test]
    fn dotted_names_are_rejected() {
        let err = SchemaBuilder::new("D")
            .column(Column::int64("a.b"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn attribute_name_collisions() {
        let err = SchemaBuilder::new("A")
            .column(Column::int64("id"))
            .attribute(Attribute::int("id"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(ref m) if m.contains("collides")));

        let err = SchemaBuilder::new("A")
            .attribute(Attribute::int("k"))
            .attribute(Attribute::string("k"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(ref m) if m.contains("duplicate attribute")));
    }

    #[test]
    fn attribute_defaults_are_coerced_to_kind() {
        let schema = SchemaBuilder::new("A")
            .attribute(Attribute::float("scale").with_default(2))
            .build()
            .unwrap();
        assert_eq!(
            schema.attribute("scale").and_then(|a| a.default_value()),
            Some(&AttributeValue::Float(2.0))
        );
        let err = SchemaBuilder::new("A")
            .attribute(Attribute::int("n").with_default("x"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn nested_fields_follow_declared_order() {
        let outer = SchemaBuilder::new("Outer")
            .column(Column::utf8("label"))
            .column(pair().as_column("pair"))
            .build()
            .unwrap();
        match outer.arrow_fields()[1].data_type() {
            DataType::Struct(children) => {
                let names: Vec<&str> = children.iter().map(|f| f.name().as_str()).collect();
                assert_eq!(names, vec!["x", "y"]);
            }
            other => panic!("expected struct, got {other:?}"),
        }
        let path = outer.resolve_path("pair.y").unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[1].0, 1);
        assert!(matches!(
            outer.resolve_path("pair.z"),
            Err(Error::UnknownColumn(p)) if p == "pair.z"
        ));
        assert!(outer.resolve_path("label.x").is_err());
    }

    #[test]
    fn self_embedding_is_a_cycle() {
        let inner = SchemaBuilder::new("Node")
            .column(Column::int64("v"))
            .build()
            .unwrap();
        let err = SchemaBuilder::new("Node")
            .column(inner.as_column("child"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(ref m) if m.contains("cycle")));

        let middle = SchemaBuilder::new("Middle")
            .column(inner.as_column("node"))
            .build()
            .unwrap();
        let err = SchemaBuilder::new("Node")
            .column(middle.as_column("m"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn equality_is_structural() {
        let a = pair();
        let b = SchemaBuilder::new("OtherName")
            .column(Column::float64("x").with_validator(gt(0)))
            .column(Column::float64("y").with_default(1.0))
            .build()
            .unwrap();
        assert_eq!(*a, *b);
        let c = SchemaBuilder::new("Pair")
            .column(Column::float64("x"))
            .column(Column::float64("y").nullable(true))
            .build()
            .unwrap();
        assert_ne!(*a, *c);
    }

    #[test]
    fn field_check_ignores_list_item_names() {
        let expected = SchemaBuilder::new("L")
            .column(Column::list("v", PrimitiveType::Int32))
            .build()
            .unwrap();
        let renamed = Fields::from(vec![Field::new(
            "v",
            DataType::List(Arc::new(Field::new("element", DataType::Int32, true))),
            false,
        )]);
        ensure_fields_match(expected.arrow_fields(), &renamed).unwrap();

        let wrong = Fields::from(vec![Field::new("v", DataType::Int32, false)]);
        assert!(matches!(
            ensure_fields_match(expected.arrow_fields(), &wrong),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn nested_attribute_paths() {
        let inner = SchemaBuilder::new("Inner")
            .column(Column::int64("v"))
            .attribute(Attribute::int("id"))
            .build()
            .unwrap();
        let outer = SchemaBuilder::new("Outer")
            .column(inner.as_column("inner"))
            .attribute(Attribute::string("label"))
            .build()
            .unwrap();
        let paths: Vec<String> = outer.attribute_paths().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["label".to_string(), "inner.id".to_string()]);
        assert!(outer.attribute("inner.id").is_some());
        assert!(outer.attribute("inner.nope").is_none());
    }
}
