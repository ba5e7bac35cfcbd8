//! The flat column schema distilled from the file metadata.

use parquet_format_safe::{FieldRepetitionType, SchemaElement, Type};

use crate::error::{fmt_err, ParquetResult};

/// The physical types the reader materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalType {
    Boolean,
    Int32,
    Int64,
    /// 12-byte opaque value, commonly a legacy timestamp.
    Int96,
    Float,
    Double,
    ByteArray,
    /// Carries the schema-declared value length.
    FixedLenByteArray(usize),
}

/// One leaf column of the file, in metadata order.
#[derive(Debug, Clone)]
pub struct Column {
    /// Stable zero-based id: the element's ordinal after the root.
    pub id: usize,
    pub name: String,
    pub physical_type: PhysicalType,
}

fn physical_type(element: &SchemaElement) -> ParquetResult<PhysicalType> {
    let typ = element.type_.ok_or_else(|| {
        fmt_err!(
            NestedNotSupported,
            "schema element '{}' has no physical type",
            element.name
        )
    })?;
    Ok(match typ {
        Type::BOOLEAN => PhysicalType::Boolean,
        Type::INT32 => PhysicalType::Int32,
        Type::INT64 => PhysicalType::Int64,
        Type::INT96 => PhysicalType::Int96,
        Type::FLOAT => PhysicalType::Float,
        Type::DOUBLE => PhysicalType::Double,
        Type::BYTE_ARRAY => PhysicalType::ByteArray,
        Type::FIXED_LEN_BYTE_ARRAY => {
            let length = element.type_length.ok_or_else(|| {
                fmt_err!(
                    UnsupportedType,
                    "fixed length byte array column '{}' has no declared length",
                    element.name
                )
            })?;
            if length <= 0 {
                return Err(fmt_err!(
                    UnsupportedType,
                    "fixed length byte array column '{}' declares length {length}",
                    element.name
                ));
            }
            PhysicalType::FixedLenByteArray(length as usize)
        }
        other => {
            return Err(fmt_err!(
                UnsupportedType,
                "unknown physical type {other:?} on column '{}'",
                element.name
            ))
        }
    })
}

/// Validates the schema and produces the leaf columns. The root element is
/// discarded; every other element must be a flat optional leaf.
pub(crate) fn columns_from_schema(schema: &[SchemaElement]) -> ParquetResult<Vec<Column>> {
    if schema.len() < 2 {
        return Err(fmt_err!(
            NestedNotSupported,
            "the schema carries no columns"
        ));
    }
    let root = &schema[0];
    if root.num_children.unwrap_or(0) as usize != schema.len() - 1 {
        return Err(fmt_err!(
            NestedNotSupported,
            "only flat schemas are supported"
        ));
    }

    let mut columns = Vec::with_capacity(schema.len() - 1);
    for (id, element) in schema[1..].iter().enumerate() {
        if element.num_children.unwrap_or(0) > 0 {
            return Err(fmt_err!(
                NestedNotSupported,
                "column '{}' has children",
                element.name
            ));
        }
        let physical_type = physical_type(element)?;
        match element.repetition_type {
            Some(FieldRepetitionType::OPTIONAL) => {}
            _ => {
                return Err(fmt_err!(
                    NonOptionalNotSupported,
                    "column '{}' is not optional",
                    element.name
                ))
            }
        }
        columns.push(Column {
            id,
            name: element.name.clone(),
            physical_type,
        });
    }
    Ok(columns)
}
