//! Column type metadata.
//!
//! Describes the declared type of every column in a result page and parses
//! the ROWS metadata block:
//! ```text
//! ┌───────┬───────────────┬──────────────────┬──────────────────┬─────────────┐
//! │ Flags │ Columns count │ Paging state     │ Global table spec│ Column specs│
//! │ [int] │ [int]         │ [bytes] if 0x0002│ if 0x0001        │ unless 0x0004
//! └───────┴───────────────┴──────────────────┴──────────────────┴─────────────┘
//! ```

use bytes::BufMut;

use super::frame::{PagingState, PagingStateResponse};
use super::wire_format::{
    read_bytes_opt, read_int_length, read_short, read_short_length, read_string, rows_flags,
    type_ids, write_bytes, write_int, write_short, write_string,
};
use crate::error::ProtocolError;

/// Declared wire type of a column, a collection element or a UDT field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Custom(String),
    Ascii,
    Boolean,
    Blob,
    Counter,
    Date,
    Decimal,
    Double,
    Duration,
    Float,
    Int,
    BigInt,
    Text,
    Timestamp,
    Inet,
    List(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Set(Box<ColumnType>),
    UserDefinedType {
        keyspace: String,
        type_name: String,
        field_types: Vec<(String, ColumnType)>,
    },
    SmallInt,
    TinyInt,
    Time,
    Timeuuid,
    Tuple(Vec<ColumnType>),
    Uuid,
    Varint,
}

impl ColumnType {
    /// Parse an `[option]` type description.
    pub fn deserialize(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        use ColumnType::*;

        let id = read_short(buf)?;
        Ok(match id {
            type_ids::CUSTOM => Custom(read_string(buf)?.to_owned()),
            type_ids::ASCII => Ascii,
            type_ids::BIGINT => BigInt,
            type_ids::BLOB => Blob,
            type_ids::BOOLEAN => Boolean,
            type_ids::COUNTER => Counter,
            type_ids::DECIMAL => Decimal,
            type_ids::DOUBLE => Double,
            type_ids::FLOAT => Float,
            type_ids::INT => Int,
            type_ids::TIMESTAMP => Timestamp,
            type_ids::UUID => Uuid,
            type_ids::VARCHAR => Text,
            type_ids::VARINT => Varint,
            type_ids::TIMEUUID => Timeuuid,
            type_ids::INET => Inet,
            type_ids::DATE => Date,
            type_ids::TIME => Time,
            type_ids::SMALLINT => SmallInt,
            type_ids::TINYINT => TinyInt,
            type_ids::DURATION => Duration,
            type_ids::LIST => List(Box::new(Self::deserialize(buf)?)),
            type_ids::MAP => {
                let key = Self::deserialize(buf)?;
                let value = Self::deserialize(buf)?;
                Map(Box::new(key), Box::new(value))
            }
            type_ids::SET => Set(Box::new(Self::deserialize(buf)?)),
            type_ids::UDT => {
                let keyspace = read_string(buf)?.to_owned();
                let type_name = read_string(buf)?.to_owned();
                let fields_count = read_short_length(buf)?;
                let mut field_types = Vec::with_capacity(fields_count);
                for _ in 0..fields_count {
                    let name = read_string(buf)?.to_owned();
                    let typ = Self::deserialize(buf)?;
                    field_types.push((name, typ));
                }
                UserDefinedType {
                    keyspace,
                    type_name,
                    field_types,
                }
            }
            type_ids::TUPLE => {
                let len = read_short_length(buf)?;
                let mut types = Vec::with_capacity(len);
                for _ in 0..len {
                    types.push(Self::deserialize(buf)?);
                }
                Tuple(types)
            }
            other => return Err(ProtocolError::UnknownTypeId(other)),
        })
    }

    /// Write this type as an `[option]`.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        use ColumnType::*;

        match self {
            Custom(class) => {
                write_short(type_ids::CUSTOM, buf);
                write_string(class, buf);
            }
            Ascii => write_short(type_ids::ASCII, buf),
            BigInt => write_short(type_ids::BIGINT, buf),
            Blob => write_short(type_ids::BLOB, buf),
            Boolean => write_short(type_ids::BOOLEAN, buf),
            Counter => write_short(type_ids::COUNTER, buf),
            Decimal => write_short(type_ids::DECIMAL, buf),
            Double => write_short(type_ids::DOUBLE, buf),
            Float => write_short(type_ids::FLOAT, buf),
            Int => write_short(type_ids::INT, buf),
            Timestamp => write_short(type_ids::TIMESTAMP, buf),
            Uuid => write_short(type_ids::UUID, buf),
            Text => write_short(type_ids::VARCHAR, buf),
            Varint => write_short(type_ids::VARINT, buf),
            Timeuuid => write_short(type_ids::TIMEUUID, buf),
            Inet => write_short(type_ids::INET, buf),
            Date => write_short(type_ids::DATE, buf),
            Time => write_short(type_ids::TIME, buf),
            SmallInt => write_short(type_ids::SMALLINT, buf),
            TinyInt => write_short(type_ids::TINYINT, buf),
            Duration => write_short(type_ids::DURATION, buf),
            List(elem) => {
                write_short(type_ids::LIST, buf);
                elem.serialize(buf);
            }
            Map(key, value) => {
                write_short(type_ids::MAP, buf);
                key.serialize(buf);
                value.serialize(buf);
            }
            Set(elem) => {
                write_short(type_ids::SET, buf);
                elem.serialize(buf);
            }
            UserDefinedType {
                keyspace,
                type_name,
                field_types,
            } => {
                write_short(type_ids::UDT, buf);
                write_string(keyspace, buf);
                write_string(type_name, buf);
                write_short(field_types.len() as u16, buf);
                for (name, typ) in field_types {
                    write_string(name, buf);
                    typ.serialize(buf);
                }
            }
            Tuple(types) => {
                write_short(type_ids::TUPLE, buf);
                write_short(types.len() as u16, buf);
                for typ in types {
                    typ.serialize(buf);
                }
            }
        }
    }

    /// Whether a zero-length value of this type means "empty" rather than a
    /// legitimate zero-length payload.
    pub fn supports_empty(&self) -> bool {
        !matches!(
            self,
            ColumnType::Ascii | ColumnType::Blob | ColumnType::Text | ColumnType::Custom(_)
        )
    }
}

/// Keyspace and table a column belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TableSpec {
    pub ks_name: String,
    pub table_name: String,
}

impl TableSpec {
    pub fn new(ks_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            ks_name: ks_name.into(),
            table_name: table_name.into(),
        }
    }

    fn deserialize(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        let ks_name = read_string(buf)?.to_owned();
        let table_name = read_string(buf)?.to_owned();
        Ok(Self {
            ks_name,
            table_name,
        })
    }
}

/// Name and declared type of one result column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    pub table_spec: TableSpec,
    pub name: String,
    pub typ: ColumnType,
}

impl ColumnSpec {
    /// Create a column spec without table information.
    pub fn new(name: impl Into<String>, typ: ColumnType) -> Self {
        Self {
            table_spec: TableSpec::default(),
            name: name.into(),
            typ,
        }
    }

    /// Set the table this column belongs to.
    pub fn with_table_spec(mut self, table_spec: TableSpec) -> Self {
        self.table_spec = table_spec;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn typ(&self) -> &ColumnType {
        &self.typ
    }
}

/// Borrowed view of a page's column specs with lookup helpers.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpecs<'a> {
    specs: &'a [ColumnSpec],
}

impl<'a> ColumnSpecs<'a> {
    pub fn new(specs: &'a [ColumnSpec]) -> Self {
        Self { specs }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get_by_index(&self, index: usize) -> Option<&'a ColumnSpec> {
        self.specs.get(index)
    }

    /// Find a column by name, returning its index as well.
    pub fn get_by_name(&self, name: &str) -> Option<(usize, &'a ColumnSpec)> {
        self.specs
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'a, ColumnSpec> {
        self.specs.iter()
    }

    pub fn as_slice(&self) -> &'a [ColumnSpec] {
        self.specs
    }
}

/// Column metadata of one ROWS result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMetadata {
    col_count: usize,
    col_specs: Vec<ColumnSpec>,
}

impl ResultMetadata {
    /// Create metadata from a list of column specs.
    pub fn new(col_specs: Vec<ColumnSpec>) -> Self {
        Self {
            col_count: col_specs.len(),
            col_specs,
        }
    }

    /// Metadata announcing `col_count` columns without describing them
    /// (the server sent NO_METADATA).
    pub fn without_specs(col_count: usize) -> Self {
        Self {
            col_count,
            col_specs: Vec::new(),
        }
    }

    #[inline]
    pub fn col_count(&self) -> usize {
        self.col_count
    }

    #[inline]
    pub fn col_specs(&self) -> &[ColumnSpec] {
        &self.col_specs
    }

    #[inline]
    pub fn column_specs(&self) -> ColumnSpecs<'_> {
        ColumnSpecs::new(&self.col_specs)
    }

    /// Whether the column specs were sent along with the count.
    #[inline]
    pub fn has_specs(&self) -> bool {
        self.col_specs.len() == self.col_count
    }

    /// Parse the metadata block of a ROWS result body.
    pub fn deserialize(buf: &mut &[u8]) -> Result<(Self, PagingStateResponse), ProtocolError> {
        let flags = super::wire_format::read_int(buf)?;
        let col_count = read_int_length(buf)?;

        let paging_state = if rows_flags::has_flag(flags, rows_flags::HAS_MORE_PAGES) {
            let raw = read_bytes_opt(buf)?.unwrap_or_default();
            PagingStateResponse::HasMorePages {
                state: PagingState::new_from_raw_bytes(raw),
            }
        } else {
            PagingStateResponse::NoMorePages
        };

        if rows_flags::has_flag(flags, rows_flags::NO_METADATA) {
            return Ok((Self::without_specs(col_count), paging_state));
        }

        let global_table_spec = if rows_flags::has_flag(flags, rows_flags::GLOBAL_TABLES_SPEC) {
            Some(TableSpec::deserialize(buf)?)
        } else {
            None
        };

        let mut col_specs = Vec::with_capacity(col_count.min(buf.len()));
        for _ in 0..col_count {
            let table_spec = match &global_table_spec {
                Some(spec) => spec.clone(),
                None => TableSpec::deserialize(buf)?,
            };
            let name = read_string(buf)?.to_owned();
            let typ = ColumnType::deserialize(buf)?;
            col_specs.push(ColumnSpec {
                table_spec,
                name,
                typ,
            });
        }

        Ok((
            Self {
                col_count,
                col_specs,
            },
            paging_state,
        ))
    }

    /// Write this metadata block. A global table spec is used when every
    /// column shares the same table.
    pub fn serialize(&self, paging_state: &PagingStateResponse, buf: &mut impl BufMut) {
        let global_spec = match self.col_specs.split_first() {
            Some((first, rest)) if rest.iter().all(|s| s.table_spec == first.table_spec) => {
                Some(&first.table_spec)
            }
            _ => None,
        };

        let mut flags = 0;
        if global_spec.is_some() {
            flags |= rows_flags::GLOBAL_TABLES_SPEC;
        }
        if !paging_state.finished() {
            flags |= rows_flags::HAS_MORE_PAGES;
        }
        if !self.has_specs() {
            flags = rows_flags::NO_METADATA | (flags & rows_flags::HAS_MORE_PAGES);
        }

        write_int(flags, buf);
        write_int(self.col_count as i32, buf);
        if let PagingStateResponse::HasMorePages { state } = paging_state {
            write_bytes(state.as_bytes_slice().unwrap_or_default(), buf);
        }
        if !self.has_specs() {
            return;
        }
        if let Some(spec) = global_spec {
            write_string(&spec.ks_name, buf);
            write_string(&spec.table_name, buf);
        }
        for spec in &self.col_specs {
            if global_spec.is_none() {
                write_string(&spec.table_spec.ks_name, buf);
                write_string(&spec.table_spec.table_name, buf);
            }
            write_string(&spec.name, buf);
            spec.typ.serialize(buf);
        }
    }
}

impl From<Vec<ColumnSpec>> for ResultMetadata {
    fn from(col_specs: Vec<ColumnSpec>) -> Self {
        Self::new(col_specs)
    }
}
