//! Column variants and descriptors as seen by the grid

use serde::{Deserialize, Serialize};

use crate::ColumnMeta;

/// The data variant of a column, used to pick filter operators and input editors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnVariant {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    Uuid,
    Json,
    Binary,
    Enumerated,
    Unsupported,
}

impl ColumnVariant {
    /// All variants, in declaration order
    pub const ALL: [ColumnVariant; 12] = [
        ColumnVariant::Text,
        ColumnVariant::Integer,
        ColumnVariant::Float,
        ColumnVariant::Boolean,
        ColumnVariant::Date,
        ColumnVariant::DateTime,
        ColumnVariant::Time,
        ColumnVariant::Uuid,
        ColumnVariant::Json,
        ColumnVariant::Binary,
        ColumnVariant::Enumerated,
        ColumnVariant::Unsupported,
    ];

    /// Classify a database type name into a variant.
    ///
    /// Accepts the spellings used by PostgreSQL, MySQL and SQLite, with or without
    /// length/precision suffixes (`VARCHAR(255)`, `NUMERIC(10,2)`, `ENUM('a','b')`).
    /// Anything not recognized is `Unsupported`.
    pub fn from_data_type(data_type: &str) -> Self {
        let lower = data_type.trim().to_lowercase();
        let base = lower
            .split(['(', '['])
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches(" unsigned");

        if base.starts_with("enum") || base == "set" {
            return ColumnVariant::Enumerated;
        }

        match base {
            "tinyint" if lower.starts_with("tinyint(1)") => ColumnVariant::Boolean,
            "bool" | "boolean" | "bit" => ColumnVariant::Boolean,
            "smallint" | "int2" | "integer" | "int" | "int4" | "bigint" | "int8"
            | "tinyint" | "mediumint" | "serial" | "bigserial" | "smallserial" => {
                ColumnVariant::Integer
            }
            "real" | "float" | "float4" | "float8" | "double" | "double precision"
            | "numeric" | "decimal" | "money" => ColumnVariant::Float,
            "date" => ColumnVariant::Date,
            "timestamp" | "timestamptz" | "datetime" | "timestamp with time zone"
            | "timestamp without time zone" => ColumnVariant::DateTime,
            "time" | "timetz" | "time with time zone" | "time without time zone" => {
                ColumnVariant::Time
            }
            "uuid" | "uniqueidentifier" => ColumnVariant::Uuid,
            "json" | "jsonb" => ColumnVariant::Json,
            "blob" | "bytea" | "binary" | "varbinary" | "tinyblob" | "mediumblob"
            | "longblob" => ColumnVariant::Binary,
            "text" | "varchar" | "character varying" | "char" | "character" | "bpchar"
            | "nvarchar" | "nchar" | "tinytext" | "mediumtext" | "longtext" | "string"
            | "citext" | "name" | "clob" => ColumnVariant::Text,
            _ => ColumnVariant::Unsupported,
        }
    }

    /// Whether a column of this variant can take part in filters and sorting
    pub fn is_filterable(&self) -> bool {
        !matches!(self, ColumnVariant::Unsupported)
    }

    /// Variants compared with `<`, `>` and `BETWEEN`
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            ColumnVariant::Integer
                | ColumnVariant::Float
                | ColumnVariant::Date
                | ColumnVariant::DateTime
                | ColumnVariant::Time
        )
    }

    /// Variants compared as free text (`LIKE` and friends)
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            ColumnVariant::Text
                | ColumnVariant::Uuid
                | ColumnVariant::Json
                | ColumnVariant::Enumerated
        )
    }

    /// Temporal variants
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ColumnVariant::Date | ColumnVariant::DateTime | ColumnVariant::Time
        )
    }
}

impl std::fmt::Display for ColumnVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnVariant::Text => "text",
            ColumnVariant::Integer => "integer",
            ColumnVariant::Float => "float",
            ColumnVariant::Boolean => "boolean",
            ColumnVariant::Date => "date",
            ColumnVariant::DateTime => "dateTime",
            ColumnVariant::Time => "time",
            ColumnVariant::Uuid => "uuid",
            ColumnVariant::Json => "json",
            ColumnVariant::Binary => "binary",
            ColumnVariant::Enumerated => "enumerated",
            ColumnVariant::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// A column as the grid sees it. Immutable after schema discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub id: String,
    pub variant: ColumnVariant,
    pub label: String,
}

impl ColumnDescriptor {
    pub fn new(id: impl Into<String>, variant: ColumnVariant) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            variant,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Build a descriptor from driver column metadata.
    ///
    /// Columns reporting enum values are always `Enumerated`, whatever their type name.
    pub fn from_meta(meta: &ColumnMeta) -> Self {
        let variant = if meta.enum_values.as_ref().is_some_and(|v| !v.is_empty()) {
            ColumnVariant::Enumerated
        } else {
            ColumnVariant::from_data_type(&meta.data_type)
        };
        Self::new(meta.name.clone(), variant)
    }

    pub fn is_filterable(&self) -> bool {
        self.variant.is_filterable()
    }
}
