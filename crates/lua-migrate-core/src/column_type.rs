//! The catalogue of abstract column types.

use std::fmt;
use std::str::FromStr;

/// Coarse classification of a column type.
///
/// The category selects the rendering template of a column: primary-key
/// types use a short template without length, nullability or default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Auto-increment primary keys.
    Pk,
    /// Character data.
    String,
    /// Integers, decimals, floats, booleans and money.
    Numeric,
    /// Dates and times.
    Time,
    /// Everything else.
    Other,
}

impl Category {
    /// Returns the category name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pk => "pk",
            Self::String => "string",
            Self::Numeric => "numeric",
            Self::Time => "time",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An abstract column type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Pk,
    UPk,
    BigPk,
    UBigPk,
    Char,
    String,
    Text,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Decimal,
    DateTime,
    Timestamp,
    Time,
    Date,
    Binary,
    Bool,
    Money,
}

impl ColumnType {
    /// Every supported type, in catalogue order.
    pub const ALL: [Self; 21] = [
        Self::Pk,
        Self::UPk,
        Self::BigPk,
        Self::UBigPk,
        Self::Char,
        Self::String,
        Self::Text,
        Self::TinyInt,
        Self::SmallInt,
        Self::Integer,
        Self::BigInt,
        Self::Float,
        Self::Double,
        Self::Decimal,
        Self::DateTime,
        Self::Timestamp,
        Self::Time,
        Self::Date,
        Self::Binary,
        Self::Bool,
        Self::Money,
    ];

    /// Returns the tag used in column definitions.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Pk => "pk",
            Self::UPk => "upk",
            Self::BigPk => "bigpk",
            Self::UBigPk => "ubigpk",
            Self::Char => "char",
            Self::String => "string",
            Self::Text => "text",
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Float => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::DateTime => "datetime",
            Self::Timestamp => "timestamp",
            Self::Time => "time",
            Self::Date => "date",
            Self::Binary => "binary",
            Self::Bool => "bool",
            Self::Money => "money",
        }
    }

    /// Returns the type category.
    #[must_use]
    pub const fn category(self) -> Category {
        match self {
            Self::Pk | Self::UPk | Self::BigPk | Self::UBigPk => Category::Pk,
            Self::Char | Self::String | Self::Text => Category::String,
            Self::TinyInt
            | Self::SmallInt
            | Self::Integer
            | Self::BigInt
            | Self::Float
            | Self::Double
            | Self::Decimal
            | Self::Bool
            | Self::Money => Category::Numeric,
            Self::DateTime | Self::Timestamp | Self::Time | Self::Date => Category::Time,
            Self::Binary => Category::Other,
        }
    }

    /// Returns the default length components, if the type has any.
    #[must_use]
    pub const fn default_size(self) -> &'static [u32] {
        match self {
            Self::String => &[255],
            Self::Integer | Self::Decimal | Self::Money => &[12],
            Self::BigInt => &[20],
            Self::SmallInt => &[2],
            Self::Timestamp => &[11],
            _ => &[],
        }
    }

    /// Returns the unsigned variant of a primary-key type.
    ///
    /// Every other type is returned unchanged.
    #[must_use]
    pub const fn unsigned(self) -> Self {
        match self {
            Self::Pk => Self::UPk,
            Self::BigPk => Self::UBigPk,
            other => other,
        }
    }

    /// Returns true if this is a primary-key type.
    #[must_use]
    pub const fn is_pk(self) -> bool {
        matches!(self.category(), Category::Pk)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ColumnType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.tag() == s).ok_or(())
    }
}

/// Returns true if `tag` names a supported column type.
#[must_use]
pub fn check(tag: &str) -> bool {
    tag.parse::<ColumnType>().is_ok()
}

/// Returns the category of `tag`, [`Category::Other`] when it is unknown.
#[must_use]
pub fn category(tag: &str) -> Category {
    tag.parse::<ColumnType>()
        .map_or(Category::Other, ColumnType::category)
}

/// Returns the default size of `tag`, empty when it is unknown or has none.
#[must_use]
pub fn default_size(tag: &str) -> &'static [u32] {
    tag.parse::<ColumnType>()
        .map_or(&[], ColumnType::default_size)
}
