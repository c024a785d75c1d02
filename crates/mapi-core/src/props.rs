use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code carried by a "property does not exist" value.
pub const MAPI_E_NOT_FOUND: u32 = 0x8004_010F;

/// Maximum number of characters returned for a truncated string value.
pub const TABLE_CAP_STRING: usize = 255;
/// Maximum number of bytes returned for a truncated binary value.
pub const TABLE_CAP_BINARY: usize = 255;

/// A MAPI property tag: property id in the high 16 bits, property type in the low 16 bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropTag(pub u32);

impl PropTag {
    pub const PT_SHORT: u16 = 0x0002;
    pub const PT_LONG: u16 = 0x0003;
    pub const PT_FLOAT: u16 = 0x0004;
    pub const PT_DOUBLE: u16 = 0x0005;
    pub const PT_CURRENCY: u16 = 0x0006;
    pub const PT_APPTIME: u16 = 0x0007;
    pub const PT_ERROR: u16 = 0x000A;
    pub const PT_BOOLEAN: u16 = 0x000B;
    pub const PT_LONGLONG: u16 = 0x0014;
    pub const PT_STRING8: u16 = 0x001E;
    pub const PT_UNICODE: u16 = 0x001F;
    pub const PT_SYSTIME: u16 = 0x0040;
    pub const PT_CLSID: u16 = 0x0048;
    pub const PT_BINARY: u16 = 0x0102;
    pub const MV_FLAG: u16 = 0x1000;
    pub const PT_MV_LONG: u16 = Self::MV_FLAG | Self::PT_LONG;
    pub const PT_MV_STRING8: u16 = Self::MV_FLAG | Self::PT_STRING8;
    pub const PT_MV_UNICODE: u16 = Self::MV_FLAG | Self::PT_UNICODE;
    pub const PT_MV_BINARY: u16 = Self::MV_FLAG | Self::PT_BINARY;

    pub const ENTRYID: PropTag = PropTag::new(0x0FFF, Self::PT_BINARY);
    pub const PARENT_ENTRYID: PropTag = PropTag::new(0x0E09, Self::PT_BINARY);
    pub const STORE_ENTRYID: PropTag = PropTag::new(0x0FFB, Self::PT_BINARY);
    pub const STORE_RECORD_KEY: PropTag = PropTag::new(0x0FFA, Self::PT_BINARY);
    pub const RECORD_KEY: PropTag = PropTag::new(0x0FF9, Self::PT_BINARY);
    pub const INSTANCE_KEY: PropTag = PropTag::new(0x0FF6, Self::PT_BINARY);
    pub const ACCESS: PropTag = PropTag::new(0x0FF4, Self::PT_LONG);
    pub const ACCESS_LEVEL: PropTag = PropTag::new(0x0FF7, Self::PT_LONG);
    pub const RIGHTS: PropTag = PropTag::new(0x6639, Self::PT_LONG);
    pub const SOURCE_KEY: PropTag = PropTag::new(0x65E0, Self::PT_BINARY);
    pub const CONTENT_UNREAD: PropTag = PropTag::new(0x3603, Self::PT_LONG);
    pub const MESSAGE_FLAGS: PropTag = PropTag::new(0x0E07, Self::PT_LONG);
    pub const SUBJECT: PropTag = PropTag::new(0x0037, Self::PT_UNICODE);
    pub const SUBJECT_A: PropTag = PropTag::new(0x0037, Self::PT_STRING8);

    #[inline]
    pub const fn new(id: u16, prop_type: u16) -> Self {
        Self(((id as u32) << 16) | prop_type as u32)
    }

    #[inline]
    pub const fn id(self) -> u16 {
        (self.0 >> 16) as u16
    }

    #[inline]
    pub const fn prop_type(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    #[inline]
    pub const fn with_type(self, prop_type: u16) -> Self {
        Self::new(self.id(), prop_type)
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self.prop_type(),
            Self::PT_SHORT | Self::PT_LONG | Self::PT_LONGLONG
        )
    }
}

impl fmt::Debug for PropTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropTag({:#010x})", self.0)
    }
}

/// Collapse the 8-bit and wide string variants of a tag into one cache slot.
pub fn normalize_prop_tag(tag: PropTag) -> PropTag {
    match tag.prop_type() {
        PropTag::PT_STRING8 => tag.with_type(PropTag::PT_UNICODE),
        PropTag::PT_MV_STRING8 => tag.with_type(PropTag::PT_MV_UNICODE),
        _ => tag,
    }
}

const COMPUTED_PROPERTIES: [PropTag; 9] = [
    PropTag::ENTRYID,
    PropTag::PARENT_ENTRYID,
    PropTag::STORE_ENTRYID,
    PropTag::STORE_RECORD_KEY,
    PropTag::RECORD_KEY,
    PropTag::INSTANCE_KEY,
    PropTag::ACCESS,
    PropTag::ACCESS_LEVEL,
    PropTag::RIGHTS,
];

/// Properties derived per request that are never stored in a cell.
///
/// Matches on property id so both string variants and any type of the same id are covered.
pub fn is_computed_property(tag: PropTag) -> bool {
    COMPUTED_PROPERTIES.iter().any(|computed| computed.id() == tag.id())
}

/// Zero the transient flag bytes (`abFlags`) at the front of an entry id.
pub fn normalize_entry_id(entry_id: &mut [u8]) {
    if let Some(flags) = entry_id.get_mut(..4) {
        flags.fill(0);
    }
}

/// A property value without its tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropValue {
    Short(i16),
    Long(i32),
    LongLong(i64),
    Float(f32),
    Double(f64),
    Currency(i64),
    AppTime(f64),
    Boolean(bool),
    SysTime(u64),
    Error(u32),
    String(String),
    Binary(Vec<u8>),
    Clsid([u8; 16]),
    MvLong(Vec<i32>),
    MvString(Vec<String>),
    MvBinary(Vec<Vec<u8>>),
}

impl PropValue {
    /// Number of heap bytes owned by the value.
    pub fn payload_len(&self) -> usize {
        match self {
            PropValue::String(value) => value.len(),
            PropValue::Binary(value) => value.len(),
            PropValue::MvLong(values) => values.len() * std::mem::size_of::<i32>(),
            PropValue::MvString(values) => values
                .iter()
                .map(|value| std::mem::size_of::<String>() + value.len())
                .sum(),
            PropValue::MvBinary(values) => values
                .iter()
                .map(|value| std::mem::size_of::<Vec<u8>>() + value.len())
                .sum(),
            _ => 0,
        }
    }

    fn truncate(&mut self) {
        match self {
            PropValue::String(value) => {
                if let Some((idx, _)) = value.char_indices().nth(TABLE_CAP_STRING) {
                    value.truncate(idx);
                }
            }
            PropValue::Binary(value) => value.truncate(TABLE_CAP_BINARY),
            _ => {}
        }
    }
}

/// A tagged property value as handed to and returned from the cell cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub tag: PropTag,
    pub value: PropValue,
}

impl PropertyValue {
    pub fn new(tag: PropTag, value: PropValue) -> Self {
        Self { tag, value }
    }

    /// The well-formed "property does not exist" answer for `tag`.
    pub fn not_found(tag: PropTag) -> Self {
        Self {
            tag: tag.with_type(PropTag::PT_ERROR),
            value: PropValue::Error(MAPI_E_NOT_FOUND),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.tag.prop_type() == PropTag::PT_ERROR
            && matches!(self.value, PropValue::Error(MAPI_E_NOT_FOUND))
    }

    /// Shorten long strings and binaries to the table column caps.
    pub fn truncated(mut self) -> Self {
        self.value.truncate();
        self
    }
}
