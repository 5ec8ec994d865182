//! In-memory model of Image File Directories.
//!
//! A document keeps all of its directories in one [`IfdArena`]. Pages and child directories
//! refer to each other by [`IfdId`], so the directory graph never holds references and can be
//! traversed or re-serialized in any order.

use std::{borrow::Cow, collections::BTreeMap};

use crate::{
  bytecast,
  decoder::ByteOrder,
  registry::{self, DirectoryKind},
  tags::{Tag, Type},
  TiffError, TiffFormatError, TiffResult,
};

/// Fraction stored as two 32-bit unsigned integers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
  pub n: u32,
  pub d: u32,
}

/// Fraction stored as two 32-bit signed integers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SRational {
  pub n: i32,
  pub d: i32,
}

/// The payload of a field, one variant per TIFF field type.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  Byte(Vec<u8>),
  /// Text bytes as stored, without the terminating NUL. Embedded NULs separate multiple strings.
  /// Producers are not required to write UTF-8, so the bytes are kept verbatim.
  Ascii(Vec<u8>),
  Short(Vec<u16>),
  Long(Vec<u32>),
  Rational(Vec<Rational>),
  SByte(Vec<i8>),
  Undefined(Vec<u8>),
  SShort(Vec<i16>),
  SLong(Vec<i32>),
  SRational(Vec<SRational>),
  Float(Vec<f32>),
  Double(Vec<f64>),
  /// Offsets of child directories, typed as `IFD`
  Ifd(Vec<u32>),
}

impl Value {
  pub fn field_type(&self) -> Type {
    match self {
      Value::Byte(_) => Type::BYTE,
      Value::Ascii(_) => Type::ASCII,
      Value::Short(_) => Type::SHORT,
      Value::Long(_) => Type::LONG,
      Value::Rational(_) => Type::RATIONAL,
      Value::SByte(_) => Type::SBYTE,
      Value::Undefined(_) => Type::UNDEFINED,
      Value::SShort(_) => Type::SSHORT,
      Value::SLong(_) => Type::SLONG,
      Value::SRational(_) => Type::SRATIONAL,
      Value::Float(_) => Type::FLOAT,
      Value::Double(_) => Type::DOUBLE,
      Value::Ifd(_) => Type::IFD,
    }
  }

  /// Number of elements, as stored in the count field of the directory entry.
  pub fn count(&self) -> usize {
    match self {
      Value::Byte(v) | Value::Undefined(v) => v.len(),
      Value::Ascii(text) => text.len() + 1,
      Value::Short(v) => v.len(),
      Value::Long(v) | Value::Ifd(v) => v.len(),
      Value::Rational(v) => v.len(),
      Value::SByte(v) => v.len(),
      Value::SShort(v) => v.len(),
      Value::SLong(v) => v.len(),
      Value::SRational(v) => v.len(),
      Value::Float(v) => v.len(),
      Value::Double(v) => v.len(),
    }
  }

  pub fn byte_len(&self) -> usize {
    self.count() * self.field_type().size()
  }

  /// Values of at most four bytes live in the value slot of the entry itself.
  pub fn is_inline(&self) -> bool {
    self.byte_len() <= 4
  }

  /// Encodes the value as it appears in a stream of the given byte order.
  pub fn to_bytes(&self, byte_order: ByteOrder) -> Vec<u8> {
    match self {
      Value::Byte(v) | Value::Undefined(v) => v.clone(),
      Value::Ascii(text) => {
        let mut bytes = text.clone();
        bytes.push(0);
        bytes
      }
      Value::Short(v) => bytecast::u16_into_bytes(v, byte_order),
      Value::Long(v) | Value::Ifd(v) => bytecast::u32_into_bytes(v, byte_order),
      Value::Rational(v) => {
        let flat: Vec<u32> = v.iter().flat_map(|r| [r.n, r.d]).collect();
        bytecast::u32_into_bytes(&flat, byte_order)
      }
      Value::SByte(v) => v.iter().map(|b| *b as u8).collect(),
      Value::SShort(v) => {
        let raw: Vec<u16> = v.iter().map(|s| *s as u16).collect();
        bytecast::u16_into_bytes(&raw, byte_order)
      }
      Value::SLong(v) => {
        let raw: Vec<u32> = v.iter().map(|s| *s as u32).collect();
        bytecast::u32_into_bytes(&raw, byte_order)
      }
      Value::SRational(v) => {
        let flat: Vec<u32> = v.iter().flat_map(|r| [r.n as u32, r.d as u32]).collect();
        bytecast::u32_into_bytes(&flat, byte_order)
      }
      Value::Float(v) => bytecast::f32_into_bytes(v, byte_order),
      Value::Double(v) => bytecast::f64_into_bytes(v, byte_order),
    }
  }

  /// Decodes `count` elements of `type_` from raw bytes in the given byte order.
  pub fn from_bytes(type_: Type, bytes: &[u8], byte_order: ByteOrder) -> Value {
    match type_ {
      Type::BYTE => Value::Byte(bytes.to_vec()),
      Type::UNDEFINED => Value::Undefined(bytes.to_vec()),
      Type::ASCII => {
        let text = bytes.strip_suffix(&[0]).unwrap_or(bytes);
        Value::Ascii(text.to_vec())
      }
      Type::SHORT => Value::Short(bytecast::u16_from_bytes(bytes, byte_order)),
      Type::LONG => Value::Long(bytecast::u32_from_bytes(bytes, byte_order)),
      Type::IFD => Value::Ifd(bytecast::u32_from_bytes(bytes, byte_order)),
      Type::RATIONAL => Value::Rational(
        bytecast::u32_from_bytes(bytes, byte_order)
          .chunks_exact(2)
          .map(|p| Rational { n: p[0], d: p[1] })
          .collect(),
      ),
      Type::SBYTE => Value::SByte(bytes.iter().map(|b| *b as i8).collect()),
      Type::SSHORT => Value::SShort(
        bytecast::u16_from_bytes(bytes, byte_order).into_iter().map(|v| v as i16).collect(),
      ),
      Type::SLONG => Value::SLong(
        bytecast::u32_from_bytes(bytes, byte_order).into_iter().map(|v| v as i32).collect(),
      ),
      Type::SRATIONAL => Value::SRational(
        bytecast::u32_from_bytes(bytes, byte_order)
          .chunks_exact(2)
          .map(|p| SRational { n: p[0] as i32, d: p[1] as i32 })
          .collect(),
      ),
      Type::FLOAT => Value::Float(bytecast::f32_from_bytes(bytes, byte_order)),
      Type::DOUBLE => Value::Double(bytecast::f64_from_bytes(bytes, byte_order)),
    }
  }

  /// Widens any unsigned integer value to `u32`s.
  pub fn to_u32_vec(&self) -> TiffResult<Vec<u32>> {
    match self {
      Value::Byte(v) => Ok(v.iter().map(|b| u32::from(*b)).collect()),
      Value::Short(v) => Ok(v.iter().map(|s| u32::from(*s)).collect()),
      Value::Long(v) | Value::Ifd(v) => Ok(v.clone()),
      _ => Err(TiffError::FormatError(TiffFormatError::UnsignedIntegerExpected)),
    }
  }

  pub fn to_u32(&self) -> TiffResult<u32> {
    self
      .to_u32_vec()?
      .first()
      .copied()
      .ok_or(TiffError::FormatError(TiffFormatError::UnsignedIntegerExpected))
  }

  pub fn to_u16(&self) -> TiffResult<u16> {
    Ok(u16::try_from(self.to_u32()?)?)
  }

  pub fn as_bytes(&self) -> Option<&[u8]> {
    match self {
      Value::Byte(v) | Value::Undefined(v) => Some(v),
      _ => None,
    }
  }

  /// The text of an `ASCII` value, if it is valid UTF-8. Trailing NUL padding is dropped.
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Ascii(text) => std::str::from_utf8(text).ok().map(|s| s.trim_end_matches('\0')),
      _ => None,
    }
  }

  pub fn to_str_lossy(&self) -> Option<Cow<'_, str>> {
    match self {
      Value::Ascii(text) => Some(String::from_utf8_lossy(text)),
      _ => None,
    }
  }

  /// Builds the UTF-16LE `BYTE` payload Windows Explorer uses for its XP* properties.
  pub fn from_xp_string(text: &str) -> Value {
    let mut bytes: Vec<u8> = text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect();
    bytes.extend_from_slice(&[0, 0]);
    Value::Byte(bytes)
  }

  /// Reads back a UTF-16LE XP* property, stopping at the terminating NUL.
  pub fn as_xp_string(&self) -> Option<String> {
    let bytes = self.as_bytes()?;
    let units: Vec<u16> = bytes
      .chunks_exact(2)
      .map(|p| u16::from_le_bytes([p[0], p[1]]))
      .take_while(|unit| *unit != 0)
      .collect();
    Some(String::from_utf16_lossy(&units))
  }
}

/// A tagged, typed directory entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
  pub tag: u16,
  pub value: Value,
}

impl Field {
  pub fn new(tag: impl Into<u16>, value: Value) -> Field {
    Field { tag: tag.into(), value }
  }

  pub fn field_type(&self) -> Type {
    self.value.field_type()
  }

  pub fn count(&self) -> usize {
    self.value.count()
  }

  /// Renders the field with the name and formatter registered for the directory kind.
  pub fn describe(&self, kind: DirectoryKind) -> String {
    match registry::lookup(kind, self.tag) {
      Some(info) => format!("{}: {}", info.name, (info.format)(&self.value)),
      None => format!("{:#06x}: {}", self.tag, registry::format_generic(&self.value)),
    }
  }
}

/// Index of a directory inside an [`IfdArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IfdId(usize);

/// Whether a page stores its pixels in strips or tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkLayout {
  Strips,
  Tiles,
}

impl ChunkLayout {
  /// The (offsets, byte counts) tag pair locating the chunks in the stream.
  pub fn tags(self) -> (Tag, Tag) {
    match self {
      ChunkLayout::Strips => (Tag::StripOffsets, Tag::StripByteCounts),
      ChunkLayout::Tiles => (Tag::TileOffsets, Tag::TileByteCounts),
    }
  }
}

/// Compressed strips or tiles exactly as they are stored in the stream.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
  pub layout: ChunkLayout,
  pub chunks: Vec<Vec<u8>>,
}

/// Opaque metadata blobs a directory can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metadata {
  Xmp,
  Iptc,
  Icc,
  Photoshop,
}

impl Metadata {
  pub fn tag(self) -> Tag {
    match self {
      Metadata::Xmp => Tag::Xmp,
      Metadata::Iptc => Tag::Iptc,
      Metadata::Icc => Tag::IccProfile,
      Metadata::Photoshop => Tag::Photoshop,
    }
  }

  fn field_type(self) -> Type {
    match self {
      Metadata::Xmp | Metadata::Photoshop => Type::BYTE,
      Metadata::Iptc | Metadata::Icc => Type::UNDEFINED,
    }
  }
}

/// One Image File Directory.
#[derive(Clone, Debug)]
pub struct Ifd {
  pub kind: DirectoryKind,
  fields: BTreeMap<u16, Field>,
  children: BTreeMap<u16, Vec<IfdId>>,
  pub payload: Option<Payload>,
  /// Old-style JPEG interchange stream (a thumbnail in most files), copied but never decoded.
  pub jpeg_interchange: Option<Vec<u8>>,
  /// Where the directory started in the stream it was read from.
  pub start_offset: Option<u64>,
}

impl Ifd {
  pub fn new(kind: DirectoryKind) -> Ifd {
    Ifd {
      kind,
      fields: BTreeMap::new(),
      children: BTreeMap::new(),
      payload: None,
      jpeg_interchange: None,
      start_offset: None,
    }
  }

  /// Inserts a field, replacing any previous field with the same tag.
  pub fn insert(&mut self, field: Field) -> Option<Field> {
    self.fields.insert(field.tag, field)
  }

  pub fn set(&mut self, tag: impl Into<u16>, value: Value) -> Option<Field> {
    self.insert(Field::new(tag, value))
  }

  pub fn remove(&mut self, tag: impl Into<u16>) -> Option<Field> {
    self.fields.remove(&tag.into())
  }

  pub fn get(&self, tag: impl Into<u16>) -> Option<&Field> {
    self.fields.get(&tag.into())
  }

  pub fn value(&self, tag: impl Into<u16>) -> Option<&Value> {
    self.get(tag).map(|f| &f.value)
  }

  pub fn contains(&self, tag: impl Into<u16>) -> bool {
    self.fields.contains_key(&tag.into())
  }

  /// Fields in ascending tag order, the order they are written in.
  pub fn fields(&self) -> impl Iterator<Item = &Field> {
    self.fields.values()
  }

  pub fn len(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  pub fn children(&self) -> impl Iterator<Item = (u16, &[IfdId])> {
    self.children.iter().map(|(tag, ids)| (*tag, ids.as_slice()))
  }

  pub fn children_of(&self, tag: impl Into<u16>) -> &[IfdId] {
    self.children.get(&tag.into()).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn attach_child(&mut self, tag: impl Into<u16>, child: IfdId) {
    self.children.entry(tag.into()).or_default().push(child);
  }

  pub fn detach_children(&mut self, tag: impl Into<u16>) -> Vec<IfdId> {
    self.children.remove(&tag.into()).unwrap_or_default()
  }

  pub fn metadata(&self, kind: Metadata) -> Option<&[u8]> {
    self.value(kind.tag()).and_then(Value::as_bytes)
  }

  pub fn set_metadata(&mut self, kind: Metadata, blob: Vec<u8>) {
    let value = match kind.field_type() {
      Type::BYTE => Value::Byte(blob),
      _ => Value::Undefined(blob),
    };
    self.set(kind.tag(), value);
  }
}

/// Owner of every directory of a document.
#[derive(Clone, Debug, Default)]
pub struct IfdArena {
  dirs: Vec<Ifd>,
}

impl IfdArena {
  pub fn new() -> IfdArena {
    IfdArena::default()
  }

  pub fn push(&mut self, ifd: Ifd) -> IfdId {
    self.dirs.push(ifd);
    IfdId(self.dirs.len() - 1)
  }

  pub fn get(&self, id: IfdId) -> &Ifd {
    &self.dirs[id.0]
  }

  pub fn get_mut(&mut self, id: IfdId) -> &mut Ifd {
    &mut self.dirs[id.0]
  }

  pub fn len(&self) -> usize {
    self.dirs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dirs.is_empty()
  }

  /// Deep-copies the directory `id` of `source` and all of its descendants into this arena.
  ///
  /// `map_ifd` sees every copied directory once, after its children have been re-linked, and
  /// may rewrite it (the document uses this to convert pixel payloads between byte orders).
  pub fn import_tree<F>(&mut self, source: &IfdArena, id: IfdId, map_ifd: &mut F) -> TiffResult<IfdId>
  where
    F: FnMut(&mut Ifd) -> TiffResult<()>,
  {
    let original = source.get(id);
    let mut copy = original.clone();
    copy.children.clear();
    for (tag, ids) in original.children() {
      for child in ids {
        let imported = self.import_tree(source, *child, map_ifd)?;
        copy.attach_child(tag, imported);
      }
    }
    copy.start_offset = None;
    map_ifd(&mut copy)?;
    Ok(self.push(copy))
  }
}
