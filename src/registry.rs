//! Static tag tables for the four directory namespaces.
//!
//! Main image directories, EXIF, GPS and Interoperability directories number their tags
//! independently, so every lookup is keyed by [`DirectoryKind`]. Each table is sorted by tag and
//! searched with a binary search; nothing here is ever mutated.

use crate::{
  ifd::Value,
  tags::{
    CompressionMethod, FillOrder, PhotometricInterpretation, PlanarConfiguration, Predictor,
    ResolutionUnit, Type,
  },
};

/// The tag namespace a directory belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirectoryKind {
  Main,
  Exif,
  Gps,
  Interop,
}

/// Field types a tag is allowed to carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpectedType {
  Exact(Type),
  /// `SHORT` or `LONG`, chosen by the producer
  Unsigned,
  /// Offsets to sub-directories, `LONG` or `IFD`
  Offset,
  /// UTF-16LE text stored as `BYTE`
  XpString,
  /// `BYTE` or `UNDEFINED` blobs
  Blob,
  Any,
}

impl ExpectedType {
  pub fn accepts(self, type_: Type) -> bool {
    match self {
      ExpectedType::Exact(t) => t == type_,
      ExpectedType::Unsigned => matches!(type_, Type::SHORT | Type::LONG),
      ExpectedType::Offset => matches!(type_, Type::LONG | Type::IFD),
      ExpectedType::XpString => type_ == Type::BYTE,
      ExpectedType::Blob => matches!(type_, Type::BYTE | Type::UNDEFINED),
      ExpectedType::Any => true,
    }
  }
}

/// How the engine treats a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagClass {
  Baseline,
  Extended,
  /// Points at child directories of the given kind
  SubDirectory(DirectoryKind),
  /// Locates pixel data; rewritten by the writer
  Payload,
  /// Opaque metadata blob
  Metadata,
}

pub type Formatter = fn(&Value) -> String;

#[derive(Clone, Copy)]
pub struct TagInfo {
  pub tag: u16,
  pub name: &'static str,
  pub expected: ExpectedType,
  pub class: TagClass,
  pub format: Formatter,
}

impl std::fmt::Debug for TagInfo {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TagInfo")
      .field("tag", &self.tag)
      .field("name", &self.name)
      .field("expected", &self.expected)
      .field("class", &self.class)
      .finish()
  }
}

const fn t(
  tag: u16, name: &'static str, expected: ExpectedType, class: TagClass, format: Formatter,
) -> TagInfo {
  TagInfo { tag, name, expected, class, format }
}

use self::{DirectoryKind as K, ExpectedType as E, TagClass as C};

const BYTE: E = E::Exact(Type::BYTE);
const ASCII: E = E::Exact(Type::ASCII);
const SHORT: E = E::Exact(Type::SHORT);
const LONG: E = E::Exact(Type::LONG);
const RATIONAL: E = E::Exact(Type::RATIONAL);
const SRATIONAL: E = E::Exact(Type::SRATIONAL);
const UNDEFINED: E = E::Exact(Type::UNDEFINED);

#[rustfmt::skip]
static MAIN: &[TagInfo] = &[
  t(254, "NewSubfileType", LONG, C::Baseline, format_generic),
  t(255, "SubfileType", SHORT, C::Baseline, format_generic),
  t(256, "ImageWidth", E::Unsigned, C::Baseline, format_generic),
  t(257, "ImageLength", E::Unsigned, C::Baseline, format_generic),
  t(258, "BitsPerSample", SHORT, C::Baseline, format_generic),
  t(259, "Compression", SHORT, C::Baseline, format_compression),
  t(262, "PhotometricInterpretation", SHORT, C::Baseline, format_photometric),
  t(263, "Threshholding", SHORT, C::Baseline, format_generic),
  t(264, "CellWidth", SHORT, C::Baseline, format_generic),
  t(265, "CellLength", SHORT, C::Baseline, format_generic),
  t(266, "FillOrder", SHORT, C::Baseline, format_fill_order),
  t(269, "DocumentName", ASCII, C::Extended, format_generic),
  t(270, "ImageDescription", ASCII, C::Baseline, format_generic),
  t(271, "Make", ASCII, C::Baseline, format_generic),
  t(272, "Model", ASCII, C::Baseline, format_generic),
  t(273, "StripOffsets", E::Unsigned, C::Payload, format_generic),
  t(274, "Orientation", SHORT, C::Baseline, format_generic),
  t(277, "SamplesPerPixel", SHORT, C::Baseline, format_generic),
  t(278, "RowsPerStrip", E::Unsigned, C::Baseline, format_generic),
  t(279, "StripByteCounts", E::Unsigned, C::Payload, format_generic),
  t(280, "MinSampleValue", SHORT, C::Baseline, format_generic),
  t(281, "MaxSampleValue", SHORT, C::Baseline, format_generic),
  t(282, "XResolution", RATIONAL, C::Baseline, format_generic),
  t(283, "YResolution", RATIONAL, C::Baseline, format_generic),
  t(284, "PlanarConfiguration", SHORT, C::Baseline, format_planar),
  t(285, "PageName", ASCII, C::Extended, format_generic),
  t(286, "XPosition", RATIONAL, C::Extended, format_generic),
  t(287, "YPosition", RATIONAL, C::Extended, format_generic),
  t(288, "FreeOffsets", LONG, C::Baseline, format_generic),
  t(289, "FreeByteCounts", LONG, C::Baseline, format_generic),
  t(290, "GrayResponseUnit", SHORT, C::Baseline, format_generic),
  t(291, "GrayResponseCurve", SHORT, C::Baseline, format_generic),
  t(292, "T4Options", LONG, C::Extended, format_hex),
  t(293, "T6Options", LONG, C::Extended, format_hex),
  t(296, "ResolutionUnit", SHORT, C::Baseline, format_resolution_unit),
  t(297, "PageNumber", SHORT, C::Extended, format_page_number),
  t(301, "TransferFunction", SHORT, C::Extended, format_generic),
  t(305, "Software", ASCII, C::Baseline, format_generic),
  t(306, "DateTime", ASCII, C::Baseline, format_generic),
  t(315, "Artist", ASCII, C::Baseline, format_generic),
  t(316, "HostComputer", ASCII, C::Baseline, format_generic),
  t(317, "Predictor", SHORT, C::Extended, format_predictor),
  t(318, "WhitePoint", RATIONAL, C::Extended, format_generic),
  t(319, "PrimaryChromaticities", RATIONAL, C::Extended, format_generic),
  t(320, "ColorMap", SHORT, C::Baseline, format_generic),
  t(321, "HalftoneHints", SHORT, C::Extended, format_generic),
  t(322, "TileWidth", E::Unsigned, C::Extended, format_generic),
  t(323, "TileLength", E::Unsigned, C::Extended, format_generic),
  t(324, "TileOffsets", E::Unsigned, C::Payload, format_generic),
  t(325, "TileByteCounts", E::Unsigned, C::Payload, format_generic),
  t(330, "SubIFDs", E::Offset, C::SubDirectory(K::Main), format_hex),
  t(332, "InkSet", SHORT, C::Extended, format_generic),
  t(333, "InkNames", ASCII, C::Extended, format_generic),
  t(334, "NumberOfInks", SHORT, C::Extended, format_generic),
  t(336, "DotRange", E::Any, C::Extended, format_generic),
  t(337, "TargetPrinter", ASCII, C::Extended, format_generic),
  t(338, "ExtraSamples", SHORT, C::Baseline, format_generic),
  t(339, "SampleFormat", SHORT, C::Extended, format_generic),
  t(340, "SMinSampleValue", E::Any, C::Extended, format_generic),
  t(341, "SMaxSampleValue", E::Any, C::Extended, format_generic),
  t(342, "TransferRange", SHORT, C::Extended, format_generic),
  t(347, "JPEGTables", UNDEFINED, C::Extended, format_generic),
  t(512, "JPEGProc", SHORT, C::Extended, format_generic),
  t(513, "JPEGInterchangeFormat", LONG, C::Payload, format_hex),
  t(514, "JPEGInterchangeFormatLength", LONG, C::Payload, format_generic),
  t(529, "YCbCrCoefficients", RATIONAL, C::Extended, format_generic),
  t(530, "YCbCrSubSampling", SHORT, C::Extended, format_generic),
  t(531, "YCbCrPositioning", SHORT, C::Extended, format_generic),
  t(532, "ReferenceBlackWhite", RATIONAL, C::Extended, format_generic),
  t(700, "XMP", E::Blob, C::Metadata, format_generic),
  t(33432, "Copyright", ASCII, C::Baseline, format_generic),
  t(33723, "IPTC", E::Any, C::Metadata, format_generic),
  t(34377, "Photoshop", E::Blob, C::Metadata, format_generic),
  t(34665, "ExifIFD", E::Offset, C::SubDirectory(K::Exif), format_hex),
  t(34675, "ICCProfile", UNDEFINED, C::Metadata, format_generic),
  t(34853, "GPSIFD", E::Offset, C::SubDirectory(K::Gps), format_hex),
  t(0x9c9b, "XPTitle", E::XpString, C::Extended, format_xp_string),
  t(0x9c9c, "XPComment", E::XpString, C::Extended, format_xp_string),
  t(0x9c9d, "XPAuthor", E::XpString, C::Extended, format_xp_string),
  t(0x9c9e, "XPKeywords", E::XpString, C::Extended, format_xp_string),
  t(0x9c9f, "XPSubject", E::XpString, C::Extended, format_xp_string),
  t(40965, "InteroperabilityIFD", E::Offset, C::SubDirectory(K::Interop), format_hex),
];

#[rustfmt::skip]
static EXIF: &[TagInfo] = &[
  t(0x829a, "ExposureTime", RATIONAL, C::Extended, format_generic),
  t(0x829d, "FNumber", RATIONAL, C::Extended, format_generic),
  t(0x8822, "ExposureProgram", SHORT, C::Extended, format_generic),
  t(0x8824, "SpectralSensitivity", ASCII, C::Extended, format_generic),
  t(0x8827, "ISOSpeedRatings", SHORT, C::Extended, format_generic),
  t(0x9000, "ExifVersion", UNDEFINED, C::Extended, format_version),
  t(0x9003, "DateTimeOriginal", ASCII, C::Extended, format_generic),
  t(0x9004, "DateTimeDigitized", ASCII, C::Extended, format_generic),
  t(0x9101, "ComponentsConfiguration", UNDEFINED, C::Extended, format_generic),
  t(0x9102, "CompressedBitsPerPixel", RATIONAL, C::Extended, format_generic),
  t(0x9201, "ShutterSpeedValue", SRATIONAL, C::Extended, format_generic),
  t(0x9202, "ApertureValue", RATIONAL, C::Extended, format_generic),
  t(0x9203, "BrightnessValue", SRATIONAL, C::Extended, format_generic),
  t(0x9204, "ExposureBiasValue", SRATIONAL, C::Extended, format_generic),
  t(0x9205, "MaxApertureValue", RATIONAL, C::Extended, format_generic),
  t(0x9206, "SubjectDistance", RATIONAL, C::Extended, format_generic),
  t(0x9207, "MeteringMode", SHORT, C::Extended, format_generic),
  t(0x9208, "LightSource", SHORT, C::Extended, format_generic),
  t(0x9209, "Flash", SHORT, C::Extended, format_hex),
  t(0x920a, "FocalLength", RATIONAL, C::Extended, format_generic),
  t(0x927c, "MakerNote", UNDEFINED, C::Metadata, format_generic),
  t(0x9286, "UserComment", UNDEFINED, C::Extended, format_generic),
  t(0x9290, "SubSecTime", ASCII, C::Extended, format_generic),
  t(0x9291, "SubSecTimeOriginal", ASCII, C::Extended, format_generic),
  t(0x9292, "SubSecTimeDigitized", ASCII, C::Extended, format_generic),
  t(0xa000, "FlashpixVersion", UNDEFINED, C::Extended, format_version),
  t(0xa001, "ColorSpace", SHORT, C::Extended, format_generic),
  t(0xa002, "PixelXDimension", E::Unsigned, C::Extended, format_generic),
  t(0xa003, "PixelYDimension", E::Unsigned, C::Extended, format_generic),
  t(0xa004, "RelatedSoundFile", ASCII, C::Extended, format_generic),
  t(0xa005, "InteroperabilityIFD", E::Offset, C::SubDirectory(K::Interop), format_hex),
  t(0xa20e, "FocalPlaneXResolution", RATIONAL, C::Extended, format_generic),
  t(0xa20f, "FocalPlaneYResolution", RATIONAL, C::Extended, format_generic),
  t(0xa210, "FocalPlaneResolutionUnit", SHORT, C::Extended, format_resolution_unit),
  t(0xa217, "SensingMethod", SHORT, C::Extended, format_generic),
  t(0xa300, "FileSource", UNDEFINED, C::Extended, format_generic),
  t(0xa301, "SceneType", UNDEFINED, C::Extended, format_generic),
  t(0xa401, "CustomRendered", SHORT, C::Extended, format_generic),
  t(0xa402, "ExposureMode", SHORT, C::Extended, format_generic),
  t(0xa403, "WhiteBalance", SHORT, C::Extended, format_generic),
  t(0xa404, "DigitalZoomRatio", RATIONAL, C::Extended, format_generic),
  t(0xa405, "FocalLengthIn35mmFilm", SHORT, C::Extended, format_generic),
  t(0xa406, "SceneCaptureType", SHORT, C::Extended, format_generic),
  t(0xa420, "ImageUniqueID", ASCII, C::Extended, format_generic),
  t(0xa432, "LensSpecification", RATIONAL, C::Extended, format_generic),
  t(0xa433, "LensMake", ASCII, C::Extended, format_generic),
  t(0xa434, "LensModel", ASCII, C::Extended, format_generic),
];

#[rustfmt::skip]
static GPS: &[TagInfo] = &[
  t(0, "GPSVersionID", BYTE, C::Extended, format_generic),
  t(1, "GPSLatitudeRef", ASCII, C::Extended, format_generic),
  t(2, "GPSLatitude", RATIONAL, C::Extended, format_generic),
  t(3, "GPSLongitudeRef", ASCII, C::Extended, format_generic),
  t(4, "GPSLongitude", RATIONAL, C::Extended, format_generic),
  t(5, "GPSAltitudeRef", BYTE, C::Extended, format_generic),
  t(6, "GPSAltitude", RATIONAL, C::Extended, format_generic),
  t(7, "GPSTimeStamp", RATIONAL, C::Extended, format_generic),
  t(8, "GPSSatellites", ASCII, C::Extended, format_generic),
  t(9, "GPSStatus", ASCII, C::Extended, format_generic),
  t(10, "GPSMeasureMode", ASCII, C::Extended, format_generic),
  t(11, "GPSDOP", RATIONAL, C::Extended, format_generic),
  t(12, "GPSSpeedRef", ASCII, C::Extended, format_generic),
  t(13, "GPSSpeed", RATIONAL, C::Extended, format_generic),
  t(14, "GPSTrackRef", ASCII, C::Extended, format_generic),
  t(15, "GPSTrack", RATIONAL, C::Extended, format_generic),
  t(16, "GPSImgDirectionRef", ASCII, C::Extended, format_generic),
  t(17, "GPSImgDirection", RATIONAL, C::Extended, format_generic),
  t(18, "GPSMapDatum", ASCII, C::Extended, format_generic),
  t(19, "GPSDestLatitudeRef", ASCII, C::Extended, format_generic),
  t(20, "GPSDestLatitude", RATIONAL, C::Extended, format_generic),
  t(21, "GPSDestLongitudeRef", ASCII, C::Extended, format_generic),
  t(22, "GPSDestLongitude", RATIONAL, C::Extended, format_generic),
  t(23, "GPSDestBearingRef", ASCII, C::Extended, format_generic),
  t(24, "GPSDestBearing", RATIONAL, C::Extended, format_generic),
  t(25, "GPSDestDistanceRef", ASCII, C::Extended, format_generic),
  t(26, "GPSDestDistance", RATIONAL, C::Extended, format_generic),
  t(27, "GPSProcessingMethod", UNDEFINED, C::Extended, format_generic),
  t(28, "GPSAreaInformation", UNDEFINED, C::Extended, format_generic),
  t(29, "GPSDateStamp", ASCII, C::Extended, format_generic),
  t(30, "GPSDifferential", SHORT, C::Extended, format_generic),
];

#[rustfmt::skip]
static INTEROP: &[TagInfo] = &[
  t(0x0001, "InteroperabilityIndex", ASCII, C::Extended, format_generic),
  t(0x0002, "InteroperabilityVersion", UNDEFINED, C::Extended, format_version),
  t(0x1000, "RelatedImageFileFormat", ASCII, C::Extended, format_generic),
  t(0x1001, "RelatedImageWidth", E::Unsigned, C::Extended, format_generic),
  t(0x1002, "RelatedImageLength", E::Unsigned, C::Extended, format_generic),
];

impl DirectoryKind {
  pub fn table(self) -> &'static [TagInfo] {
    match self {
      DirectoryKind::Main => MAIN,
      DirectoryKind::Exif => EXIF,
      DirectoryKind::Gps => GPS,
      DirectoryKind::Interop => INTEROP,
    }
  }
}

pub fn lookup(kind: DirectoryKind, tag: u16) -> Option<&'static TagInfo> {
  let table = kind.table();
  table.binary_search_by_key(&tag, |info| info.tag).ok().map(|i| &table[i])
}

/// The kind of directory a field of `parent` points to, if the tag is a sub-directory pointer.
pub fn child_kind(parent: DirectoryKind, tag: u16) -> Option<DirectoryKind> {
  match lookup(parent, tag)?.class {
    TagClass::SubDirectory(kind) => Some(kind),
    _ => None,
  }
}

/// Whether `value` has a field type the tag is registered with. Unregistered tags accept anything.
pub fn accepts(kind: DirectoryKind, tag: u16, value: &Value) -> bool {
  lookup(kind, tag).map_or(true, |info| info.expected.accepts(value.field_type()))
}

const MAX_LISTED: usize = 16;

fn join<T: ToString>(items: &[T]) -> String {
  let mut out: Vec<String> = items.iter().take(MAX_LISTED).map(T::to_string).collect();
  if items.len() > MAX_LISTED {
    out.push(format!("... ({} values)", items.len()));
  }
  out.join(", ")
}

/// Renders any value without tag-specific knowledge.
pub fn format_generic(value: &Value) -> String {
  match value {
    Value::Byte(v) | Value::Undefined(v) if v.len() > MAX_LISTED => format!("<{} bytes>", v.len()),
    Value::Byte(v) | Value::Undefined(v) => join(v),
    Value::Ascii(text) => format!("{:?}", String::from_utf8_lossy(text).trim_end_matches('\0')),
    Value::Short(v) => join(v),
    Value::Long(v) => join(v),
    Value::Ifd(v) => join(v),
    Value::Rational(v) => {
      join(&v.iter().map(|r| format!("{}/{}", r.n, r.d)).collect::<Vec<_>>())
    }
    Value::SByte(v) => join(v),
    Value::SShort(v) => join(v),
    Value::SLong(v) => join(v),
    Value::SRational(v) => {
      join(&v.iter().map(|r| format!("{}/{}", r.n, r.d)).collect::<Vec<_>>())
    }
    Value::Float(v) => join(v),
    Value::Double(v) => join(v),
  }
}

fn format_hex(value: &Value) -> String {
  match value.to_u32_vec() {
    Ok(v) => join(&v.iter().map(|n| format!("{n:#x}")).collect::<Vec<_>>()),
    Err(_) => format_generic(value),
  }
}

fn format_code<T: std::fmt::Debug>(value: &Value, name: fn(u16) -> Option<T>) -> String {
  match value.to_u16() {
    Ok(code) => match name(code) {
      Some(known) => format!("{known:?} ({code})"),
      None => format!("unknown ({code})"),
    },
    Err(_) => format_generic(value),
  }
}

fn format_compression(value: &Value) -> String {
  format_code(value, CompressionMethod::from_u16)
}

fn format_photometric(value: &Value) -> String {
  format_code(value, PhotometricInterpretation::from_u16)
}

fn format_planar(value: &Value) -> String {
  format_code(value, PlanarConfiguration::from_u16)
}

fn format_predictor(value: &Value) -> String {
  format_code(value, Predictor::from_u16)
}

fn format_fill_order(value: &Value) -> String {
  format_code(value, FillOrder::from_u16)
}

fn format_resolution_unit(value: &Value) -> String {
  format_code(value, ResolutionUnit::from_u16)
}

fn format_page_number(value: &Value) -> String {
  match value.to_u32_vec().as_deref() {
    Ok([page, last]) => format!("page {} of {}", page + 1, last + 1),
    _ => format_generic(value),
  }
}

fn format_version(value: &Value) -> String {
  match value.as_bytes() {
    Some(bytes) if bytes.iter().all(u8::is_ascii_graphic) => {
      String::from_utf8_lossy(bytes).into_owned()
    }
    _ => format_generic(value),
  }
}

fn format_xp_string(value: &Value) -> String {
  match value.as_xp_string() {
    Some(text) => format!("{text:?}"),
    None => format_generic(value),
  }
}
