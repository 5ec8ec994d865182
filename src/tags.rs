macro_rules! tags {
  {
    // Permit arbitrary meta items, which include documentation.
    $( #[$enum_attr:meta] )*
    $vis:vis enum $name:ident($ty:tt) $(unknown($unknown_doc:literal))* {
      // Each of the `Name = Val,` permitting documentation.
      $($(#[$ident_attr:meta])* $tag:ident = $val:expr,)*
    }
  } => {
    $( #[$enum_attr] )*
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    #[non_exhaustive]
    pub enum $name {
      $($(#[$ident_attr])* $tag,)*
      $(
        #[doc = $unknown_doc]
        Unknown($ty),
      )*
    }

    impl $name {
      #[inline(always)]
      const fn __from_inner_type(n: $ty) -> Result<Self, $ty> {
        match n {
          $( $val => Ok($name::$tag), )*
          n => Err(n),
        }
      }

      #[inline(always)]
      const fn __to_inner_type(&self) -> $ty {
        match *self {
          $( $name::$tag => $val, )*
          $( $name::Unknown(n) => { $unknown_doc; n }, )*
        }
      }
    }

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
          $( $name::$tag => write!(f, stringify!($tag)), )*
          $( $name::Unknown(n) => { $unknown_doc; write!(f, "{n:#06x}") }, )*
        }
      }
    }

    tags!($name, $ty, $($unknown_doc)*);
  };

  // For u16 tags, provide direct inherent primitive conversion methods.
  ($name:tt, u16, $($unknown_doc:literal)*) => {
    impl $name {
      #[inline(always)]
      pub const fn from_u16(val: u16) -> Option<Self> {
        match Self::__from_inner_type(val) {
          Ok(v) => Some(v),
          Err(_) => None,
        }
      }

      $(
      #[inline(always)]
      pub const fn from_u16_exhaustive(val: u16) -> Self {
        $unknown_doc;
        match Self::__from_inner_type(val) {
          Ok(v) => v,
          Err(n) => $name::Unknown(n),
        }
      }
      )*

      #[inline(always)]
      pub const fn to_u16(&self) -> u16 {
        Self::__to_inner_type(self)
      }
    }

    impl From<$name> for u16 {
      fn from(value: $name) -> u16 {
        value.to_u16()
      }
    }

    $(
    impl From<u16> for $name {
      fn from(raw: u16) -> Self {
        $unknown_doc;
        <$name>::from_u16_exhaustive(raw)
      }
    }
    )*
  };
  // For other tag types, do nothing for now.
  ($name:tt, $ty:tt, $($unknown_doc:literal)*) => {};
}

// Note: These tags appear in the order they are mentioned in the TIFF reference
tags! {
/// TIFF tags of the main image directory namespace.
///
/// EXIF, GPS and Interoperability directories have their own numbering; their tags are looked up
/// through [`registry`](crate::registry) by directory kind instead.
pub enum Tag(u16) unknown("A private or extension tag") {
  // Baseline tags:
  NewSubfileType = 254,
  SubfileType = 255,
  ImageWidth = 256,
  ImageLength = 257,
  BitsPerSample = 258,
  Compression = 259,
  PhotometricInterpretation = 262,
  Threshholding = 263,
  CellWidth = 264,
  CellLength = 265,
  FillOrder = 266,
  DocumentName = 269,
  ImageDescription = 270,
  Make = 271,
  Model = 272,
  StripOffsets = 273,
  Orientation = 274,
  SamplesPerPixel = 277,
  RowsPerStrip = 278,
  StripByteCounts = 279,
  MinSampleValue = 280,
  MaxSampleValue = 281,
  XResolution = 282,
  YResolution = 283,
  PlanarConfiguration = 284,
  PageName = 285,
  XPosition = 286,
  YPosition = 287,
  FreeOffsets = 288,
  FreeByteCounts = 289,
  GrayResponseUnit = 290,
  GrayResponseCurve = 291,
  T4Options = 292,
  T6Options = 293,
  ResolutionUnit = 296,
  PageNumber = 297,
  TransferFunction = 301,
  Software = 305,
  DateTime = 306,
  Artist = 315,
  HostComputer = 316,
  // Advanced tags
  Predictor = 317,
  WhitePoint = 318,
  PrimaryChromaticities = 319,
  ColorMap = 320,
  HalftoneHints = 321,
  TileWidth = 322,
  TileLength = 323,
  TileOffsets = 324,
  TileByteCounts = 325,
  SubIfds = 330,
  InkSet = 332,
  InkNames = 333,
  NumberOfInks = 334,
  DotRange = 336,
  TargetPrinter = 337,
  ExtraSamples = 338,
  // Data Sample Format
  SampleFormat = 339,
  SMinSampleValue = 340,
  SMaxSampleValue = 341,
  TransferRange = 342,
  // JPEG
  JPEGTables = 347,
  JPEGProc = 512,
  JPEGInterchangeFormat = 513,
  JPEGInterchangeFormatLength = 514,
  // YCbCr
  YCbCrCoefficients = 529,
  YCbCrSubSampling = 530,
  YCbCrPositioning = 531,
  ReferenceBlackWhite = 532,
  // Metadata carriers
  Xmp = 700,
  Copyright = 33432,
  Iptc = 33723,
  Photoshop = 34377,
  ExifIfd = 34665,
  IccProfile = 34675,
  GpsIfd = 34853,
  InteropIfd = 40965,
  // Windows Explorer properties, UTF-16LE in BYTE fields
  XPTitle = 0x9c9b,
  XPComment = 0x9c9c,
  XPAuthor = 0x9c9d,
  XPKeywords = 0x9c9e,
  XPSubject = 0x9c9f,
}
}

tags! {
/// The type of an IFD entry (a 2 byte field).
pub enum Type(u16) {
  /// 8-bit unsigned integer
  BYTE = 1,
  /// 8-bit byte that contains a 7-bit ASCII code; the last byte must be zero
  ASCII = 2,
  /// 16-bit unsigned integer
  SHORT = 3,
  /// 32-bit unsigned integer
  LONG = 4,
  /// Fraction stored as two 32-bit unsigned integers
  RATIONAL = 5,
  /// 8-bit signed integer
  SBYTE = 6,
  /// 8-bit byte that may contain anything, depending on the field
  UNDEFINED = 7,
  /// 16-bit signed integer
  SSHORT = 8,
  /// 32-bit signed integer
  SLONG = 9,
  /// Fraction stored as two 32-bit signed integers
  SRATIONAL = 10,
  /// 32-bit IEEE floating point
  FLOAT = 11,
  /// 64-bit IEEE floating point
  DOUBLE = 12,
  /// 32-bit unsigned integer (offset)
  IFD = 13,
}
}

impl Type {
  /// Returns the size of the type in bytes.
  pub const fn size(&self) -> usize {
    match self {
      Type::BYTE | Type::ASCII | Type::SBYTE | Type::UNDEFINED => 1,
      Type::SHORT | Type::SSHORT => 2,
      Type::LONG | Type::SLONG | Type::FLOAT | Type::IFD => 4,
      Type::RATIONAL | Type::SRATIONAL | Type::DOUBLE => 8,
    }
  }
}

tags! {
/// See [TIFF compression tags](https://www.awaresystems.be/imaging/tiff/tifftags/compression.html)
/// for reference.
pub enum CompressionMethod(u16) unknown("A custom compression method") {
  None = 1,
  /// CCITT modified Huffman run length encoding
  Huffman = 2,
  Fax3 = 3,
  Fax4 = 4,
  LZW = 5,
  JPEG = 6,
  // "Extended JPEG" or "new JPEG" style
  ModernJPEG = 7,
  Deflate = 8,
  OldDeflate = 0x80B2,
  PackBits = 0x8005,
}
}

tags! {
pub enum PhotometricInterpretation(u16) unknown("Unknown photometric interpretation") {
  WhiteIsZero = 0,
  BlackIsZero = 1,
  RGB = 2,
  RGBPalette = 3,
  TransparencyMask = 4,
  CMYK = 5,
  YCbCr = 6,
  CIELab = 8,
  ICCLab = 9,
  ITULab = 10,
}
}

tags! {
pub enum PlanarConfiguration(u16) {
  Chunky = 1,
  Planar = 2,
}
}

tags! {
pub enum Predictor(u16) {
  /// No changes were made to the data
  None = 1,
  /// The images' rows were processed to contain the difference of each pixel from the previous one.
  ///
  /// This means that instead of having in order `[r1, g1. b1, r2, g2 ...]` you will find
  /// `[r1, g1, b1, r2-r1, g2-g1, b2-b1, r3-r2, g3-g2, ...]`
  Horizontal = 2,
  /// Not currently supported
  FloatingPoint = 3,
}
}

tags! {
/// Bit order within a byte of the stored (compressed) data.
pub enum FillOrder(u16) {
  /// Most significant bit first, the TIFF default
  MsbToLsb = 1,
  /// Least significant bit first, common for fax data
  LsbToMsb = 2,
}
}

tags! {
/// Type to represent resolution units
pub enum ResolutionUnit(u16) {
  None = 1,
  Inch = 2,
  Centimeter = 3,
}
}

tags! {
pub enum SampleFormat(u16) unknown("An unknown extension sample format") {
  Uint = 1,
  Int = 2,
  IEEEFP = 3,
  Void = 4,
}
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tags_round_trip_through_u16() {
    assert_eq!(Tag::from_u16(297), Some(Tag::PageNumber));
    assert_eq!(Tag::PageNumber.to_u16(), 297);
    assert_eq!(Tag::from_u16_exhaustive(65000), Tag::Unknown(65000));
    assert_eq!(u16::from(Tag::Unknown(65000)), 65000);
  }

  #[test]
  fn compression_aliases() {
    assert_eq!(CompressionMethod::from_u16(8), Some(CompressionMethod::Deflate));
    assert_eq!(CompressionMethod::from_u16(32946), Some(CompressionMethod::OldDeflate));
    assert_eq!(CompressionMethod::from_u16(32773), Some(CompressionMethod::PackBits));
  }

  #[test]
  fn type_sizes() {
    assert_eq!(Type::ASCII.size(), 1);
    assert_eq!(Type::SSHORT.size(), 2);
    assert_eq!(Type::IFD.size(), 4);
    assert_eq!(Type::SRATIONAL.size(), 8);
    assert_eq!(Type::from_u16(16), None);
  }

  #[test]
  fn unknown_tags_display_as_hex() {
    assert_eq!(Tag::Unknown(0xc612).to_string(), "0xc612");
    assert_eq!(Tag::StripOffsets.to_string(), "StripOffsets");
  }
}
