use std::{error::Error, fmt, io, num::TryFromIntError, string::FromUtf8Error};

use crate::tags::{CompressionMethod, PhotometricInterpretation, Predictor, SampleFormat, Tag};

/// Tiff error kinds.
#[derive(Debug)]
pub enum TiffError {
  /// The Image is not formatted properly.
  FormatError(TiffFormatError),

  /// The Decoder does not support features required by the image.
  UnsupportedError(TiffUnsupportedError),

  /// An I/O Error occurred while decoding the image.
  IoError(io::Error),

  /// The Limits of the Decoder is exceeded.
  LimitsExceeded,

  /// An integer conversion to or from a platform size failed, either due to
  /// limits of the platform size or limits of the format.
  IntSizeError,

  /// The image does not support the requested operation
  UsageError(UsageError),
}

/// The image is not formatted properly.
///
/// This indicates that the encoder producing the image might behave incorrectly or that the input
/// file has been corrupted.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TiffFormatError {
  TiffSignatureNotFound,
  TiffSignatureInvalid,
  ImageFileDirectoryNotFound,
  InconsistentSizesEncountered,
  InvalidDimensions(u32, u32),
  InvalidTag,
  InvalidTagValueType(Tag),
  RequiredTagNotFound(Tag),
  UnknownPredictor(u16),
  UnknownPlanarConfiguration(u16),
  ByteExpected,
  UnsignedIntegerExpected,
  SignedIntegerExpected,
  InvalidColorMap,
  CompressedDataCorrupt(String),
  CycleInOffsets,
  SamplesPerPixelIsZero,
  SubsamplingMisaligned { rows_per_chunk: u32, vertical: u16 },
}

impl fmt::Display for TiffFormatError {
  fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
    use self::TiffFormatError::*;
    match *self {
      TiffSignatureNotFound => write!(fmt, "TIFF signature not found."),
      TiffSignatureInvalid => write!(fmt, "TIFF signature invalid."),
      ImageFileDirectoryNotFound => write!(fmt, "Image file directory not found."),
      InconsistentSizesEncountered => write!(fmt, "Inconsistent sizes encountered."),
      InvalidDimensions(width, height) => write!(fmt, "Invalid dimensions: {width}x{height}."),
      InvalidTag => write!(fmt, "Image contains invalid tag."),
      InvalidTagValueType(ref tag) => write!(fmt, "Tag `{tag:?}` did not have the expected value type."),
      RequiredTagNotFound(ref tag) => write!(fmt, "Required tag `{tag:?}` not found."),
      UnknownPredictor(ref predictor) => write!(fmt, "Unknown predictor “{predictor}” encountered"),
      UnknownPlanarConfiguration(ref planar_config) => {
        write!(fmt, "Unknown planar configuration “{planar_config}” encountered")
      }
      ByteExpected => write!(fmt, "Expected byte value."),
      UnsignedIntegerExpected => write!(fmt, "Expected unsigned integer value."),
      SignedIntegerExpected => write!(fmt, "Expected signed integer value."),
      InvalidColorMap => write!(fmt, "ColorMap length does not match BitsPerSample."),
      CompressedDataCorrupt(ref message) => {
        write!(fmt, "Compressed data is corrupt: {message}")
      }
      CycleInOffsets => write!(fmt, "File contained a cycle in the list of IFDs"),
      SamplesPerPixelIsZero => write!(fmt, "Samples per pixel is zero"),
      SubsamplingMisaligned { rows_per_chunk, vertical } => write!(
        fmt,
        "{rows_per_chunk} rows per chunk is not a multiple of the vertical subsampling {vertical}"
      ),
    }
  }
}

/// The Decoder does not support features required by the image.
///
/// This only captures known failures for which the standard either does not require support or an
/// implementation has been planned but not yet completed. Some variants may become unused over
/// time and will then get deprecated before being removed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TiffUnsupportedError {
  FloatingPointPredictor,
  HorizontalPredictor(u16),
  InconsistentBitsPerSample(Vec<u16>),
  InterpretationWithBits(PhotometricInterpretation, u16, u16),
  UnknownInterpretation(u16),
  UnsupportedCompressionMethod(CompressionMethod),
  UnsupportedEncoding(CompressionMethod),
  UnsupportedSampleDepth(u16),
  UnsupportedSampleFormat(Vec<SampleFormat>),
  UnsupportedPredictor(Predictor),
  UnsupportedPlanarYCbCr,
  UnsupportedDataType,
  BigTiff,
}

impl fmt::Display for TiffUnsupportedError {
  fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
    use self::TiffUnsupportedError::*;
    match *self {
      FloatingPointPredictor => write!(fmt, "Floating point predictor is not supported."),
      HorizontalPredictor(bits) => {
        write!(fmt, "Horizontal predictor for {bits} bits per sample is unsupported.")
      }
      InconsistentBitsPerSample(ref bits_per_sample) => {
        write!(fmt, "Inconsistent bits per sample: {bits_per_sample:?}.")
      }
      InterpretationWithBits(ref photometric_interpretation, samples, bits) => write!(
        fmt,
        "{photometric_interpretation:?} with {samples} samples of {bits} bits per sample is unsupported",
      ),
      UnknownInterpretation(code) => {
        write!(fmt, "The image is using an unknown photometric interpretation {code}.")
      }
      UnsupportedCompressionMethod(method) => {
        write!(fmt, "Compression method {method:?} is unsupported")
      }
      UnsupportedEncoding(method) => {
        write!(fmt, "Encoding with compression method {method:?} is unsupported")
      }
      UnsupportedSampleDepth(samples) => write!(fmt, "{samples} bits per sample is unsupported."),
      UnsupportedSampleFormat(ref formats) => {
        write!(fmt, "Sample format {formats:?} is unsupported.")
      }
      UnsupportedPredictor(predictor) => write!(fmt, "Predictor {predictor:?} is unsupported."),
      UnsupportedPlanarYCbCr => write!(fmt, "Planar YCbCr images are unsupported."),
      UnsupportedDataType => write!(fmt, "Unsupported data type."),
      BigTiff => write!(fmt, "BigTIFF files are unsupported."),
    }
  }
}

/// User attempted to use the Decoder or the Document in a way that is incompatible with a
/// specific image.
///
/// For example: writing a document without pages, or handing over a pixel buffer whose sample
/// count does not match its declared dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UsageError {
  NoPages,
  PageIndexOutOfRange(usize, usize),
  EmptySelection,
  InvalidGroupSize,
  BufferSizeMismatch { expected: usize, actual: usize },
  InvalidTileSize(u32, u32),
  InvalidRowsPerStrip,
  ValueTypeMismatch(u16),
}

impl fmt::Display for UsageError {
  fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
    use self::UsageError::*;
    match *self {
      NoPages => write!(fmt, "a TIFF document needs at least one page"),
      PageIndexOutOfRange(index, count) => {
        write!(fmt, "page index {index} is out of range for a document with {count} pages")
      }
      EmptySelection => write!(fmt, "the selection does not contain any existing page"),
      InvalidGroupSize => write!(fmt, "pages can only be split into groups of at least one"),
      BufferSizeMismatch { expected, actual } => {
        write!(fmt, "pixel buffer holds {actual} samples, but its geometry requires {expected}")
      }
      InvalidTileSize(width, length) => {
        write!(fmt, "tile size {width}x{length} is not a non-zero multiple of 16")
      }
      InvalidRowsPerStrip => write!(fmt, "rows per strip must be at least one"),
      ValueTypeMismatch(tag) => write!(fmt, "value for tag {tag} has an unexpected field type"),
    }
  }
}

impl fmt::Display for TiffError {
  fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
    match *self {
      TiffError::FormatError(ref e) => write!(fmt, "Format error: {e}"),
      TiffError::UnsupportedError(ref f) => write!(
        fmt,
        "The Decoder does not support the \
                 image format `{f}`"
      ),
      TiffError::IoError(ref e) => e.fmt(fmt),
      TiffError::LimitsExceeded => write!(fmt, "The Decoder limits are exceeded"),
      TiffError::IntSizeError => write!(fmt, "Platform or format size limits exceeded"),
      TiffError::UsageError(ref e) => write!(fmt, "Usage error: {e}"),
    }
  }
}

impl Error for TiffError {
  fn description(&self) -> &str {
    match *self {
      TiffError::FormatError(..) => "Format error",
      TiffError::UnsupportedError(..) => "Unsupported error",
      TiffError::IoError(..) => "IO error",
      TiffError::LimitsExceeded => "Decoder limits exceeded",
      TiffError::IntSizeError => "Platform or format size limits exceeded",
      TiffError::UsageError(..) => "Invalid usage",
    }
  }

  fn cause(&self) -> Option<&dyn Error> {
    match *self {
      TiffError::IoError(ref e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for TiffError {
  fn from(err: io::Error) -> TiffError {
    TiffError::IoError(err)
  }
}

impl From<FromUtf8Error> for TiffError {
  fn from(_err: FromUtf8Error) -> TiffError {
    TiffError::FormatError(TiffFormatError::InvalidTag)
  }
}

impl From<TiffFormatError> for TiffError {
  fn from(err: TiffFormatError) -> TiffError {
    TiffError::FormatError(err)
  }
}

impl From<TiffUnsupportedError> for TiffError {
  fn from(err: TiffUnsupportedError) -> TiffError {
    TiffError::UnsupportedError(err)
  }
}

impl From<UsageError> for TiffError {
  fn from(err: UsageError) -> TiffError {
    TiffError::UsageError(err)
  }
}

impl From<TryFromIntError> for TiffError {
  fn from(_err: TryFromIntError) -> TiffError {
    TiffError::IntSizeError
  }
}

/// Result of an image decoding/encoding process
pub type TiffResult<T> = Result<T, TiffError>;
