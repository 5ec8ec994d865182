//! Decoded pixels, as produced by page decoding and accepted when building new pages.

use crate::{
  bytecast,
  decoder::ByteOrder,
  tags::{PhotometricInterpretation, PlanarConfiguration, SampleFormat},
  TiffError, TiffFormatError, TiffResult, TiffUnsupportedError, UsageError,
};

/// Sample storage, one variant per supported sample width.
///
/// Depths below 8 bits are kept packed in `U8`, most significant bit first, with every row
/// starting on a byte boundary. Signed integer samples keep their bit pattern in the unsigned
/// variant of the same width.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleData {
  U8(Vec<u8>),
  U16(Vec<u16>),
  U32(Vec<u32>),
  F32(Vec<f32>),
  F64(Vec<f64>),
}

impl SampleData {
  /// Number of stored elements; packed bytes for sub-byte depths.
  pub fn len(&self) -> usize {
    match self {
      SampleData::U8(v) => v.len(),
      SampleData::U16(v) => v.len(),
      SampleData::U32(v) => v.len(),
      SampleData::F32(v) => v.len(),
      SampleData::F64(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn bits(&self) -> u16 {
    match self {
      SampleData::U8(_) => 8,
      SampleData::U16(_) => 16,
      SampleData::U32(_) | SampleData::F32(_) => 32,
      SampleData::F64(_) => 64,
    }
  }

  /// Serializes the samples in `byte_order`.
  pub fn to_bytes(&self, byte_order: ByteOrder) -> Vec<u8> {
    match self {
      SampleData::U8(v) => v.clone(),
      SampleData::U16(v) => bytecast::u16_into_bytes(v, byte_order),
      SampleData::U32(v) => bytecast::u32_into_bytes(v, byte_order),
      SampleData::F32(v) => bytecast::f32_into_bytes(v, byte_order),
      SampleData::F64(v) => bytecast::f64_into_bytes(v, byte_order),
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
  pub width: u32,
  pub height: u32,
  pub bits_per_sample: u16,
  pub samples_per_pixel: u16,
  pub photometric: PhotometricInterpretation,
  pub planar: PlanarConfiguration,
  pub sample_format: SampleFormat,
  pub data: SampleData,
  /// `ColorMap` of palette images: all red, then all green, then all blue entries
  pub color_map: Option<Vec<u16>>,
}

impl PixelBuffer {
  /// A chunky unsigned-integer buffer, checked against its geometry.
  pub fn new(
    width: u32, height: u32, bits_per_sample: u16, samples_per_pixel: u16,
    photometric: PhotometricInterpretation, data: SampleData,
  ) -> TiffResult<PixelBuffer> {
    let buffer = PixelBuffer {
      width,
      height,
      bits_per_sample,
      samples_per_pixel,
      photometric,
      planar: PlanarConfiguration::Chunky,
      sample_format: if matches!(data, SampleData::F32(_) | SampleData::F64(_)) {
        SampleFormat::IEEEFP
      } else {
        SampleFormat::Uint
      },
      data,
      color_map: None,
    };
    buffer.validate()?;
    Ok(buffer)
  }

  pub fn gray8(width: u32, height: u32, data: Vec<u8>) -> TiffResult<PixelBuffer> {
    PixelBuffer::new(width, height, 8, 1, PhotometricInterpretation::BlackIsZero, SampleData::U8(data))
  }

  pub fn gray16(width: u32, height: u32, data: Vec<u16>) -> TiffResult<PixelBuffer> {
    PixelBuffer::new(width, height, 16, 1, PhotometricInterpretation::BlackIsZero, SampleData::U16(data))
  }

  pub fn rgb8(width: u32, height: u32, data: Vec<u8>) -> TiffResult<PixelBuffer> {
    PixelBuffer::new(width, height, 8, 3, PhotometricInterpretation::RGB, SampleData::U8(data))
  }

  /// A palette image with 8-bit indices into `color_map`.
  pub fn palette8(width: u32, height: u32, indices: Vec<u8>, color_map: Vec<u16>) -> TiffResult<PixelBuffer> {
    let mut buffer = PixelBuffer::new(
      width,
      height,
      8,
      1,
      PhotometricInterpretation::RGBPalette,
      SampleData::U8(indices),
    )?;
    if color_map.len() != 3 * 256 {
      return Err(TiffFormatError::InvalidColorMap.into());
    }
    buffer.color_map = Some(color_map);
    Ok(buffer)
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  /// Number of separately stored planes.
  pub fn planes(&self) -> usize {
    match self.planar {
      PlanarConfiguration::Chunky => 1,
      PlanarConfiguration::Planar => usize::from(self.samples_per_pixel),
    }
  }

  fn plane_samples(&self) -> usize {
    match self.planar {
      PlanarConfiguration::Chunky => usize::from(self.samples_per_pixel),
      PlanarConfiguration::Planar => 1,
    }
  }

  /// Bytes of one row of one plane, padded to a whole byte.
  pub fn row_bytes(&self) -> usize {
    (self.width as usize * usize::from(self.bits_per_sample) * self.plane_samples() + 7) / 8
  }

  /// Elements `data` must hold for this geometry.
  pub fn expected_len(&self) -> usize {
    let rows = self.height as usize * self.planes();
    if self.bits_per_sample < 8 {
      self.row_bytes() * rows
    } else {
      self.width as usize * self.plane_samples() * rows
    }
  }

  /// Checks that depth, storage variant and length agree.
  pub fn validate(&self) -> TiffResult<()> {
    if self.width == 0 || self.height == 0 {
      return Err(TiffFormatError::InvalidDimensions(self.width, self.height).into());
    }
    if self.samples_per_pixel == 0 {
      return Err(TiffFormatError::SamplesPerPixelIsZero.into());
    }
    let storage_bits = match self.bits_per_sample {
      1 | 2 | 4 | 8 => 8,
      16 | 32 | 64 => self.bits_per_sample,
      bits => return Err(TiffUnsupportedError::UnsupportedSampleDepth(bits).into()),
    };
    if storage_bits != self.data.bits() {
      return Err(TiffError::UnsupportedError(TiffUnsupportedError::UnsupportedDataType));
    }
    let expected = self.expected_len();
    if self.data.len() != expected {
      return Err(UsageError::BufferSizeMismatch { expected, actual: self.data.len() }.into());
    }
    Ok(())
  }

  /// Builds a buffer from decoded chunk bytes laid out like the file: planes in sequence, rows
  /// padded to bytes, multi-byte samples in `byte_order`.
  pub(crate) fn from_raw(mut template: PixelBuffer, raw: &[u8], byte_order: ByteOrder) -> TiffResult<PixelBuffer> {
    template.data = match (template.bits_per_sample, template.sample_format) {
      (1 | 2 | 4 | 8, _) => SampleData::U8(raw.to_vec()),
      (16, _) => SampleData::U16(bytecast::u16_from_bytes(raw, byte_order)),
      (32, SampleFormat::IEEEFP) => SampleData::F32(bytecast::f32_from_bytes(raw, byte_order)),
      (32, _) => SampleData::U32(bytecast::u32_from_bytes(raw, byte_order)),
      (64, SampleFormat::IEEEFP) => SampleData::F64(bytecast::f64_from_bytes(raw, byte_order)),
      (bits, _) => return Err(TiffUnsupportedError::UnsupportedSampleDepth(bits).into()),
    };
    template.validate()?;
    Ok(template)
  }

  /// Index of every pixel of a single-sample buffer, unpacking sub-byte depths.
  fn indices(&self) -> TiffResult<Vec<usize>> {
    let width = self.width as usize;
    match self.data {
      SampleData::U8(ref data) if self.bits_per_sample < 8 => {
        let bits = usize::from(self.bits_per_sample);
        let mask = (1u8 << bits) - 1;
        let mut out = Vec::with_capacity(width * self.height as usize);
        for row in data.chunks_exact(self.row_bytes()) {
          for x in 0..width {
            let bit = x * bits;
            let shift = 8 - bits - bit % 8;
            out.push(usize::from((row[bit / 8] >> shift) & mask));
          }
        }
        Ok(out)
      }
      SampleData::U8(ref data) => Ok(data.iter().map(|&v| usize::from(v)).collect()),
      SampleData::U16(ref data) => Ok(data.iter().map(|&v| usize::from(v)).collect()),
      _ => Err(TiffUnsupportedError::UnsupportedDataType.into()),
    }
  }

  /// Expands a palette image into 8-bit RGB through its `ColorMap`.
  pub fn expand_palette(&self) -> TiffResult<PixelBuffer> {
    if self.photometric != PhotometricInterpretation::RGBPalette || self.samples_per_pixel != 1 {
      return Err(TiffUnsupportedError::InterpretationWithBits(
        self.photometric,
        self.samples_per_pixel,
        self.bits_per_sample,
      )
      .into());
    }
    let color_map = self.color_map.as_ref().ok_or(TiffFormatError::InvalidColorMap)?;
    let entries = 1usize << self.bits_per_sample;
    if color_map.len() != 3 * entries {
      return Err(TiffFormatError::InvalidColorMap.into());
    }

    let indices = self.indices()?;
    let mut rgb = Vec::with_capacity(indices.len() * 3);
    for index in indices {
      for channel in 0..3 {
        rgb.push((color_map[channel * entries + index] >> 8) as u8);
      }
    }
    PixelBuffer::rgb8(self.width, self.height, rgb)
  }
}
