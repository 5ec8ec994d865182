use std::convert::TryFrom;

use log::debug;

use super::tag_reader::TagReader;
use crate::{
  color::YCbCrParams,
  ifd::{ChunkLayout, Ifd},
  tags::{
    CompressionMethod, FillOrder, PhotometricInterpretation, PlanarConfiguration, Predictor,
    SampleFormat, Tag,
  },
  TiffError, TiffFormatError, TiffResult, TiffUnsupportedError,
};

#[derive(Debug, Default, Clone, Copy)]
/// Computed values useful for strip and tile decoding. Strips are tiles spanning the full width.
pub(crate) struct TileAttributes {
  pub image_width: usize,
  pub image_height: usize,

  pub tile_width: usize,
  pub tile_length: usize,
}

impl TileAttributes {
  pub fn tiles_across(&self) -> usize {
    (self.image_width + self.tile_width - 1) / self.tile_width
  }

  pub fn tiles_down(&self) -> usize {
    (self.image_height + self.tile_length - 1) / self.tile_length
  }

  pub fn tiles_per_plane(&self) -> usize {
    self.tiles_across() * self.tiles_down()
  }

  fn padding_right(&self) -> usize {
    (self.tile_width - self.image_width % self.tile_width) % self.tile_width
  }

  fn padding_down(&self) -> usize {
    (self.tile_length - self.image_height % self.tile_length) % self.tile_length
  }

  /// Padding of a tile, counted within its plane.
  pub fn get_padding(&self, tile: usize) -> (usize, usize) {
    let row = tile / self.tiles_across();
    let column = tile % self.tiles_across();

    let padding_right = if column == self.tiles_across() - 1 { self.padding_right() } else { 0 };

    let padding_down = if row == self.tiles_down() - 1 { self.padding_down() } else { 0 };

    (padding_right, padding_down)
  }
}

/// Everything needed to locate and decode the pixels of one page.
#[derive(Debug, Clone)]
pub(crate) struct Image {
  pub width: u32,
  pub height: u32,
  pub bits_per_sample: u16,
  pub samples: u16,
  pub sample_format: SampleFormat,
  pub compression_method: CompressionMethod,
  pub photometric_interpretation: PhotometricInterpretation,
  pub predictor: Predictor,
  pub planar_config: PlanarConfiguration,
  pub fill_order: FillOrder,
  pub t4_options: u32,
  pub t6_options: u32,
  pub layout: ChunkLayout,
  pub tile_attributes: TileAttributes,
  pub chunk_offsets: Vec<u64>,
  pub chunk_bytes: Option<Vec<u64>>,
  pub ycbcr: Option<YCbCrParams>,
  pub color_map: Option<Vec<u16>>,
}

impl Image {
  pub fn from_ifd(ifd: &Ifd) -> TiffResult<Image> {
    let tag_reader = TagReader { ifd };

    let width = tag_reader.require_u32(Tag::ImageWidth)?;
    let height = tag_reader.require_u32(Tag::ImageLength)?;
    if width == 0 || height == 0 {
      return Err(TiffError::FormatError(TiffFormatError::InvalidDimensions(width, height)));
    }

    let compression_method = match tag_reader.find_u16(Tag::Compression)? {
      Some(val) => CompressionMethod::from_u16_exhaustive(val),
      None => CompressionMethod::None,
    };

    let samples: u16 = tag_reader.find_u16(Tag::SamplesPerPixel)?.unwrap_or(1);
    if samples == 0 {
      return Err(TiffFormatError::SamplesPerPixelIsZero.into());
    }

    let sample_format = match tag_reader.find_tag_uint_vec::<u16>(Tag::SampleFormat)? {
      Some(vals) => {
        let sample_format: Vec<_> =
          vals.into_iter().map(SampleFormat::from_u16_exhaustive).collect();

        if !sample_format.windows(2).all(|s| s[0] == s[1]) {
          return Err(TiffUnsupportedError::UnsupportedSampleFormat(sample_format).into());
        }

        sample_format.first().copied().unwrap_or(SampleFormat::Uint)
      }
      None => SampleFormat::Uint,
    };

    let bits_per_sample: Vec<u16> =
      tag_reader.find_tag_uint_vec(Tag::BitsPerSample)?.unwrap_or_else(|| vec![1]);

    // A single value is commonly written for all samples.
    if bits_per_sample.len() != usize::from(samples) && bits_per_sample.len() != 1 {
      return Err(TiffError::FormatError(TiffFormatError::InconsistentSizesEncountered));
    }

    // This library (and libtiff) do not support mixed sample formats.
    if bits_per_sample.iter().any(|&b| b != bits_per_sample[0]) {
      return Err(TiffUnsupportedError::InconsistentBitsPerSample(bits_per_sample).into());
    }
    let bits_per_sample = bits_per_sample[0];
    if bits_per_sample == 0 {
      return Err(TiffUnsupportedError::UnsupportedSampleDepth(0).into());
    }

    let photometric_interpretation = match tag_reader.find_u16(Tag::PhotometricInterpretation)? {
      Some(val) => PhotometricInterpretation::from_u16_exhaustive(val),
      None => {
        let fallback = if is_ccitt(compression_method) {
          PhotometricInterpretation::WhiteIsZero
        } else {
          PhotometricInterpretation::BlackIsZero
        };
        debug!("PhotometricInterpretation missing, assuming {fallback:?}");
        fallback
      }
    };

    let predictor = tag_reader
      .find_u16(Tag::Predictor)?
      .map(|p| {
        Predictor::from_u16(p).ok_or(TiffError::FormatError(TiffFormatError::UnknownPredictor(p)))
      })
      .transpose()?
      .unwrap_or(Predictor::None);

    let planar_config = tag_reader
      .find_u16(Tag::PlanarConfiguration)?
      .map(|p| {
        PlanarConfiguration::from_u16(p)
          .ok_or(TiffError::FormatError(TiffFormatError::UnknownPlanarConfiguration(p)))
      })
      .transpose()?
      .unwrap_or(PlanarConfiguration::Chunky);

    let fill_order = tag_reader
      .find_u16(Tag::FillOrder)?
      .and_then(FillOrder::from_u16)
      .unwrap_or(FillOrder::MsbToLsb);

    let t4_options = tag_reader.find_u32(Tag::T4Options)?.unwrap_or(0);
    let t6_options = tag_reader.find_u32(Tag::T6Options)?.unwrap_or(0);

    let planes = match planar_config {
      PlanarConfiguration::Chunky => 1,
      PlanarConfiguration::Planar => usize::from(samples),
    };

    let image_width = usize::try_from(width)?;
    let image_height = usize::try_from(height)?;

    let layout;
    let tile_attributes;
    if ifd.contains(Tag::TileOffsets) {
      let tile_width = usize::try_from(tag_reader.require_u32(Tag::TileWidth)?)?;
      let tile_length = usize::try_from(tag_reader.require_u32(Tag::TileLength)?)?;

      if tile_width == 0 {
        return Err(TiffFormatError::InvalidTagValueType(Tag::TileWidth).into());
      } else if tile_length == 0 {
        return Err(TiffFormatError::InvalidTagValueType(Tag::TileLength).into());
      }

      layout = ChunkLayout::Tiles;
      tile_attributes = TileAttributes { image_width, image_height, tile_width, tile_length };
    } else {
      if !ifd.contains(Tag::StripOffsets) {
        return Err(TiffFormatError::RequiredTagNotFound(Tag::StripOffsets).into());
      }
      let rows_per_strip = match tag_reader.find_u32(Tag::RowsPerStrip)? {
        Some(0) => return Err(TiffFormatError::InvalidTagValueType(Tag::RowsPerStrip).into()),
        Some(rows) => usize::try_from(rows)?.min(image_height),
        None => image_height,
      };

      layout = ChunkLayout::Strips;
      tile_attributes =
        TileAttributes { image_width, image_height, tile_width: image_width, tile_length: rows_per_strip };
    }

    let (offsets_tag, counts_tag) = layout.tags();
    let chunk_offsets: Vec<u64> = tag_reader
      .find_tag_uint_vec::<u32>(offsets_tag)?
      .unwrap_or_default()
      .into_iter()
      .map(u64::from)
      .collect();
    let chunk_bytes: Option<Vec<u64>> = tag_reader
      .find_tag_uint_vec::<u32>(counts_tag)?
      .map(|v| v.into_iter().map(u64::from).collect());

    if chunk_offsets.len() != tile_attributes.tiles_per_plane() * planes {
      return Err(TiffError::FormatError(TiffFormatError::InconsistentSizesEncountered));
    }
    if let Some(ref counts) = chunk_bytes {
      if counts.len() != chunk_offsets.len() {
        return Err(TiffError::FormatError(TiffFormatError::InconsistentSizesEncountered));
      }
    }

    let ycbcr = if photometric_interpretation == PhotometricInterpretation::YCbCr {
      Some(YCbCrParams::from_tags(
        tag_reader.find_tag_uint_vec::<u16>(Tag::YCbCrSubSampling)?,
        tag_reader.find_rationals(Tag::YCbCrCoefficients)?,
        tag_reader.find_rationals(Tag::ReferenceBlackWhite)?,
      ))
    } else {
      None
    };

    let color_map = tag_reader.find_tag_uint_vec::<u16>(Tag::ColorMap)?;

    Ok(Image {
      width,
      height,
      bits_per_sample,
      samples,
      sample_format,
      compression_method,
      photometric_interpretation,
      predictor,
      planar_config,
      fill_order,
      t4_options,
      t6_options,
      layout,
      tile_attributes,
      chunk_offsets,
      chunk_bytes,
      ycbcr,
      color_map,
    })
  }

  /// Samples per pixel within chunk.
  ///
  /// In planar config, samples are stored in separate strips/chunks, also called bands.
  ///
  /// Example with `bits_per_sample = [8, 8, 8]` and `PhotometricInterpretation::RGB`:
  /// * `PlanarConfiguration::Chunky` -> 3 (RGBRGBRGB...)
  /// * `PlanarConfiguration::Planar` -> 1 (RRR...) (GGG...) (BBB...)
  pub(crate) fn samples_per_pixel(&self) -> usize {
    match self.planar_config {
      PlanarConfiguration::Chunky => self.samples.into(),
      PlanarConfiguration::Planar => 1,
    }
  }

  pub(crate) fn planes(&self) -> usize {
    match self.planar_config {
      PlanarConfiguration::Chunky => 1,
      PlanarConfiguration::Planar => self.samples.into(),
    }
  }

  /// Chroma subsampling factors when the chunks are stored as YCbCr data units.
  pub(crate) fn subsampling(&self) -> Option<(usize, usize)> {
    match self.ycbcr {
      Some(ref params) if self.planar_config == PlanarConfiguration::Chunky && self.samples == 3 => {
        let (h, v) = params.subsampling;
        Some((usize::from(h), usize::from(v)))
      }
      _ => None,
    }
  }

  /// Bytes of one row of `width` pixels within a chunk, rows start on byte boundaries.
  pub(crate) fn row_bytes(&self, width: usize) -> usize {
    let bits = usize::from(self.bits_per_sample) * self.samples_per_pixel();
    width.saturating_mul(bits).saturating_add(7) / 8
  }

  pub(crate) fn chunk_dimensions(&self) -> (usize, usize) {
    let tile_attrs = &self.tile_attributes;
    (tile_attrs.tile_width, tile_attrs.tile_length)
  }

  /// Size of the data in the chunk, the chunk size minus any padding.
  pub(crate) fn chunk_data_dimensions(&self, chunk_index: usize) -> (usize, usize) {
    let tile_attrs = &self.tile_attributes;
    let (padding_right, padding_down) =
      tile_attrs.get_padding(chunk_index % tile_attrs.tiles_per_plane());

    (tile_attrs.tile_width - padding_right, tile_attrs.tile_length - padding_down)
  }

  /// Decoded size of a chunk. Tiles always hold full (padded) tiles, the last strip of a plane
  /// only the remaining rows.
  pub(crate) fn expected_chunk_len(&self, chunk_index: usize) -> usize {
    let (width, length) = match self.layout {
      ChunkLayout::Tiles => self.chunk_dimensions(),
      ChunkLayout::Strips => self.chunk_data_dimensions(chunk_index),
    };
    match self.subsampling() {
      Some((h, v)) => {
        let units = ((width + h - 1) / h) * ((length + v - 1) / v);
        units.saturating_mul(h * v + 2).saturating_mul(usize::from(self.bits_per_sample)) / 8
      }
      None => self.row_bytes(width).saturating_mul(length),
    }
  }

  /// Stored sizes of the chunks, working around producers that record bogus byte counts.
  ///
  /// Uncompressed pages with one chunk per plane get their counts recomputed from the geometry
  /// when the recorded value disagrees; uncompressed pages without counts get them computed for
  /// every chunk. Compressed pages must carry their counts.
  pub(crate) fn chunk_byte_counts(&self) -> TiffResult<Vec<u64>> {
    let uncompressed = self.compression_method == CompressionMethod::None;
    let geometric = |i: usize| self.expected_chunk_len(i) as u64;
    match self.chunk_bytes {
      None if !uncompressed => Err(TiffFormatError::RequiredTagNotFound(self.layout.tags().1).into()),
      None => {
        debug!("{:?} missing, computing byte counts from geometry", self.layout.tags().1);
        Ok((0..self.chunk_offsets.len()).map(geometric).collect())
      }
      Some(ref counts) if uncompressed && counts.len() == self.planes() => Ok(
        counts
          .iter()
          .enumerate()
          .map(|(i, &count)| {
            let expected = geometric(i);
            if count != expected {
              debug!("chunk {i} records {count} bytes, using {expected} from geometry");
            }
            expected
          })
          .collect(),
      ),
      Some(ref counts) => Ok(counts.clone()),
    }
  }
}

pub(crate) fn is_ccitt(method: CompressionMethod) -> bool {
  matches!(method, CompressionMethod::Huffman | CompressionMethod::Fax3 | CompressionMethod::Fax4)
}
