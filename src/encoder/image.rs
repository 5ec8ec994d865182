//! Turning a pixel buffer into a page directory with compressed strips or tiles.

use crate::{
  bytecast,
  codec::{codec_for, CodecParams},
  decoder::{image::is_ccitt, ByteOrder},
  ifd::{ChunkLayout, Ifd, Payload, Rational, Value},
  pixel::PixelBuffer,
  predictor::{predict, RowLayout},
  registry::DirectoryKind,
  tags::{CompressionMethod, PhotometricInterpretation, Predictor, ResolutionUnit, SampleFormat, Tag},
  TiffResult, TiffUnsupportedError, UsageError,
};

/// Strips are aimed at this many bytes when no row count is given.
const DEFAULT_STRIP_BYTES: usize = 8 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chunking {
  /// `None` picks a row count giving strips of about 8 KiB.
  Strips { rows_per_strip: Option<u32> },
  /// Tile sizes must be non-zero multiples of 16.
  Tiles { width: u32, length: u32 },
}

/// How [`encode_page`] stores pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeOptions {
  pub compression: CompressionMethod,
  pub predictor: Predictor,
  pub chunking: Chunking,
  /// zlib level for Deflate, 0 to 9
  pub deflate_level: u32,
}

impl Default for EncodeOptions {
  fn default() -> Self {
    EncodeOptions {
      compression: CompressionMethod::None,
      predictor: Predictor::None,
      chunking: Chunking::Strips { rows_per_strip: None },
      deflate_level: 6,
    }
  }
}

impl EncodeOptions {
  pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
    self.compression = compression;
    self
  }

  pub fn with_predictor(mut self, predictor: Predictor) -> Self {
    self.predictor = predictor;
    self
  }

  pub fn with_chunking(mut self, chunking: Chunking) -> Self {
    self.chunking = chunking;
    self
  }
}

/// Samples the photometric interpretation itself accounts for; anything above is an extra
/// sample such as alpha.
fn base_samples(photometric: PhotometricInterpretation) -> u16 {
  match photometric {
    PhotometricInterpretation::RGB
    | PhotometricInterpretation::YCbCr
    | PhotometricInterpretation::CIELab
    | PhotometricInterpretation::ICCLab
    | PhotometricInterpretation::ITULab => 3,
    PhotometricInterpretation::CMYK => 4,
    _ => 1,
  }
}

/// Geometry of the chunks a page is cut into.
struct Grid {
  layout: ChunkLayout,
  chunk_width: usize,
  chunk_length: usize,
  across: usize,
  down: usize,
}

fn plan_grid(pixels: &PixelBuffer, chunking: Chunking) -> TiffResult<Grid> {
  let width = pixels.width as usize;
  let height = pixels.height as usize;
  match chunking {
    Chunking::Strips { rows_per_strip } => {
      let rows = match rows_per_strip {
        Some(0) => return Err(UsageError::InvalidRowsPerStrip.into()),
        Some(rows) => (rows as usize).min(height),
        None => (DEFAULT_STRIP_BYTES / pixels.row_bytes().max(1)).clamp(1, height),
      };
      Ok(Grid {
        layout: ChunkLayout::Strips,
        chunk_width: width,
        chunk_length: rows,
        across: 1,
        down: (height + rows - 1) / rows,
      })
    }
    Chunking::Tiles { width: tile_width, length: tile_length } => {
      if tile_width == 0 || tile_length == 0 || tile_width % 16 != 0 || tile_length % 16 != 0 {
        return Err(UsageError::InvalidTileSize(tile_width, tile_length).into());
      }
      let (tile_width, tile_length) = (tile_width as usize, tile_length as usize);
      Ok(Grid {
        layout: ChunkLayout::Tiles,
        chunk_width: tile_width,
        chunk_length: tile_length,
        across: (width + tile_width - 1) / tile_width,
        down: (height + tile_length - 1) / tile_length,
      })
    }
  }
}

/// Cuts the raw samples of every plane into chunks, padding partial tiles with zeros.
fn cut_chunks(pixels: &PixelBuffer, raw: &[u8], grid: &Grid, pixel_bits: usize) -> Vec<Vec<u8>> {
  let height = pixels.height as usize;
  let row_bytes = pixels.row_bytes();
  let mut chunks = Vec::with_capacity(grid.across * grid.down * pixels.planes());

  for plane in raw.chunks_exact(row_bytes * height) {
    for row in 0..grid.down {
      let y = row * grid.chunk_length;
      let rows = grid.chunk_length.min(height - y);
      match grid.layout {
        ChunkLayout::Strips => chunks.push(plane[y * row_bytes..(y + rows) * row_bytes].to_vec()),
        ChunkLayout::Tiles => {
          for column in 0..grid.across {
            let x = column * grid.chunk_width;
            chunks.push(cut_tile(pixels, plane, grid, (x, y), rows, pixel_bits));
          }
        }
      }
    }
  }
  chunks
}

fn cut_tile(
  pixels: &PixelBuffer, plane: &[u8], grid: &Grid, (x, y): (usize, usize), rows: usize,
  pixel_bits: usize,
) -> Vec<u8> {
  let row_bytes = pixels.row_bytes();
  let tile_row_bytes = (grid.chunk_width * pixel_bits + 7) / 8;
  let columns = grid.chunk_width.min(pixels.width as usize - x);
  let mut tile = vec![0u8; tile_row_bytes * grid.chunk_length];
  for r in 0..rows {
    let src = &plane[(y + r) * row_bytes..(y + r + 1) * row_bytes];
    let dst = &mut tile[r * tile_row_bytes..(r + 1) * tile_row_bytes];
    bytecast::copy_bits(src, x * pixel_bits, dst, 0, columns * pixel_bits);
  }
  tile
}

/// Encodes `pixels` into a page directory whose payload holds the compressed chunks.
///
/// Offsets of the chunks are left as zeros; the writer assigns them. CCITT compression and
/// YCbCr pages cannot be encoded.
pub fn encode_page(pixels: &PixelBuffer, options: &EncodeOptions, byte_order: ByteOrder) -> TiffResult<Ifd> {
  pixels.validate()?;
  if is_ccitt(options.compression) {
    return Err(TiffUnsupportedError::UnsupportedEncoding(options.compression).into());
  }
  if pixels.photometric == PhotometricInterpretation::YCbCr {
    return Err(
      TiffUnsupportedError::InterpretationWithBits(
        pixels.photometric,
        pixels.samples_per_pixel,
        pixels.bits_per_sample,
      )
      .into(),
    );
  }
  match options.predictor {
    Predictor::None => {}
    Predictor::Horizontal if matches!(pixels.bits_per_sample, 8 | 16 | 32) => {}
    Predictor::Horizontal => {
      return Err(TiffUnsupportedError::HorizontalPredictor(pixels.bits_per_sample).into())
    }
    Predictor::FloatingPoint => return Err(TiffUnsupportedError::FloatingPointPredictor.into()),
  }

  let grid = plan_grid(pixels, options.chunking)?;
  let plane_samples = usize::from(pixels.samples_per_pixel) / pixels.planes();
  let pixel_bits = usize::from(pixels.bits_per_sample) * plane_samples;
  let chunk_row_bytes = (grid.chunk_width * pixel_bits + 7) / 8;
  let params = CodecParams {
    width: grid.chunk_width,
    row_bytes: chunk_row_bytes,
    deflate_level: options.deflate_level,
    ..CodecParams::default()
  };
  let codec = codec_for(options.compression, &params)?;

  let raw = pixels.data.to_bytes(byte_order);
  let mut chunks = cut_chunks(pixels, &raw, &grid, pixel_bits);
  for chunk in chunks.iter_mut() {
    if options.predictor == Predictor::Horizontal {
      let layout = RowLayout {
        bits_per_sample: pixels.bits_per_sample,
        stride: plane_samples,
        row_samples: grid.chunk_width * plane_samples,
        byte_order,
      };
      predict(chunk, layout)?;
    }
    *chunk = codec.encode(chunk)?;
  }

  let samples = pixels.samples_per_pixel;
  let mut ifd = Ifd::new(DirectoryKind::Main);
  ifd.set(Tag::ImageWidth, Value::Long(vec![pixels.width]));
  ifd.set(Tag::ImageLength, Value::Long(vec![pixels.height]));
  ifd.set(Tag::BitsPerSample, Value::Short(vec![pixels.bits_per_sample; usize::from(samples)]));
  ifd.set(Tag::Compression, Value::Short(vec![options.compression.to_u16()]));
  ifd.set(Tag::PhotometricInterpretation, Value::Short(vec![pixels.photometric.to_u16()]));
  ifd.set(Tag::SamplesPerPixel, Value::Short(vec![samples]));
  ifd.set(Tag::PlanarConfiguration, Value::Short(vec![pixels.planar.to_u16()]));
  ifd.set(Tag::XResolution, Value::Rational(vec![Rational { n: 72, d: 1 }]));
  ifd.set(Tag::YResolution, Value::Rational(vec![Rational { n: 72, d: 1 }]));
  ifd.set(Tag::ResolutionUnit, Value::Short(vec![ResolutionUnit::Inch.to_u16()]));
  if pixels.sample_format != SampleFormat::Uint {
    ifd.set(Tag::SampleFormat, Value::Short(vec![pixels.sample_format.to_u16(); usize::from(samples)]));
  }
  if options.predictor != Predictor::None {
    ifd.set(Tag::Predictor, Value::Short(vec![options.predictor.to_u16()]));
  }
  let extra = samples.saturating_sub(base_samples(pixels.photometric));
  if extra > 0 {
    ifd.set(Tag::ExtraSamples, Value::Short(vec![0; usize::from(extra)]));
  }
  if let Some(ref color_map) = pixels.color_map {
    ifd.set(Tag::ColorMap, Value::Short(color_map.clone()));
  }

  match grid.layout {
    ChunkLayout::Strips => {
      ifd.set(Tag::RowsPerStrip, Value::Long(vec![grid.chunk_length as u32]));
    }
    ChunkLayout::Tiles => {
      ifd.set(Tag::TileWidth, Value::Long(vec![grid.chunk_width as u32]));
      ifd.set(Tag::TileLength, Value::Long(vec![grid.chunk_length as u32]));
    }
  }
  let (offsets_tag, counts_tag) = grid.layout.tags();
  ifd.set(offsets_tag, Value::Long(vec![0; chunks.len()]));
  ifd.set(counts_tag, Value::Long(chunks.iter().map(|c| c.len() as u32).collect()));
  ifd.payload = Some(Payload { layout: grid.layout, chunks });
  Ok(ifd)
}
