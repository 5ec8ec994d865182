//! Reconstruction of a page raster from its compressed strips or tiles.

use super::{image::Image, ByteOrder, Limits};
use crate::{
  bytecast,
  codec::{codec_for, CodecParams},
  color::upsample_ycbcr,
  ifd::ChunkLayout,
  pixel::{PixelBuffer, SampleData},
  predictor::{unpredict, RowLayout},
  tags::{PhotometricInterpretation, PlanarConfiguration, Predictor, SampleFormat},
  TiffError, TiffFormatError, TiffResult, TiffUnsupportedError,
};

/// Rejects pages the pipeline cannot turn into pixels before any chunk is touched.
pub(crate) fn check_supported(image: &Image) -> TiffResult<()> {
  use PhotometricInterpretation::*;

  let samples = image.samples;
  let bits = image.bits_per_sample;
  let supported = match image.photometric_interpretation {
    WhiteIsZero | BlackIsZero => matches!(bits, 1 | 2 | 4 | 8 | 16 | 32 | 64),
    TransparencyMask => samples == 1 && bits == 1,
    RGB => samples >= 3 && matches!(bits, 8 | 16 | 32 | 64),
    RGBPalette => {
      if samples != 1 || !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        false
      } else {
        match image.color_map {
          Some(ref map) if map.len() == 3 << bits => true,
          _ => return Err(TiffFormatError::InvalidColorMap.into()),
        }
      }
    }
    CMYK => samples >= 4 && matches!(bits, 8 | 16),
    YCbCr => return check_ycbcr(image),
    CIELab | ICCLab | ITULab => matches!(bits, 8 | 16),
    Unknown(code) => return Err(TiffUnsupportedError::UnknownInterpretation(code).into()),
  };
  if !supported {
    return Err(
      TiffUnsupportedError::InterpretationWithBits(image.photometric_interpretation, samples, bits)
        .into(),
    );
  }

  match (image.sample_format, bits) {
    (SampleFormat::Uint | SampleFormat::Int, 1 | 2 | 4 | 8 | 16 | 32) => {}
    (SampleFormat::IEEEFP, 32 | 64) => {}
    (format, _) => return Err(TiffUnsupportedError::UnsupportedSampleFormat(vec![format]).into()),
  }

  match image.predictor {
    Predictor::None => Ok(()),
    Predictor::Horizontal if matches!(bits, 8 | 16 | 32) => Ok(()),
    Predictor::Horizontal => Err(TiffUnsupportedError::HorizontalPredictor(bits).into()),
    Predictor::FloatingPoint => Err(TiffUnsupportedError::FloatingPointPredictor.into()),
  }
}

fn check_ycbcr(image: &Image) -> TiffResult<()> {
  if image.samples != 3 || image.bits_per_sample != 8 {
    return Err(
      TiffUnsupportedError::InterpretationWithBits(
        PhotometricInterpretation::YCbCr,
        image.samples,
        image.bits_per_sample,
      )
      .into(),
    );
  }
  if image.planar_config == PlanarConfiguration::Planar {
    return Err(TiffUnsupportedError::UnsupportedPlanarYCbCr.into());
  }
  if image.predictor != Predictor::None {
    return Err(TiffUnsupportedError::UnsupportedPredictor(image.predictor).into());
  }
  let (h, v) = image.subsampling().unwrap_or((1, 1));
  let attrs = &image.tile_attributes;
  let misaligned = match image.layout {
    // a single strip may end on a partial data unit
    ChunkLayout::Strips => attrs.tiles_per_plane() > 1 && attrs.tile_length % v != 0,
    ChunkLayout::Tiles => attrs.tile_length % v != 0 || attrs.tile_width % h != 0,
  };
  if misaligned {
    return Err(
      TiffFormatError::SubsamplingMisaligned {
        rows_per_chunk: attrs.tile_length as u32,
        vertical: v as u16,
      }
      .into(),
    );
  }
  Ok(())
}

/// Decodes every chunk and places it in a raster covering the whole chunk grid, then crops the
/// raster to the image size.
pub(crate) fn assemble(
  image: &Image, chunks: &[Vec<u8>], byte_order: ByteOrder, limits: &Limits,
) -> TiffResult<PixelBuffer> {
  check_supported(image)?;
  if chunks.len() != image.chunk_offsets.len() {
    return Err(TiffFormatError::InconsistentSizesEncountered.into());
  }

  let attrs = image.tile_attributes;
  let params = CodecParams {
    width: attrs.tile_width,
    row_bytes: image.row_bytes(attrs.tile_width),
    fill_order: image.fill_order,
    t4_options: image.t4_options,
    t6_options: image.t6_options,
    ..CodecParams::default()
  };
  let codec = codec_for(image.compression_method, &params)?;

  let ycbcr = image.subsampling().and(image.ycbcr.as_ref());
  let (bits, samples) = match ycbcr {
    Some(_) => (8, 3),
    None => (image.bits_per_sample, image.samples_per_pixel()),
  };
  let pixel_bits = usize::from(bits) * samples;

  let grid_width = attrs.tiles_across() * attrs.tile_width;
  let grid_height = attrs.tiles_down() * attrs.tile_length;
  let grid_row_bytes = (grid_width * pixel_bits + 7) / 8;
  let plane_len = grid_row_bytes.checked_mul(grid_height).ok_or(TiffError::LimitsExceeded)?;
  let raster_len = plane_len.checked_mul(image.planes()).ok_or(TiffError::LimitsExceeded)?;
  if raster_len > limits.decoding_buffer_size {
    return Err(TiffError::LimitsExceeded);
  }
  let mut raster = vec![0u8; raster_len];

  for (index, chunk) in chunks.iter().enumerate() {
    let expected = image.expected_chunk_len(index);
    if expected > limits.intermediate_buffer_size {
      return Err(TiffError::LimitsExceeded);
    }
    let mut decoded = codec.decode_exact(chunk, expected)?;

    let (chunk_width, chunk_rows) = match image.layout {
      ChunkLayout::Tiles => image.chunk_dimensions(),
      ChunkLayout::Strips => image.chunk_data_dimensions(index),
    };
    if image.predictor == Predictor::Horizontal {
      let stride = image.samples_per_pixel();
      let layout = RowLayout {
        bits_per_sample: image.bits_per_sample,
        stride,
        row_samples: chunk_width * stride,
        byte_order,
      };
      unpredict(&mut decoded, layout)?;
    }
    if let Some(params) = ycbcr {
      decoded = upsample_ycbcr(&decoded, chunk_width, chunk_rows, params)?;
    }

    let plane = index / attrs.tiles_per_plane();
    let tile = index % attrs.tiles_per_plane();
    let x = (tile % attrs.tiles_across()) * attrs.tile_width;
    let y = (tile / attrs.tiles_across()) * attrs.tile_length;
    let chunk_row_bytes = (chunk_width * pixel_bits + 7) / 8;
    let rows = chunk_rows.min(grid_height - y);
    for (r, src) in decoded.chunks_exact(chunk_row_bytes).take(rows).enumerate() {
      let start = plane * plane_len + (y + r) * grid_row_bytes;
      let row = &mut raster[start..start + grid_row_bytes];
      bytecast::copy_bits(src, 0, row, x * pixel_bits, chunk_width * pixel_bits);
    }
  }

  let width = image.width as usize;
  let row_bytes = (width * pixel_bits + 7) / 8;
  let used_bits = width * pixel_bits % 8;
  let mut cropped = Vec::with_capacity(row_bytes * image.height as usize * image.planes());
  for plane in 0..image.planes() {
    for y in 0..image.height as usize {
      let start = plane * plane_len + y * grid_row_bytes;
      cropped.extend_from_slice(&raster[start..start + row_bytes]);
      if used_bits != 0 {
        if let Some(last) = cropped.last_mut() {
          *last &= 0xff << (8 - used_bits);
        }
      }
    }
  }

  let template = PixelBuffer {
    width: image.width,
    height: image.height,
    bits_per_sample: bits,
    samples_per_pixel: if ycbcr.is_some() { 3 } else { image.samples },
    photometric: match ycbcr {
      Some(_) => PhotometricInterpretation::RGB,
      None => image.photometric_interpretation,
    },
    planar: image.planar_config,
    sample_format: image.sample_format,
    data: SampleData::U8(Vec::new()),
    color_map: image.color_map.clone(),
  };
  PixelBuffer::from_raw(template, &cropped, byte_order)
}
