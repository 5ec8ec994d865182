//! YCbCr to RGB conversion with chroma upsampling.

use crate::{TiffError, TiffFormatError, TiffResult};

/// Conversion parameters taken from `YCbCrSubSampling`, `YCbCrCoefficients` and
/// `ReferenceBlackWhite`.
#[derive(Clone, Debug, PartialEq)]
pub struct YCbCrParams {
  /// Horizontal and vertical chroma subsampling factors
  pub subsampling: (u16, u16),
  /// Luma coefficients for red, green and blue
  pub luma: [f32; 3],
  /// Black and white reference levels for Y, Cb and Cr
  pub reference: [f32; 6],
}

impl Default for YCbCrParams {
  fn default() -> Self {
    YCbCrParams {
      subsampling: (2, 2),
      luma: [0.299, 0.587, 0.114],
      reference: [0.0, 255.0, 128.0, 255.0, 128.0, 255.0],
    }
  }
}

impl YCbCrParams {
  /// Builds parameters from raw tag values, falling back to the defaults for missing or
  /// malformed ones.
  pub fn from_tags(
    subsampling: Option<Vec<u16>>, luma: Option<Vec<f32>>, reference: Option<Vec<f32>>,
  ) -> YCbCrParams {
    let mut params = YCbCrParams::default();
    if let Some([h, v]) = subsampling.as_deref() {
      if [1, 2, 4].contains(h) && [1, 2, 4].contains(v) {
        params.subsampling = (*h, *v);
      }
    }
    if let Some([r, g, b]) = luma.as_deref() {
      if *g != 0.0 {
        params.luma = [*r, *g, *b];
      }
    }
    if let Some(levels) = reference.as_deref() {
      if let Ok(levels) = <[f32; 6]>::try_from(levels) {
        params.reference = levels;
      }
    }
    params
  }

  fn factors(&self) -> (usize, usize) {
    (usize::from(self.subsampling.0.max(1)), usize::from(self.subsampling.1.max(1)))
  }

  /// Converts one sample triple.
  pub fn to_rgb(&self, y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let [luma_red, luma_green, luma_blue] = self.luma;
    let scale = |value: u8, black: f32, white: f32, range: f32| {
      let span = if white == black { 1.0 } else { white - black };
      (f32::from(value) - black) * range / span
    };
    let y = scale(y, self.reference[0], self.reference[1], 255.0);
    let cb = scale(cb, self.reference[2], self.reference[3], 127.0);
    let cr = scale(cr, self.reference[4], self.reference[5], 127.0);

    let r = cr * (2.0 - 2.0 * luma_red) + y;
    let b = cb * (2.0 - 2.0 * luma_blue) + y;
    let g = (y - luma_blue * b - luma_red * r) / luma_green;
    [clamp(r), clamp(g), clamp(b)]
  }
}

fn clamp(value: f32) -> u8 {
  value.round().clamp(0.0, 255.0) as u8
}

/// Expands YCbCr data units into an RGB8 raster of `width` x `height` pixels.
///
/// Every data unit carries `h * v` luma samples in row order followed by one Cb and one Cr
/// sample. The units cover the region rounded up to whole units; the result is cropped back.
pub fn upsample_ycbcr(
  units: &[u8], width: usize, height: usize, params: &YCbCrParams,
) -> TiffResult<Vec<u8>> {
  let (h, v) = params.factors();
  let units_across = (width + h - 1) / h;
  let units_down = (height + v - 1) / v;
  let unit_len = h * v + 2;
  if units.len() < units_across * units_down * unit_len {
    return Err(TiffError::FormatError(TiffFormatError::InconsistentSizesEncountered));
  }

  let full_width = units_across * h;
  let full_height = units_down * v;
  let mut expanded = vec![0u8; full_width * full_height * 3];
  for (index, unit) in units.chunks_exact(unit_len).take(units_across * units_down).enumerate() {
    let (unit_x, unit_y) = (index % units_across, index / units_across);
    let (cb, cr) = (unit[h * v], unit[h * v + 1]);
    for dy in 0..v {
      for dx in 0..h {
        let pixel = ((unit_y * v + dy) * full_width + unit_x * h + dx) * 3;
        expanded[pixel..pixel + 3].copy_from_slice(&params.to_rgb(unit[dy * h + dx], cb, cr));
      }
    }
  }

  if full_width == width {
    expanded.truncate(width * height * 3);
    return Ok(expanded);
  }
  let mut cropped = Vec::with_capacity(width * height * 3);
  for row in expanded.chunks_exact(full_width * 3).take(height) {
    cropped.extend_from_slice(&row[..width * 3]);
  }
  Ok(cropped)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn neutral_chroma_is_grey() {
    let params = YCbCrParams::default();
    assert_eq!(params.to_rgb(128, 128, 128), [128, 128, 128]);
    assert_eq!(params.to_rgb(0, 128, 128), [0, 0, 0]);
    assert_eq!(params.to_rgb(255, 128, 128), [255, 255, 255]);
  }

  #[test]
  fn extreme_chroma_is_clamped() {
    let params = YCbCrParams::default();
    assert_eq!(params.to_rgb(255, 255, 255), [255, 121, 255]);
    assert_eq!(params.to_rgb(0, 0, 0), [0, 135, 0]);
  }

  #[test]
  fn units_are_spread_and_cropped() {
    let params = YCbCrParams::default();
    // 3x3 image, 2x2 units: 2 across, 2 down
    let units = [
      10, 20, 30, 40, 128, 128, //
      50, 60, 70, 80, 128, 128, //
      90, 100, 0, 0, 128, 128, //
      110, 120, 0, 0, 128, 128,
    ];
    let rgb = upsample_ycbcr(&units, 3, 3, &params).unwrap();
    let luma: Vec<u8> = rgb.chunks_exact(3).map(|p| p[0]).collect();
    assert_eq!(luma, vec![10, 20, 50, 30, 40, 70, 90, 100, 110]);
  }

  #[test]
  fn short_input_is_rejected() {
    let params = YCbCrParams::default();
    assert!(upsample_ycbcr(&[0; 5], 2, 2, &params).is_err());
  }

  #[test]
  fn tags_override_defaults() {
    let params = YCbCrParams::from_tags(Some(vec![4, 1]), None, Some(vec![0.0; 3]));
    assert_eq!(params.subsampling, (4, 1));
    assert_eq!(params.reference, YCbCrParams::default().reference);
  }
}
