//! Reading TIFF streams into directories, pages and pixels.

use std::{
  collections::HashSet,
  io::{Read, Seek},
};

use log::{debug, warn};

use self::{
  ifd::Entry,
  image::Image,
  stream::{EndianReader, SmartReader},
};
use crate::{
  document::{Document, SkippedPage},
  ifd::{Ifd, IfdArena, IfdId, Payload},
  registry::{self, DirectoryKind},
  tags::{Tag, Type},
  TiffError, TiffFormatError, TiffResult, TiffUnsupportedError,
};

pub(crate) mod assemble;
pub(crate) mod ifd;
pub(crate) mod image;
mod stream;
mod tag_reader;

pub use self::stream::ByteOrder;

/// Decoding limits
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Limits {
  /// The maximum size of a decoded page raster in bytes, the default is 256MiB.
  pub decoding_buffer_size: usize,
  /// The maximum size of any ifd value in bytes, the default is
  /// 1MiB.
  pub ifd_value_size: usize,
  /// The maximum size of a single strip or tile, compressed or decoded, the default is 128MiB.
  pub intermediate_buffer_size: usize,
  /// The maximum size of all pixel data a document holds after reading, the default is 1GiB.
  /// The pixel data of a single page is bounded by `decoding_buffer_size`.
  pub payload_buffer_size: usize,
}

impl Limits {
  /// A configuration that does not impose any limits.
  ///
  /// This is a good start if the caller only wants to impose selective limits, contrary to the
  /// default limits which allows selectively disabling limits.
  ///
  /// Note that this configuration is likely to crash on excessively large images since,
  /// naturally, the machine running the program does not have infinite memory.
  pub fn unlimited() -> Limits {
    Limits {
      decoding_buffer_size: usize::MAX,
      ifd_value_size: usize::MAX,
      intermediate_buffer_size: usize::MAX,
      payload_buffer_size: usize::MAX,
    }
  }
}

impl Default for Limits {
  fn default() -> Limits {
    Limits {
      decoding_buffer_size: 256 * 1024 * 1024,
      intermediate_buffer_size: 128 * 1024 * 1024,
      ifd_value_size: 1024 * 1024,
      payload_buffer_size: 1024 * 1024 * 1024,
    }
  }
}

/// The representation of a TIFF decoder
///
/// Every directory offset is visited at most once, which is what ends malformed cyclic chains.
#[derive(Debug)]
pub struct Decoder<R> {
  reader: SmartReader<R>,
  limits: Limits,
  seen_ifds: HashSet<u64>,
  first_ifd: u64,
  /// Pixel data bytes held by the pages read so far
  payload_bytes: usize,
}

/// Whether a directory describes an image and should carry pixel data.
fn is_image_directory(kind: DirectoryKind, ifd: &Ifd) -> bool {
  kind == DirectoryKind::Main
    && (ifd.contains(Tag::StripOffsets)
      || ifd.contains(Tag::TileOffsets)
      || ifd.contains(Tag::ImageWidth))
}

impl<R: Read + Seek> Decoder<R> {
  /// Create a new decoder that decodes from the stream ```r```
  pub fn new(mut r: R) -> TiffResult<Decoder<R>> {
    let mut magic = [0u8; 2];
    r.read_exact(&mut magic).map_err(|_| TiffFormatError::TiffSignatureNotFound)?;
    let byte_order =
      ByteOrder::from_magic(&magic).ok_or(TiffFormatError::TiffSignatureNotFound)?;
    let mut reader = SmartReader::wrap(r, byte_order);

    match reader.read_u16()? {
      42 => {}
      43 => return Err(TiffUnsupportedError::BigTiff.into()),
      _ => return Err(TiffError::FormatError(TiffFormatError::TiffSignatureInvalid)),
    }
    let first_ifd = u64::from(reader.read_u32()?);
    debug!("{byte_order:?} stream, first directory at {first_ifd}");

    Ok(Decoder {
      reader,
      limits: Limits::default(),
      seen_ifds: HashSet::new(),
      first_ifd,
      payload_bytes: 0,
    })
  }

  pub fn with_limits(mut self, limits: Limits) -> Decoder<R> {
    self.limits = limits;
    self
  }

  /// Returns the byte_order
  pub fn byte_order(&self) -> ByteOrder {
    self.reader.byte_order
  }

  pub fn first_ifd_offset(&self) -> u64 {
    self.first_ifd
  }

  /// Reads the directory at `offset` into `arena`, together with its sub-directories and pixel
  /// data, and returns it along with the offset of the next directory in the chain.
  ///
  /// Sub-directories that cannot be read are dropped with a warning. A directory offset seen
  /// before is reported as [`TiffFormatError::CycleInOffsets`].
  pub fn read_directory(
    &mut self, arena: &mut IfdArena, offset: u64, kind: DirectoryKind,
  ) -> TiffResult<(IfdId, Option<u64>)> {
    if !self.seen_ifds.insert(offset) {
      return Err(TiffFormatError::CycleInOffsets.into());
    }
    let (entries, next) = self.read_entries(offset)?;

    let mut ifd = Ifd::new(kind);
    ifd.start_offset = Some(offset);
    let mut pointers = Vec::new();
    for (tag, entry) in entries {
      let value = entry.val(&self.limits, &mut self.reader)?;
      if let Some(child_kind) = registry::child_kind(kind, tag) {
        pointers.push((tag, child_kind, value.to_u32_vec().unwrap_or_default()));
      }
      ifd.set(tag, value);
    }

    let mut children = Vec::new();
    for (tag, child_kind, offsets) in pointers {
      for child_offset in offsets.into_iter().filter(|&o| o != 0).map(u64::from) {
        match self.read_directory(arena, child_offset, child_kind) {
          Ok((child, _)) => children.push((tag, child)),
          Err(err) => warn!("dropping {child_kind:?} directory at {child_offset}: {err}"),
        }
      }
    }
    for (tag, child) in children {
      ifd.attach_child(tag, child);
    }

    if is_image_directory(kind, &ifd) {
      ifd.payload = Some(self.read_payload(&ifd)?);
    }
    ifd.jpeg_interchange = self.read_jpeg_interchange(&ifd);

    debug!("read {kind:?} directory at {offset} with {} fields", ifd.len());
    Ok((arena.push(ifd), next))
  }

  fn read_entries(&mut self, offset: u64) -> TiffResult<(Vec<(u16, Entry)>, Option<u64>)> {
    self.reader.goto_offset(offset)?;
    let count = self.reader.read_u16()?;
    let mut entries = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
      let tag = self.reader.read_u16()?;
      let type_ = self.reader.read_u16()?;
      let count = self.reader.read_u32()?;
      let mut slot = [0; 4];
      self.reader.read_exact(&mut slot)?;
      match Type::from_u16(type_) {
        Some(type_) => entries.push((tag, Entry::new(type_, count, slot))),
        // Unknown type, readers skip such entries.
        None => debug!("skipping tag {tag} of unknown field type {type_}"),
      }
    }
    let next = self.reader.read_u32()?;
    Ok((entries, if next == 0 { None } else { Some(u64::from(next)) }))
  }

  /// Reads the raw strips or tiles of an image directory.
  ///
  /// Chunks may alias the same bytes of the stream, so the copies are bounded by their total
  /// size rather than by the stream length.
  fn read_payload(&mut self, ifd: &Ifd) -> TiffResult<Payload> {
    let image = Image::from_ifd(ifd)?;
    let counts = image.chunk_byte_counts()?;
    let stream_len = self.reader.stream_len()?;
    // every chunk needs at least its own offset entry in the stream
    if u64::try_from(counts.len())? > stream_len {
      return Err(TiffFormatError::InconsistentSizesEncountered.into());
    }

    let mut page_bytes = 0usize;
    let mut chunks = Vec::with_capacity(counts.len());
    for (&offset, &count) in image.chunk_offsets.iter().zip(&counts) {
      let count = usize::try_from(count)?;
      if count > self.limits.intermediate_buffer_size {
        return Err(TiffError::LimitsExceeded);
      }
      let available = usize::try_from(stream_len.saturating_sub(offset)).unwrap_or(usize::MAX);
      let len = count.min(available);
      if len < count {
        warn!("chunk at {offset} holds {len} of its {count} bytes");
      }
      page_bytes = page_bytes.checked_add(len).ok_or(TiffError::LimitsExceeded)?;
      if page_bytes > self.limits.decoding_buffer_size
        || self.payload_bytes.saturating_add(page_bytes) > self.limits.payload_buffer_size
      {
        return Err(TiffError::LimitsExceeded);
      }
      self.reader.goto_offset(offset)?;
      let mut chunk = vec![0; len];
      self.reader.read_exact(&mut chunk)?;
      chunks.push(chunk);
    }
    self.payload_bytes += page_bytes;
    Ok(Payload { layout: image.layout, chunks })
  }

  fn read_jpeg_interchange(&mut self, ifd: &Ifd) -> Option<Vec<u8>> {
    let offset = ifd.value(Tag::JPEGInterchangeFormat)?.to_u32().ok()?;
    let len = ifd.value(Tag::JPEGInterchangeFormatLength)?.to_u32().ok()?;
    let len = usize::try_from(len).ok().filter(|&l| l <= self.limits.intermediate_buffer_size)?;
    let mut blob = vec![0; len];
    let read = self
      .reader
      .goto_offset(u64::from(offset))
      .and_then(|_| self.reader.read_exact(&mut blob));
    match read {
      Ok(()) => Some(blob),
      Err(err) => {
        warn!("ignoring unreadable JPEG interchange stream at {offset}: {err}");
        None
      }
    }
  }

  /// The next-directory link of the directory at `offset`, without reading its fields.
  fn next_offset_of(&mut self, offset: u64) -> TiffResult<Option<u64>> {
    self.reader.goto_offset(offset)?;
    let count = u64::from(self.reader.read_u16()?);
    self.reader.goto_offset(offset + 2 + count * 12)?;
    let next = self.reader.read_u32()?;
    Ok(if next == 0 { None } else { Some(u64::from(next)) })
  }

  /// Walks the directory chain and collects every readable page.
  ///
  /// A page that fails to read is recorded in [`Document::skipped`] and the walk continues with
  /// the directory it links to, if that link can still be read.
  pub fn read_document(mut self) -> TiffResult<Document> {
    if self.first_ifd == 0 {
      return Err(TiffFormatError::ImageFileDirectoryNotFound.into());
    }
    let mut arena = IfdArena::new();
    let mut pages = Vec::new();
    let mut skipped = Vec::new();

    let mut next = Some(self.first_ifd);
    let mut index = 0;
    while let Some(offset) = next {
      let result = self.read_directory(&mut arena, offset, DirectoryKind::Main).and_then(
        |(id, following)| match arena.get(id).payload {
          Some(_) => Ok((id, following)),
          None => Err(TiffFormatError::RequiredTagNotFound(Tag::StripOffsets).into()),
        },
      );
      match result {
        Ok((id, following)) => {
          pages.push(id);
          next = following;
        }
        Err(TiffError::FormatError(TiffFormatError::CycleInOffsets)) => {
          warn!("directory chain loops back to offset {offset}, stopping after {index} pages");
          skipped.push(SkippedPage {
            index,
            offset,
            error: TiffFormatError::CycleInOffsets.into(),
          });
          break;
        }
        Err(error) => {
          warn!("skipping page {index} at offset {offset}: {error}");
          next = self.next_offset_of(offset).unwrap_or(None);
          skipped.push(SkippedPage { index, offset, error });
        }
      }
      index += 1;
    }

    Ok(Document::from_parts(self.reader.byte_order, arena, pages, skipped))
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;
  use crate::ifd::Value;

  fn header(byte_order: &[u8; 2], version: u16, first: u32) -> Vec<u8> {
    let mut bytes = byte_order.to_vec();
    bytes.extend_from_slice(&version.to_le_bytes());
    bytes.extend_from_slice(&first.to_le_bytes());
    bytes
  }

  #[test]
  fn bad_magic_is_not_a_tiff() {
    assert!(matches!(
      Decoder::new(Cursor::new(b"PK\x03\x04".to_vec())),
      Err(TiffError::FormatError(TiffFormatError::TiffSignatureNotFound))
    ));
    assert!(matches!(
      Decoder::new(Cursor::new(b"I".to_vec())),
      Err(TiffError::FormatError(TiffFormatError::TiffSignatureNotFound))
    ));
  }

  #[test]
  fn bigtiff_and_bad_versions() {
    assert!(matches!(
      Decoder::new(Cursor::new(header(b"II", 43, 8))),
      Err(TiffError::UnsupportedError(TiffUnsupportedError::BigTiff))
    ));
    assert!(matches!(
      Decoder::new(Cursor::new(header(b"II", 41, 8))),
      Err(TiffError::FormatError(TiffFormatError::TiffSignatureInvalid))
    ));
  }

  #[test]
  fn unknown_field_types_are_skipped() {
    let mut bytes = header(b"II", 42, 8);
    bytes.extend_from_slice(&2u16.to_le_bytes());
    // tag 700 with type 99, then ImageDescription "ab"
    bytes.extend_from_slice(&[0xbc, 0x02, 99, 0, 1, 0, 0, 0, 0, 0, 0, 0]);
    bytes.extend_from_slice(&[0x0e, 0x01, 2, 0, 3, 0, 0, 0, b'a', b'b', 0, 0]);
    bytes.extend_from_slice(&0u32.to_le_bytes());

    let mut decoder = Decoder::new(Cursor::new(bytes)).unwrap();
    let mut arena = IfdArena::new();
    let (id, next) = decoder.read_directory(&mut arena, 8, DirectoryKind::Exif).unwrap();
    assert_eq!(next, None);
    let ifd = arena.get(id);
    assert_eq!(ifd.len(), 1);
    assert_eq!(ifd.value(Tag::ImageDescription).and_then(Value::as_str), Some("ab"));
    assert!(matches!(
      decoder.read_directory(&mut arena, 8, DirectoryKind::Exif),
      Err(TiffError::FormatError(TiffFormatError::CycleInOffsets))
    ));
  }

  #[test]
  fn missing_first_directory() {
    let decoder = Decoder::new(Cursor::new(header(b"II", 42, 0))).unwrap();
    assert!(decoder.read_document().is_err());
  }
}
