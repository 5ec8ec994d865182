//! Writing documents back to TIFF streams.
//!
//! Writing happens in two passes. The first pass appends pixel data, values and directories at
//! the write cursor and remembers where every forward-pointing slot landed: the header's first
//! directory offset, each page's next-directory link and each page's `PageNumber` entry. The
//! second pass computes a [`Patch`] for each of those slots and applies them.

use std::{
  collections::BTreeMap,
  io::{Seek, Write},
};

use log::{debug, warn};

use crate::{
  bytecast,
  decoder::ByteOrder,
  ifd::{IfdArena, IfdId, Value},
  registry,
  tags::Tag,
  TiffResult, UsageError,
};

mod image;
mod writer;

pub use self::{
  image::{encode_page, Chunking, EncodeOptions},
  writer::TiffWriter,
};

/// Position of the first-directory slot in the header.
const HEADER_SLOT: u64 = 4;

/// Where a written directory ended up and which of its slots still need patching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DirectoryLayout {
  start: u32,
  next_slot: u64,
  page_number_slot: Option<u64>,
}

/// Four bytes to overwrite once the final layout is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Patch {
  position: u64,
  bytes: [u8; 4],
}

fn slot(bytes: &[u8]) -> [u8; 4] {
  let mut slot = [0; 4];
  slot[..bytes.len()].copy_from_slice(bytes);
  slot
}

/// Serializes a list of pages, and everything they reference, into one stream.
pub struct DocumentEncoder<'a> {
  arena: &'a IfdArena,
  pages: &'a [IfdId],
  byte_order: ByteOrder,
}

impl<'a> DocumentEncoder<'a> {
  pub fn new(arena: &'a IfdArena, pages: &'a [IfdId], byte_order: ByteOrder) -> Self {
    DocumentEncoder { arena, pages, byte_order }
  }

  /// Writes the document to `writer`, which must be positioned at the start of the stream.
  pub fn write<W: Write + Seek>(&self, writer: W) -> TiffResult<W> {
    if self.pages.is_empty() {
      return Err(UsageError::NoPages.into());
    }
    let mut writer = TiffWriter::new(writer, self.byte_order);
    writer.write_bytes(&self.byte_order.magic())?;
    writer.write_u16(42)?;
    writer.write_u32(0)?;

    let mut layouts = Vec::with_capacity(self.pages.len());
    for &page in self.pages {
      layouts.push(self.write_directory(&mut writer, page, true)?);
    }

    let patches = self.link(&layouts)?;
    debug!("applying {} patches to {} pages", patches.len(), layouts.len());
    for patch in patches {
      writer.patch(patch.position, patch.bytes)?;
    }
    writer.flush()?;
    Ok(writer.into_inner())
  }

  /// Second pass: the slot values that chain the pages and number them.
  fn link(&self, layouts: &[DirectoryLayout]) -> TiffResult<Vec<Patch>> {
    let first = layouts.first().ok_or(UsageError::NoPages)?;
    let mut patches = vec![Patch { position: HEADER_SLOT, bytes: self.u32_slot(first.start) }];
    for pair in layouts.windows(2) {
      patches.push(Patch { position: pair[0].next_slot, bytes: self.u32_slot(pair[1].start) });
    }
    let last = u16::try_from(layouts.len() - 1)?;
    for (index, layout) in layouts.iter().enumerate() {
      if let Some(position) = layout.page_number_slot {
        let numbers = [u16::try_from(index)?, last];
        patches.push(Patch {
          position,
          bytes: slot(&bytecast::u16_into_bytes(&numbers, self.byte_order)),
        });
      }
    }
    Ok(patches)
  }

  fn u32_slot(&self, value: u32) -> [u8; 4] {
    slot(&bytecast::u32_into_bytes(&[value], self.byte_order))
  }

  /// First pass for one directory: its sub-directories, pixel data, out-of-line values and
  /// finally the directory itself.
  fn write_directory<W: Write + Seek>(
    &self, writer: &mut TiffWriter<W>, id: IfdId, is_page: bool,
  ) -> TiffResult<DirectoryLayout> {
    let ifd = self.arena.get(id);
    let mut fields: BTreeMap<u16, Value> =
      ifd.fields().map(|field| (field.tag, field.value.clone())).collect();
    // the free lists describe the layout of the stream this was read from
    fields.remove(&Tag::FreeOffsets.to_u16());
    fields.remove(&Tag::FreeByteCounts.to_u16());

    for (tag, children) in ifd.children() {
      let mut offsets = Vec::with_capacity(children.len());
      for &child in children {
        offsets.push(self.write_directory(writer, child, false)?.start);
      }
      let value = match fields.get(&tag) {
        Some(Value::Ifd(_)) => Value::Ifd(offsets),
        _ => Value::Long(offsets),
      };
      fields.insert(tag, value);
    }
    let stale: Vec<u16> = fields
      .keys()
      .copied()
      .filter(|&tag| registry::child_kind(ifd.kind, tag).is_some())
      .filter(|&tag| ifd.children_of(tag).is_empty())
      .collect();
    for tag in stale {
      warn!("dropping sub-directory pointer {tag:#06x} without a directory to point at");
      fields.remove(&tag);
    }

    if let Some(ref payload) = ifd.payload {
      let mut offsets = Vec::with_capacity(payload.chunks.len());
      let mut counts = Vec::with_capacity(payload.chunks.len());
      for chunk in &payload.chunks {
        writer.pad_word_boundary()?;
        offsets.push(writer.offset_u32()?);
        counts.push(u32::try_from(chunk.len())?);
        writer.write_bytes(chunk)?;
      }
      let (offsets_tag, counts_tag) = payload.layout.tags();
      fields.insert(offsets_tag.to_u16(), Value::Long(offsets));
      fields.insert(counts_tag.to_u16(), Value::Long(counts));
    }

    match ifd.jpeg_interchange {
      Some(ref blob) => {
        writer.pad_word_boundary()?;
        let start = writer.offset_u32()?;
        writer.write_bytes(blob)?;
        fields.insert(Tag::JPEGInterchangeFormat.to_u16(), Value::Long(vec![start]));
        let len = u32::try_from(blob.len())?;
        fields.insert(Tag::JPEGInterchangeFormatLength.to_u16(), Value::Long(vec![len]));
      }
      None => {
        fields.remove(&Tag::JPEGInterchangeFormat.to_u16());
        fields.remove(&Tag::JPEGInterchangeFormatLength.to_u16());
      }
    }

    if is_page {
      fields.insert(Tag::PageNumber.to_u16(), Value::Short(vec![0, 0]));
    }

    let mut slots = Vec::with_capacity(fields.len());
    for (&tag, value) in &fields {
      let bytes = value.to_bytes(self.byte_order);
      let value_slot = if value.is_inline() {
        slot(&bytes)
      } else {
        writer.pad_word_boundary()?;
        let at = writer.offset_u32()?;
        writer.write_bytes(&bytes)?;
        self.u32_slot(at)
      };
      slots.push((tag, value, value_slot));
    }

    writer.pad_word_boundary()?;
    let start = writer.offset_u32()?;
    writer.write_u16(u16::try_from(slots.len())?)?;
    let mut page_number_slot = None;
    for (tag, value, value_slot) in slots {
      writer.write_u16(tag)?;
      writer.write_u16(value.field_type().to_u16())?;
      writer.write_u32(u32::try_from(value.count())?)?;
      if is_page && tag == Tag::PageNumber.to_u16() {
        page_number_slot = Some(writer.offset());
      }
      writer.write_bytes(&value_slot)?;
    }
    let next_slot = writer.offset();
    writer.write_u32(0)?;

    debug!("wrote {:?} directory with {} fields at {start}", ifd.kind, fields.len());
    Ok(DirectoryLayout { start, next_slot, page_number_slot })
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;
  use crate::{
    ifd::{ChunkLayout, Ifd, Payload},
    registry::DirectoryKind,
  };

  fn page(arena: &mut IfdArena, pixel: u8) -> IfdId {
    let mut ifd = Ifd::new(DirectoryKind::Main);
    ifd.set(Tag::ImageWidth, Value::Short(vec![1]));
    ifd.set(Tag::ImageLength, Value::Short(vec![1]));
    ifd.set(Tag::StripOffsets, Value::Long(vec![0]));
    ifd.set(Tag::StripByteCounts, Value::Long(vec![1]));
    ifd.payload = Some(Payload { layout: ChunkLayout::Strips, chunks: vec![vec![pixel]] });
    arena.push(ifd)
  }

  fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
  }

  fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
  }

  #[test]
  fn empty_documents_are_rejected() {
    let arena = IfdArena::new();
    let encoder = DocumentEncoder::new(&arena, &[], ByteOrder::LittleEndian);
    assert!(encoder.write(Cursor::new(Vec::new())).is_err());
  }

  #[test]
  fn pages_are_chained_and_numbered() {
    let mut arena = IfdArena::new();
    let pages = vec![page(&mut arena, 1), page(&mut arena, 2), page(&mut arena, 3)];
    let bytes = DocumentEncoder::new(&arena, &pages, ByteOrder::LittleEndian)
      .write(Cursor::new(Vec::new()))
      .unwrap()
      .into_inner();
    assert_eq!(&bytes[..4], b"II\x2a\x00");

    let mut offset = u32_at(&bytes, 4) as usize;
    let mut visited = 0;
    while offset != 0 {
      assert_eq!(offset % 2, 0);
      let count = usize::from(u16_at(&bytes, offset));
      let entries = offset + 2;
      let tags: Vec<u16> = (0..count).map(|i| u16_at(&bytes, entries + i * 12)).collect();
      assert!(tags.windows(2).all(|t| t[0] < t[1]));

      let page_number = tags.iter().position(|&t| t == Tag::PageNumber.to_u16()).unwrap();
      let slot = entries + page_number * 12 + 8;
      assert_eq!((u16_at(&bytes, slot), u16_at(&bytes, slot + 2)), (visited, 2));

      let strip = tags.iter().position(|&t| t == Tag::StripOffsets.to_u16()).unwrap();
      let strip_offset = u32_at(&bytes, entries + strip * 12 + 8) as usize;
      assert_eq!(bytes[strip_offset], visited as u8 + 1);

      offset = u32_at(&bytes, entries + count * 12) as usize;
      visited += 1;
    }
    assert_eq!(visited, 3);
  }

  #[test]
  fn values_follow_the_inline_rule() {
    let mut arena = IfdArena::new();
    let id = page(&mut arena, 0);
    arena.get_mut(id).set(Tag::Software, Value::Ascii("abc".into()));
    arena.get_mut(id).set(Tag::Artist, Value::Ascii("abcd".into()));
    let bytes = DocumentEncoder::new(&arena, &[id], ByteOrder::LittleEndian)
      .write(Cursor::new(Vec::new()))
      .unwrap()
      .into_inner();

    let offset = u32_at(&bytes, 4) as usize;
    let count = usize::from(u16_at(&bytes, offset));
    let entry = |tag: Tag| {
      (0..count).map(|i| offset + 2 + i * 12).find(|&at| u16_at(&bytes, at) == tag.to_u16()).unwrap()
    };
    assert_eq!(&bytes[entry(Tag::Software) + 8..entry(Tag::Software) + 12], b"abc\0");
    let artist = u32_at(&bytes, entry(Tag::Artist) + 8) as usize;
    assert_eq!(&bytes[artist..artist + 5], b"abcd\0");
  }

  #[test]
  fn sub_directories_are_written_before_their_parent() {
    let mut arena = IfdArena::new();
    let mut exif = Ifd::new(DirectoryKind::Exif);
    exif.set(0x9000u16, Value::Undefined(b"0230".to_vec()));
    let exif = arena.push(exif);
    let id = page(&mut arena, 0);
    arena.get_mut(id).attach_child(Tag::ExifIfd, exif);
    arena.get_mut(id).set(Tag::GpsIfd, Value::Long(vec![1234]));
    arena.get_mut(id).set(Tag::FreeOffsets, Value::Long(vec![1234]));

    let bytes = DocumentEncoder::new(&arena, &[id], ByteOrder::LittleEndian)
      .write(Cursor::new(Vec::new()))
      .unwrap()
      .into_inner();
    let offset = u32_at(&bytes, 4) as usize;
    let count = usize::from(u16_at(&bytes, offset));
    let tags: Vec<u16> = (0..count).map(|i| u16_at(&bytes, offset + 2 + i * 12)).collect();
    assert!(!tags.contains(&Tag::GpsIfd.to_u16()));
    assert!(!tags.contains(&Tag::FreeOffsets.to_u16()));

    let exif_entry = tags.iter().position(|&t| t == Tag::ExifIfd.to_u16()).unwrap();
    let exif_offset = u32_at(&bytes, offset + 2 + exif_entry * 12 + 8) as usize;
    assert!(exif_offset < offset);
    assert_eq!(u16_at(&bytes, exif_offset), 1);
    assert_eq!(u16_at(&bytes, exif_offset + 2), 0x9000);
  }
}
