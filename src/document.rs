//! Multi-page documents and the editing operations on their page list.

use std::{
  collections::HashSet,
  io::{Cursor, Read, Seek, Write},
  ops::{Bound, RangeBounds},
};

use log::{debug, warn};

use crate::{
  bytecast,
  codec::{codec_for, CodecParams},
  decoder::{assemble::assemble, image::Image, ByteOrder, Decoder, Limits},
  encoder::{encode_page, DocumentEncoder, EncodeOptions},
  ifd::{Field, Ifd, IfdArena, IfdId, Metadata, Value},
  pixel::PixelBuffer,
  registry::{self, DirectoryKind},
  tags::{CompressionMethod, Predictor, Tag},
  TiffError, TiffFormatError, TiffResult, UsageError,
};

/// A page that could not be read, with the error that stopped it.
#[derive(Debug)]
pub struct SkippedPage {
  /// Position in the directory chain, counting skipped pages.
  pub index: usize,
  /// Stream offset of the page's directory.
  pub offset: u64,
  pub error: TiffError,
}

/// An ordered list of pages sharing one byte order.
///
/// Every edit renumbers the pages, so `PageNumber` of page `i` always reads `(i, page_count - 1)`.
#[derive(Debug)]
pub struct Document {
  byte_order: ByteOrder,
  arena: IfdArena,
  pages: Vec<IfdId>,
  skipped: Vec<SkippedPage>,
  limits: Limits,
}

impl Document {
  /// An empty document. Pages must be added before it can be written.
  pub fn new(byte_order: ByteOrder) -> Document {
    Document {
      byte_order,
      arena: IfdArena::new(),
      pages: Vec::new(),
      skipped: Vec::new(),
      limits: Limits::default(),
    }
  }

  pub(crate) fn from_parts(
    byte_order: ByteOrder, arena: IfdArena, pages: Vec<IfdId>, skipped: Vec<SkippedPage>,
  ) -> Document {
    Document { byte_order, arena, pages, skipped, limits: Limits::default() }
  }

  /// Reads every page of a TIFF stream. Pages that fail to read are listed in
  /// [`Document::skipped`]; only a broken header fails the whole read.
  pub fn read<R: Read + Seek>(reader: R) -> TiffResult<Document> {
    Document::read_with_limits(reader, Limits::default())
  }

  pub fn read_with_limits<R: Read + Seek>(reader: R, limits: Limits) -> TiffResult<Document> {
    let mut document = Decoder::new(reader)?.with_limits(limits.clone()).read_document()?;
    document.limits = limits;
    debug!("read {} pages, skipped {}", document.pages.len(), document.skipped.len());
    Ok(document)
  }

  pub fn from_bytes(bytes: &[u8]) -> TiffResult<Document> {
    Document::read(Cursor::new(bytes))
  }

  pub fn byte_order(&self) -> ByteOrder {
    self.byte_order
  }

  pub fn page_count(&self) -> usize {
    self.pages.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pages.is_empty()
  }

  /// Pages that were dropped while reading.
  pub fn skipped(&self) -> &[SkippedPage] {
    &self.skipped
  }

  fn page_id(&self, index: usize) -> TiffResult<IfdId> {
    self
      .pages
      .get(index)
      .copied()
      .ok_or_else(|| UsageError::PageIndexOutOfRange(index, self.pages.len()).into())
  }

  pub fn page(&self, index: usize) -> TiffResult<Page<'_>> {
    let id = self.page_id(index)?;
    Ok(Page { document: self, id, index })
  }

  pub fn pages(&self) -> impl Iterator<Item = Page<'_>> {
    self.pages.iter().enumerate().map(move |(index, &id)| Page { document: self, id, index })
  }

  /// Encodes `pixels` as a new last page and returns its index.
  pub fn push_image(&mut self, pixels: &PixelBuffer, options: &EncodeOptions) -> TiffResult<usize> {
    self.insert_image(self.pages.len(), pixels, options)
  }

  /// Encodes `pixels` as a new page at `at`, clamped to the page count.
  pub fn insert_image(
    &mut self, at: usize, pixels: &PixelBuffer, options: &EncodeOptions,
  ) -> TiffResult<usize> {
    let ifd = encode_page(pixels, options, self.byte_order)?;
    let at = at.min(self.pages.len());
    let id = self.arena.push(ifd);
    self.pages.insert(at, id);
    self.renumber();
    Ok(at)
  }

  /// Copies every page of `source` to the end of this document.
  pub fn append(&mut self, source: &Document) -> TiffResult<()> {
    self.insert(self.pages.len(), source).map(|_| ())
  }

  /// Copies every page of `source`, in order, to position `at` (clamped to the page count).
  ///
  /// Pages from a stream of the other byte order get their multi-byte samples converted. Returns
  /// the index of the first inserted page.
  pub fn insert(&mut self, at: usize, source: &Document) -> TiffResult<usize> {
    let at = at.min(self.pages.len());
    let (from, to) = (source.byte_order, self.byte_order);
    let mut imported = Vec::with_capacity(source.pages.len());
    for &id in &source.pages {
      let mut convert = |ifd: &mut Ifd| convert_byte_order(ifd, from, to);
      imported.push(self.arena.import_tree(&source.arena, id, &mut convert)?);
    }
    debug!("inserting {} pages at {at}", imported.len());
    self.pages.splice(at..at, imported);
    self.renumber();
    Ok(at)
  }

  /// Removes the pages at `indices` and returns how many were removed.
  ///
  /// Out-of-range indices are ignored. A document never loses its last page: when every page is
  /// selected, the selected page with the lowest index stays.
  pub fn remove(&mut self, indices: &[usize]) -> usize {
    let mut selected: HashSet<usize> =
      indices.iter().copied().filter(|&i| i < self.pages.len()).collect();
    if !self.pages.is_empty() && selected.len() == self.pages.len() {
      selected.remove(&0);
    }
    if selected.is_empty() {
      return 0;
    }
    let before = self.pages.len();
    self.pages = self
      .pages
      .iter()
      .enumerate()
      .filter(|(index, _)| !selected.contains(index))
      .map(|(_, &id)| id)
      .collect();
    self.renumber();
    before - self.pages.len()
  }

  pub fn remove_range<B: RangeBounds<usize>>(&mut self, range: B) -> usize {
    let indices: Vec<usize> = self.indices_in(range).collect();
    self.remove(&indices)
  }

  /// Keeps only the pages at `indices`, in that order. Out-of-range and repeated indices are
  /// ignored; a selection with no valid index leaves the document untouched.
  pub fn retain(&mut self, indices: &[usize]) -> TiffResult<()> {
    let mut seen = HashSet::new();
    let kept: Vec<IfdId> = indices
      .iter()
      .copied()
      .filter(|&i| i < self.pages.len() && seen.insert(i))
      .map(|i| self.pages[i])
      .collect();
    if kept.is_empty() {
      return Err(UsageError::EmptySelection.into());
    }
    self.pages = kept;
    self.renumber();
    Ok(())
  }

  pub fn retain_range<B: RangeBounds<usize>>(&mut self, range: B) -> TiffResult<()> {
    let indices: Vec<usize> = self.indices_in(range).collect();
    self.retain(&indices)
  }

  fn indices_in<B: RangeBounds<usize>>(&self, range: B) -> std::ops::Range<usize> {
    let len = self.pages.len();
    let start = match range.start_bound() {
      Bound::Included(&s) => s,
      Bound::Excluded(&s) => s.saturating_add(1),
      Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
      Bound::Included(&e) => e.saturating_add(1),
      Bound::Excluded(&e) => e,
      Bound::Unbounded => len,
    };
    start.min(len)..end.min(len)
  }

  /// Splits the document into standalone documents of `group_size` pages each; the last group
  /// holds the remainder.
  pub fn split(&self, group_size: usize) -> TiffResult<Vec<Document>> {
    if group_size == 0 {
      return Err(UsageError::InvalidGroupSize.into());
    }
    let mut documents = Vec::with_capacity((self.pages.len() + group_size - 1) / group_size);
    for group in self.pages.chunks(group_size) {
      let mut document = Document::new(self.byte_order);
      document.limits = self.limits.clone();
      for &id in group {
        let copy = document.arena.import_tree(&self.arena, id, &mut |_| Ok(()))?;
        document.pages.push(copy);
      }
      document.renumber();
      documents.push(document);
    }
    Ok(documents)
  }

  /// A new document with the pages of `second` inserted into those of `first` at `at`. The
  /// result has the byte order of `first`.
  pub fn merge(first: &Document, second: &Document, at: usize) -> TiffResult<Document> {
    let mut merged = Document::new(first.byte_order);
    merged.limits = first.limits.clone();
    merged.insert(0, first)?;
    merged.insert(at, second)?;
    Ok(merged)
  }

  /// Moves the pages of this document into `target` at `at`.
  pub fn merge_into(self, target: &mut Document, at: usize) -> TiffResult<usize> {
    target.insert(at, &self)
  }

  /// Decodes the pixels of one page.
  pub fn decode_page(&self, index: usize) -> TiffResult<PixelBuffer> {
    let ifd = self.arena.get(self.page_id(index)?);
    let image = Image::from_ifd(ifd)?;
    let payload = ifd
      .payload
      .as_ref()
      .ok_or(TiffFormatError::RequiredTagNotFound(image.layout.tags().0))?;
    assemble(&image, &payload.chunks, self.byte_order, &self.limits)
  }

  /// Decodes every page; one page failing does not affect the others.
  pub fn decode_pages(&self) -> Vec<TiffResult<PixelBuffer>> {
    (0..self.pages.len()).map(|index| self.decode_page(index)).collect()
  }

  /// Sets a field on a page's directory after checking its type against the tag registry.
  pub fn set_field(&mut self, index: usize, tag: impl Into<u16>, value: Value) -> TiffResult<()> {
    let tag = tag.into();
    let id = self.page_id(index)?;
    if !registry::accepts(DirectoryKind::Main, tag, &value) {
      return Err(UsageError::ValueTypeMismatch(tag).into());
    }
    self.arena.get_mut(id).set(tag, value);
    Ok(())
  }

  pub fn set_metadata(&mut self, index: usize, kind: Metadata, blob: Vec<u8>) -> TiffResult<()> {
    let id = self.page_id(index)?;
    self.arena.get_mut(id).set_metadata(kind, blob);
    Ok(())
  }

  /// Writes the whole document to `writer`, which must be positioned at the start of the stream.
  pub fn write_to<W: Write + Seek>(&self, writer: W) -> TiffResult<W> {
    DocumentEncoder::new(&self.arena, &self.pages, self.byte_order).write(writer)
  }

  pub fn to_bytes(&self) -> TiffResult<Vec<u8>> {
    Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
  }

  fn renumber(&mut self) {
    let last = u16::try_from(self.pages.len().saturating_sub(1)).unwrap_or(u16::MAX);
    for (index, &id) in self.pages.iter().enumerate() {
      let index = u16::try_from(index).unwrap_or(u16::MAX);
      self.arena.get_mut(id).set(Tag::PageNumber, Value::Short(vec![index, last]));
    }
  }
}

/// Rewrites the pixel data of a page read in byte order `from` so it is valid in byte order `to`.
///
/// Only depths that are whole bytes above 8 bits are touched. Uncompressed chunks are swapped in
/// place, compressed ones are decoded, swapped and encoded again. Chunks of a codec that cannot
/// encode are copied unchanged.
fn convert_byte_order(ifd: &mut Ifd, from: ByteOrder, to: ByteOrder) -> TiffResult<()> {
  if from == to || ifd.kind != DirectoryKind::Main || ifd.payload.is_none() {
    return Ok(());
  }
  let image = match Image::from_ifd(ifd) {
    Ok(image) => image,
    Err(err) => {
      warn!("copying pixel data without byte order conversion: {err}");
      return Ok(());
    }
  };
  let bits = image.bits_per_sample;
  if bits <= 8 || bits % 8 != 0 {
    return Ok(());
  }
  // the floating point predictor stores samples as byte planes, which a sample swap would mix
  if image.predictor == Predictor::FloatingPoint {
    warn!("copying floating point predicted pixel data without byte order conversion");
    return Ok(());
  }
  let sample_bytes = usize::from(bits / 8);

  let params = CodecParams {
    width: image.tile_attributes.tile_width,
    row_bytes: image.row_bytes(image.tile_attributes.tile_width),
    fill_order: image.fill_order,
    ..CodecParams::default()
  };
  let codec = match codec_for(image.compression_method, &params) {
    Ok(codec) => codec,
    Err(err) => {
      warn!("copying {:?} pixel data without byte order conversion: {err}", image.compression_method);
      return Ok(());
    }
  };

  let Some(ref mut payload) = ifd.payload else { return Ok(()) };
  for (index, chunk) in payload.chunks.iter_mut().enumerate() {
    if image.compression_method == CompressionMethod::None {
      bytecast::swap_sample_bytes(chunk, sample_bytes);
    } else {
      let mut raw = codec.decode_exact(chunk, image.expected_chunk_len(index))?;
      bytecast::swap_sample_bytes(&mut raw, sample_bytes);
      *chunk = codec.encode(&raw)?;
    }
  }
  debug!("converted {} chunks of {bits}-bit samples from {from:?} to {to:?}", payload.chunks.len());
  Ok(())
}

/// A borrowed view of one page.
#[derive(Clone, Copy)]
pub struct Page<'a> {
  document: &'a Document,
  id: IfdId,
  index: usize,
}

impl<'a> Page<'a> {
  pub fn index(&self) -> usize {
    self.index
  }

  pub fn ifd(&self) -> &'a Ifd {
    self.document.arena.get(self.id)
  }

  pub fn field(&self, tag: impl Into<u16>) -> Option<&'a Field> {
    self.ifd().get(tag)
  }

  pub fn decode(&self) -> TiffResult<PixelBuffer> {
    self.document.decode_page(self.index)
  }

  /// The `(index, last index)` pair of the `PageNumber` field.
  pub fn page_number(&self) -> Option<(u16, u16)> {
    match self.ifd().value(Tag::PageNumber)?.to_u32_vec().ok()?.as_slice() {
      &[index, last] => Some((u16::try_from(index).ok()?, u16::try_from(last).ok()?)),
      _ => None,
    }
  }

  /// Sub-directories the page points to with `tag`, such as its EXIF directory.
  pub fn children(&self, tag: Tag) -> impl Iterator<Item = &'a Ifd> + 'a {
    let arena = &self.document.arena;
    self.ifd().children_of(tag).iter().map(move |&id| arena.get(id))
  }
}
