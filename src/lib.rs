//! Reading, editing and writing of multi-page TIFF documents
//!
//! TIFF (Tagged Image File Format) stores each page as an Image File Directory: a list of tagged
//! fields plus compressed strips or tiles of pixel data, chained to the next page's directory.
//! [`Document`] reads such a chain, lets pages be inserted, removed, reordered, split and merged,
//! and writes the result back with fresh offsets and page numbers.
//!
//! # Related Links
//! * <https://web.archive.org/web/20210108073850/https://www.adobe.io/open/standards/TIFF.html> -
//!   The TIFF specification

extern crate weezl;

pub use self::{
  decoder::ByteOrder,
  document::{Document, Page, SkippedPage},
  encoder::{Chunking, EncodeOptions},
  error::{TiffError, TiffFormatError, TiffResult, TiffUnsupportedError, UsageError},
  pixel::{PixelBuffer, SampleData},
};

mod bytecast;
pub mod codec;
pub mod color;
pub mod decoder;
pub mod document;
pub mod encoder;
mod error;
pub mod ifd;
pub mod pixel;
pub mod predictor;
pub mod registry;
pub mod tags;
