//! The encodings a column chunk's pages are built from: varint framing,
//! bit-packed integer blocks, and the hybrid RLE / bit-packed stream used
//! for definition levels and dictionary indices.

pub mod bitpacked;
pub mod rle;
pub mod uleb128;
