// src/feed/mod.rs

//! Feed decoding and mapping.
//!
//! Raw page markup is decoded into a generic tree ([`xml`]), read through the
//! accessor combinators in [`tree`], and mapped into parsed entries by
//! [`mapper`].

pub mod mapper;
pub mod tree;
pub mod xml;

pub use mapper::{FeedPage, decode_page, map_entry, parse_deleted_entries, parse_entries};
