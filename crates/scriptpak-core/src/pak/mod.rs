// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Binary container codec.
//!
//! # File Structure
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ FileHeader (28 bytes)        │
//! ├──────────────────────────────┤
//! │ Parameter values             │
//! ├──────────────────────────────┤
//! │ Composites                   │
//! │   name region + header block │
//! │   block payloads and rows    │
//! │   CompositeRecord (112 B)    │
//! ├──────────────────────────────┤
//! │ Parameter offset table       │
//! │ Composite offset table       │
//! └──────────────────────────────┘
//! ```
//!
//! All integers are little-endian and every offset counts 4-byte words from
//! the start of the file.
//!
//! Each composite opens with its name and header block:
//!
//! ```text
//! name id │ name bytes, NUL, pad │ back │ composite id │ 0
//!                                         ^ COMPOSITE_HEADER slot
//! ```
//!
//! `back` counts words from itself back to the name id.

pub mod cursor;
pub mod read;
pub mod types;
pub mod write;

pub use read::{read_commands, ParseError};
pub use types::{DataBlock, OffsetPair};
pub use write::{apply_resource_requirements, write_commands, SaveError};
