//! Pipeline stages for screenshot slicing.
//!
//! Each submodule implements exactly one step. The geometry stages are pure
//! functions over plain data; only `input`, `decode`, `ocr` and `llm` touch
//! the filesystem or the network.
//!
//! ## Data Flow
//!
//! ```text
//!                    ┌──▶ ocr ──▶ text ──┐
//! input ──▶ decode ──┼──▶ encode ──▶ llm ┼──▶ bands ──▶ candidates ──▶ footer ──▶ validate
//!                    └──▶ edges ─────────┘
//! ```
//!
//! 1. [`input`]      canonicalise the path or URL to a local image file
//! 2. [`decode`]     decode pixels in `spawn_blocking`
//! 3. [`ocr`]        text detection (Google Vision or a saved response)
//! 4. [`text`]       flatten the annotation into clamped [`text::TextBlock`]s
//! 5. [`encode`] / [`llm`]  optional semantic boundary proposal
//! 6. [`edges`]      row-profile visual cut candidates
//! 7. [`bands`]      padded, merged no-cut zones
//! 8. [`candidates`] uniform grid, low-risk bands, nearest-line lookup
//! 9. [`footer`]     footer start and confidence
//! 10. [`validate`]  repair the proposal into the final slices

pub mod bands;
pub mod candidates;
pub mod decode;
pub mod edges;
pub mod encode;
pub mod footer;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod text;
pub mod validate;
