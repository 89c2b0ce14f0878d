//! Pipeline stages for label harvesting.
//!
//! Each submodule implements exactly one step. Network and vendor boundaries
//! (`fetch`, `resolve`'s probe, `parse`) sit behind traits so the rest of the
//! pipeline can be exercised with in-memory fakes.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ extract ──▶ resolve ──▶ parse ──▶ postprocess ──▶ naming
//! (HTML)    (record)    (pdfium)    (remote)   (cleanup)       (filename)
//! ```
//!
//! 1. [`fetch`]: GET the detail page; detect the "not found" landing redirect
//! 2. [`extract`]: pull labelled fields and rendition links out of the page
//! 3. [`resolve`]: download every rendition and pick the first with a text layer
//! 4. [`parse`]: convert the winner through the parsing service with
//!    retry and credential rotation
//! 5. [`postprocess`]: blank-line collapse, table cleanup, indication capture
//! 6. [`naming`]: derive the archive filename
//!
//! The electronic-label path skips 3–4 and renders HTML sections locally via
//! [`markup`].

pub mod extract;
pub mod fetch;
pub mod llama;
pub mod markup;
pub mod naming;
pub mod parse;
pub mod postprocess;
pub mod resolve;
