//! Crawl-stage building blocks.
//!
//! Each submodule handles one step for a single reference; [`crate::crawl`]
//! sequences them.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌─ Page ─▶ render ──▶ clean ──▶ links ──▶ fetch ──▶ normalize
//! classify ──┤
//!            └─ File ─▶ fetch ──▶ normalize
//! ```
//!
//! 1. [`classify`]: page or file, decided from the URL alone
//! 2. [`render`]: [`render::PageRenderer`] trait and the Chromium
//!    implementation with a bounded DOM-idle wait
//! 3. [`clean`]: strip non-content elements and attributes, collect
//!    absolute `href`s, cut to the main-content container
//! 4. [`links`]: pick downloadable links and derive canonical URLs and
//!    candidate filenames
//! 5. [`fetch`]: [`fetch::FileFetcher`] trait and the `curl` implementation
//! 6. [`normalize`]: office formats to HTML or text; runs in `spawn_blocking`
//! 7. [`naming`]: filesystem-safe `NNN_<stem><ext>` names

pub mod classify;
pub mod clean;
pub mod fetch;
pub mod links;
pub mod naming;
pub mod normalize;
pub mod render;
