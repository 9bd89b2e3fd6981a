//! Pipeline stages for filling a presentation template.
//!
//! Each submodule implements one stage and works on the in-memory
//! [`crate::deck::Presentation`], so every stage is testable against a deck
//! built in code without any zip or XML in sight.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ markdown ──▶ locate ──▶ richtext ──▶ financials ──▶ images
//! (template)  (clean)     (tokens)   (runs)       (grid)         (charts)
//! ```
//!
//! 1. [`input`]      — read the template from disk or a URL; check the zip magic
//! 2. [`markdown`]   — strip headings and links; parse pipe tables
//! 3. [`locate`]     — find `{{token}}` shapes; whole-shape vs inline
//! 4. [`richtext`]   — rebuild paragraphs and runs with emphasis and fonts
//! 5. [`financials`] — derive growth and margins; assemble the 8-row grid
//! 6. [`images`]     — fetch charts; place them at tokens or fixed slots
//!    ([`encode`] decodes and, when needed, transcodes them first)

pub mod encode;
pub mod financials;
pub mod images;
pub mod input;
pub mod locate;
pub mod markdown;
pub mod richtext;
