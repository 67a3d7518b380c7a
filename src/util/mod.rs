//! Terminal text helpers.
//!
//! Feed text is untrusted and arbitrary width; these keep one article on one
//! row of the listing:
//!
//! ```
//! use headline::util::{fit_to_width, single_line};
//!
//! let cell = fit_to_width(&single_line("Breaking\nnews"), 10);
//! assert_eq!(cell, "Breaking …");
//! ```

mod text;

pub use text::{display_width, fit_to_width, single_line, truncate_to_width};
