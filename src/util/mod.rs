//! Utility functions shared by the generator and the harvester.
//!
//! - **Text**: XML escaping, block indentation, path helpers
//! - **Links**: origin normalization, root-relative link resolution and
//!   text fragment links
//! - **Dates**: parsing stored timestamps, RFC 822 rendering
//!
//! # Examples
//!
//! ```
//! use feedpress::util::{absolutize, to_xml_string};
//!
//! assert_eq!(to_xml_string("R&D"), "R&#38;D");
//! assert_eq!(
//!     absolutize("https://example.org/", "/about"),
//!     "https://example.org/about"
//! );
//! ```

mod dates;
mod links;
mod text;

pub use dates::{parse_timestamp, to_rfc822};
pub use links::{absolutize, join_path, origin_root, TextFragment};
pub use text::{date_prefix, indent_text, markdown_to_html_path, to_xml_string};
