//! XML parsing module.

mod options;
mod xml;

pub use options::{ErrorMode, ParseOptions};
pub use xml::{parse_xml, XmlParser};
