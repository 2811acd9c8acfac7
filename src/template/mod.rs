//! DOCX placeholder template engine.
//!
//! - `placeholder` - fragment-tolerant matching, escaping and substitution on XML text
//! - `docx` - walks the zip package and rewrites only the XML parts
//! - `validation` - required-placeholder checks before anything is rendered

pub mod docx;
pub mod placeholder;
pub mod validation;

use std::collections::BTreeMap;

pub use docx::{render_docx, render_docx_file};
pub use placeholder::{format_docx_value, render_xml_part, xml_escape};
pub use validation::{ensure_required_placeholders, ValidationError, ValidationErrors};

/// Placeholder token (e.g. `{{applicant_name}}`) to display value.
pub type Replacements = BTreeMap<String, String>;
