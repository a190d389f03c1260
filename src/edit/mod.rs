//! Recent-changes relay lines and the edit events parsed from them.

mod parser;
mod types;

pub use self::parser::{language_from_channel, parse_message, strip_color_codes};
pub use self::types::*;
