//! Small shared helpers with no domain knowledge.

pub mod dates;
pub mod xml;
