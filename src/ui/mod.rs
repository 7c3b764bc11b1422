//! Discord message builders for player output.

pub mod buttons;
pub mod embeds;
