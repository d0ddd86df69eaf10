#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod parser;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{ColumnPolicy, LayoutConfig, LayoutOverrides};
pub use error::{Error, Result};
pub use layout::{LayoutStats, SelectionStats, compute_layout, layout_selected_groups};
pub use parser::{Document, parse_document};
