pub mod response;

pub use response::{Page, ScrollPage, UpdateSummary};
