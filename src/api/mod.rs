//! HTTP API endpoints

mod report;
mod tasks;

pub use report::{report_handler, ReportRequest};
pub use tasks::{check_links_handler, get_status_handler, CheckRequest, CheckResponse};
