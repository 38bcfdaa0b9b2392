//! Application services
//!
//! Built per request over the shared store, like the repository in handlers.

mod news;
mod reports;
mod users;

pub use news::NewsService;
pub use reports::ReportService;
pub use users::UserService;
