//! Core ManageSieve types.

mod capability;
mod listing;
mod response;
mod response_code;
mod status;

pub use capability::Capabilities;
pub use listing::ScriptListing;
pub use response::Response;
pub use response_code::{QuotaKind, ResponseCode};
pub use status::{Status, StatusKind};
