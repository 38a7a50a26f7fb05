//! Protocol types and abstractions: the response object, the error
//! taxonomy, and the URL-splitting collaborator.

mod error;
mod response;
pub mod url;

pub use error::{HttpError, StateError};
pub use response::{Response, ResponseHead};
