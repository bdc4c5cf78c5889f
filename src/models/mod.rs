mod auth;
mod catalog;
mod design;
mod notifications;
mod requests;

pub use auth::*;
pub use catalog::*;
pub use design::*;
pub use notifications::*;
pub use requests::*;
