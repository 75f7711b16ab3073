pub mod account;
pub mod session;

pub use account::{CreateUser, Email, Service, User, UserWithServices};
pub use session::{ConnectionInformations, Session};
