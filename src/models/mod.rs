pub mod session;
pub mod summary;
pub mod trip;
pub mod user;
