pub mod navigation;
pub mod request;
pub mod session;
