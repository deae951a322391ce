pub mod dispatch;
pub mod lifecycle;
pub mod notify;
