mod dispatch;
pub mod exec;
pub mod explain;
pub mod replay;

pub use dispatch::dispatch;
