mod controller;
mod handler;
mod reconciler;
mod worker;

pub use controller::*;
pub use handler::*;
pub use reconciler::*;
