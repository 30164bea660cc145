pub mod mail;
pub mod observer;
pub mod renderer;

pub use mail::*;
pub use observer::*;
pub use renderer::*;
