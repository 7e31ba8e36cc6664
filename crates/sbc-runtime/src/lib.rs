#![doc = "Real-time periodic execution for the SBC demo applications."]

pub mod cancel;
pub mod clock;
pub mod edge;
pub mod realtime;
pub mod scheduler;

pub use cancel::*;
pub use clock::*;
pub use edge::*;
pub use realtime::*;
pub use scheduler::*;
