pub mod amount;
pub mod order;
pub mod quote;
pub mod request;

pub use amount::*;
pub use order::*;
pub use quote::*;
pub use request::*;
