pub mod allowance;
pub mod error;
pub mod intent;
pub mod mock;
pub mod router;
pub mod traits;
pub mod vanilla;

pub use allowance::*;
pub use error::*;
pub use intent::*;
pub use mock::*;
pub use router::*;
pub use traits::*;
pub use vanilla::*;
