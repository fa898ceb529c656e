pub mod decomposition;
pub mod iam;
pub mod transposition;

pub use decomposition::*;
pub use iam::*;
pub use transposition::*;
