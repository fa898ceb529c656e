pub mod array;
pub mod losses;

pub use array::*;
pub use losses::*;
