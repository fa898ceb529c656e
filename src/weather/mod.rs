pub mod normalize;
pub mod series;

pub use normalize::*;
pub use series::*;
