pub mod catalogue;
pub mod inverter;
pub mod model;
pub mod parameters;
pub mod single_diode;
pub mod temperature;

pub use catalogue::*;
pub use inverter::*;
pub use model::*;
pub use parameters::*;
pub use single_diode::*;
pub use temperature::*;
