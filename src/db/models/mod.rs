mod appointment;
mod availability;
mod recurrence;

pub use appointment::*;
pub use availability::*;
pub use recurrence::*;
