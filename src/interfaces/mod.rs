pub mod capabilities;
pub mod providers;
pub mod scheduler;
