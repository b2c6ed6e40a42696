pub mod agent;
pub mod chart;
