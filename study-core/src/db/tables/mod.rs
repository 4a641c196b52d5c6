pub mod experiments;
pub mod pings;
pub mod preferences;
