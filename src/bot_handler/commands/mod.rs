pub mod add_seeds;
pub mod event;
pub mod help;
pub mod my_plants;
pub mod plant;
pub mod planting;
pub mod seeds;
pub mod stages;
pub mod start;
pub mod timezone;
pub mod today;
