pub mod availability;
pub mod calendar;
pub mod dates;
pub mod peak_season;
pub mod pricing;
pub mod range_evaluator;
pub mod room;
