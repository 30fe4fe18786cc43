pub mod availability_service;
pub mod change_applier;
pub mod invalidation;
pub mod overlap_resolver;
pub mod peak_season_service;
