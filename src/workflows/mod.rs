pub mod placement;
pub mod roster;
