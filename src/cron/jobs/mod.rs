pub mod roster_refresh;
pub mod sync_cycle;
