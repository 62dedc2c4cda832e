pub mod roomsync;
