pub mod animation;
pub mod effect;
pub mod entity;
pub mod geom;
pub mod grid;
pub mod physics;
pub mod player;
pub mod tile;
pub mod weapon;
