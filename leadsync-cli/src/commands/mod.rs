pub mod check;
pub mod daemon;
pub mod normalize;
pub mod sync;
