pub mod number;
pub mod pool;
