pub mod board;
pub mod sprint;
pub mod ticket;
