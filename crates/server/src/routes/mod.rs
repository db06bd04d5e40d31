pub mod health;
pub mod players;
pub mod review_ws;
