mod controller;

pub use controller::DbController;
