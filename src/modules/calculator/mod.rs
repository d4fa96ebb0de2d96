mod controller;

pub use controller::{CalculatorController, number_value};
