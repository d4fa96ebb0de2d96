//! HTTP feature modules.

pub mod calculator;
pub mod db;

pub use calculator::CalculatorController;
pub use db::DbController;
