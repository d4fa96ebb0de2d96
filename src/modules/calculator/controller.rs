use crate::controller::{Arguments, Controller, MetadataStore, handler};
use crate::error::Result;
use crate::pipe::builtins::ParseNumberPipe;
use serde_json::{Number, Value};
use std::sync::Arc;

/// Adds two numbers. Exercises query binding with a converter.
#[derive(Debug, Default, Clone, Copy)]
pub struct CalculatorController;

impl CalculatorController {
    pub async fn add(&self, a: f64, b: f64) -> Result<Value> {
        Ok(number_value(a + b))
    }
}

impl Controller for CalculatorController {
    fn describe(meta: &mut MetadataStore<Self>) {
        meta.set_controller_route("calculator");

        meta.method(
            "add",
            handler(|c: Arc<Self>, args: Arguments| async move {
                c.add(args.require(0)?, args.require(1)?).await
            }),
        )
        .get("add")
        .from_query(0, "a", ParseNumberPipe)
        .from_query(1, "b", ParseNumberPipe);
    }
}

/// JSON number for `n`, written as an integer when it has no fractional part.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}
