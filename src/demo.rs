//! Sample `Calculator` type used by the CLI and the benches

use crate::dispatch::DispatchTable;
use crate::error::Result;
use crate::operation::OperationKey;
use serde_json::{json, Value};

pub const CALCULATOR: &str = "Calculator";

/// Largest `n` whose Fibonacci number fits in a `u64`
const MAX_FIBONACCI: u64 = 93;

/// Operations defined by [`define_calculator`]
pub fn calculator_operations() -> Vec<OperationKey> {
    vec![
        OperationKey::instance(CALCULATOR, "compute"),
        OperationKey::instance(CALCULATOR, "describe"),
        OperationKey::type_level(CALCULATOR, "fibonacci"),
    ]
}

/// Define `Calculator#compute`, `Calculator#describe` and `Calculator.fibonacci`
pub fn define_calculator(table: &DispatchTable) -> Result<()> {
    table.define_instance(CALCULATOR, "compute", |inv| {
        let x = inv
            .argument_i64(0)
            .ok_or_else(|| anyhow::anyhow!("compute expects an integer argument"))?;
        let next = x
            .checked_add(1)
            .ok_or_else(|| anyhow::anyhow!("compute({x}) overflows i64"))?;
        Ok(json!(next))
    })?;

    table.define_instance(CALCULATOR, "describe", |inv| {
        let name = inv
            .receiver()
            .state()
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("anonymous");
        Ok(json!(format!("Calculator({name})")))
    })?;

    table.define_type(CALCULATOR, "fibonacci", |inv| {
        let n = inv
            .argument(0)
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow::anyhow!("fibonacci expects a non-negative integer"))?;
        if n > MAX_FIBONACCI {
            anyhow::bail!("fibonacci({n}) overflows u64");
        }
        let (mut a, mut b) = (0u64, 1u64);
        for _ in 0..n {
            // b runs one step ahead and may saturate on the last step
            (a, b) = (b, a.saturating_add(b));
        }
        Ok(json!(a))
    })?;

    Ok(())
}

/// Call every calculator operation `iterations` times; returns the sum of `compute` results
pub fn run_workload(table: &DispatchTable, iterations: u64) -> anyhow::Result<i64> {
    let state = json!({"name": "demo"});
    let mut checksum = 0i64;
    for i in 0..iterations {
        let computed = table.call_instance(CALCULATOR, "compute", state.clone(), vec![json!(i)])?;
        checksum = checksum
            .checked_add(computed.as_i64().unwrap_or(0))
            .ok_or_else(|| anyhow::anyhow!("workload checksum overflows i64 after {i} iterations"))?;
        table.call_instance(CALCULATOR, "describe", state.clone(), vec![])?;
        table.call_type(CALCULATOR, "fibonacci", vec![json!(i % 40)])?;
    }
    Ok(checksum)
}
