// SPDX-License-Identifier: MIT

//! Start block: graph root with a single boolean trigger

use super::BlockOutcome;
use crate::bdk::port::{DataKind, PortSet};
use serde_json::Value;

pub const GO: &str = "go";

/// Input that API, Logic, Transform and InteractiveUI blocks declare so a
/// Start `go` can fire them without writing into a data port. Execution
/// never reads it.
pub const TRIGGER: &str = "trigger";

pub(crate) fn declare_ports(outputs: &mut PortSet) {
    outputs.register(GO, DataKind::Boolean, None);
}

pub(crate) fn declare_trigger(inputs: &mut PortSet) {
    inputs.register(TRIGGER, DataKind::Boolean, None);
}

pub(crate) fn execute() -> BlockOutcome {
    BlockOutcome::single(GO, Value::Bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_fires_go() {
        let mut outputs = PortSet::new();
        declare_ports(&mut outputs);
        assert_eq!(outputs.get(GO), Some(&Value::Bool(false)));

        let outcome = execute();
        assert_eq!(outcome.outputs[GO], Value::Bool(true));
    }

    #[test]
    fn test_trigger_is_a_false_boolean() {
        let mut inputs = PortSet::new();
        declare_trigger(&mut inputs);
        assert_eq!(inputs.get(TRIGGER), Some(&Value::Bool(false)));
        assert_eq!(inputs.meta(TRIGGER).unwrap().data_type, DataKind::Boolean);
    }
}
