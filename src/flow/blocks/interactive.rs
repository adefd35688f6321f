// SPDX-License-Identifier: MIT

//! InteractiveUI block
//!
//! The component itself renders on an external surface; this side only holds
//! the editor payload and whatever values the surface reports back into the
//! block's outputs. Execution is a no-op.

use super::start::TRIGGER;
use crate::bdk::port::{DataKind, PortSet};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TITLE: &str = "title";
pub const ON_TEXT_ENTERED: &str = "onTextEntered";

const DEFAULT_JSX: &str = r#"export default function InteractiveForm({ title = "Interactive Form", onWorkflowOutputChange }) {
  const [value, setValue] = React.useState('');
  return (
    <div>
      <h3>{title}</h3>
      <input value={value} onChange={(e) => setValue(e.target.value)} />
      <button onClick={() => onWorkflowOutputChange && onWorkflowOutputChange('onTextEntered', value)}>
        Send
      </button>
    </div>
  );
}
"#;

const DEFAULT_CSS: &str = "div { padding: 10px; }\n";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InteractiveConfig {
    pub jsx_code: String,
    pub css_code: String,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            jsx_code: DEFAULT_JSX.to_string(),
            css_code: DEFAULT_CSS.to_string(),
        }
    }
}

/// Ports that survive any port sync
pub fn default_inputs() -> [(&'static str, DataKind, Option<Value>); 2] {
    [
        (TITLE, DataKind::String, Some(json!("Interactive Form"))),
        (TRIGGER, DataKind::Boolean, None),
    ]
}

pub fn default_outputs() -> [(&'static str, DataKind); 1] {
    [(ON_TEXT_ENTERED, DataKind::String)]
}

pub fn is_default_input(key: &str) -> bool {
    key == TITLE || key == TRIGGER
}

pub fn is_default_output(key: &str) -> bool {
    key == ON_TEXT_ENTERED
}

pub(crate) fn declare_ports(inputs: &mut PortSet, outputs: &mut PortSet) {
    for (key, kind, default) in default_inputs() {
        inputs.register(key, kind, default);
    }
    for (key, kind) in default_outputs() {
        outputs.register(key, kind, None);
    }
}
