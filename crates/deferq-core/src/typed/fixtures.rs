//! Targets shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::registry::TargetRegistry;
use super::target::{Target, arg};
use crate::domain::InvokeError;

/// Invocation counts keyed by `Recorder::key`. Tests pick unique keys, so
/// they can run in parallel.
static RECORDS: LazyLock<Mutex<HashMap<String, usize>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub fn recorded(key: &str) -> usize {
    RECORDS.lock().unwrap().get(key).copied().unwrap_or(0)
}

fn bump(key: &str) {
    *RECORDS.lock().unwrap().entry(key.to_string()).or_default() += 1;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recorder {
    pub key: String,
}

impl Recorder {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
        }
    }
}

impl Target for Recorder {
    const TYPE: &'static str = "test.recorder.v1";
    const INSTANCE_METHODS: &'static [&'static str] =
        &["record", "record_slowly", "fail", "fail_slowly", "fail_then_record", "panic"];
    const STATIC_METHODS: &'static [&'static str] = &["ping", "static_fail"];

    fn call(&self, method: &str, args: &[serde_json::Value]) -> Result<(), InvokeError> {
        match method {
            "record" => {
                bump(&self.key);
                Ok(())
            }
            "record_slowly" => {
                let millis: u64 = arg(args, 0)?;
                std::thread::sleep(Duration::from_millis(millis));
                bump(&self.key);
                Ok(())
            }
            "fail" => {
                bump(&self.key);
                Err(InvokeError::new("boom", "always fails"))
            }
            "fail_slowly" => {
                let millis: u64 = arg(args, 0)?;
                std::thread::sleep(Duration::from_millis(millis));
                bump(&self.key);
                Err(InvokeError::new("boom", "always fails"))
            }
            // Fails until it has been called `args[0]` times.
            "fail_then_record" => {
                let failures: usize = arg(args, 0)?;
                bump(&self.key);
                if recorded(&self.key) <= failures {
                    Err(InvokeError::new("flaky", "not yet"))
                } else {
                    Ok(())
                }
            }
            "panic" => panic!("recorder {} panicked", self.key),
            _ => Err(InvokeError::method_missing(Self::TYPE, method)),
        }
    }

    fn call_static(method: &str, _args: &[serde_json::Value]) -> Result<(), InvokeError> {
        match method {
            "ping" => Ok(()),
            "static_fail" => Err(InvokeError::new("static", "static failure")),
            _ => Err(InvokeError::method_missing(Self::TYPE, method)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Other {
    pub name: String,
}

impl Target for Other {
    const TYPE: &'static str = "test.other.v1";
    const STATIC_METHODS: &'static [&'static str] = &["noop"];

    fn call_static(_method: &str, _args: &[serde_json::Value]) -> Result<(), InvokeError> {
        Ok(())
    }
}

pub fn fixture_registry() -> TargetRegistry {
    let mut registry = TargetRegistry::new();
    registry.register::<Recorder>().unwrap();
    registry.register::<Other>().unwrap();
    registry
}

pub fn shared_registry() -> Arc<TargetRegistry> {
    Arc::new(fixture_registry())
}
