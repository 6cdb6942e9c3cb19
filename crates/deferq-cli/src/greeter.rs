//! Built-in target so the binary is usable without writing any code.

use deferq_core::InvokeError;
use deferq_core::Target;
use deferq_core::typed::arg;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Greeter {
    pub greeting: String,
}

impl Greeter {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            greeting: greeting.into(),
        }
    }

    fn message(&self, name: &str) -> Result<String, InvokeError> {
        if name.trim().is_empty() {
            return Err(InvokeError::new("empty_name", "nobody to greet"));
        }
        Ok(format!("{}, {}!", self.greeting, name))
    }
}

impl Target for Greeter {
    const TYPE: &'static str = "deferq.greeter.v1";
    const INSTANCE_METHODS: &'static [&'static str] = &["greet"];
    const STATIC_METHODS: &'static [&'static str] = &["shout"];

    fn call(&self, method: &str, args: &[serde_json::Value]) -> Result<(), InvokeError> {
        match method {
            "greet" => {
                let name: String = arg(args, 0)?;
                println!("{}", self.message(&name)?);
                Ok(())
            }
            _ => Err(InvokeError::method_missing(Self::TYPE, method)),
        }
    }

    fn call_static(method: &str, args: &[serde_json::Value]) -> Result<(), InvokeError> {
        match method {
            "shout" => {
                let name: String = arg(args, 0)?;
                println!("{}", Greeter::new("HEY").message(&name)?.to_uppercase());
                Ok(())
            }
            _ => Err(InvokeError::method_missing(Self::TYPE, method)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn greets_by_name() {
        let greeter = Greeter::new("Hello");
        assert_eq!(greeter.message("Ada").unwrap(), "Hello, Ada!");
        assert!(greeter.call("greet", &[json!("Ada")]).is_ok());
    }

    #[test]
    fn empty_name_fails_the_task() {
        let err = Greeter::new("Hello").call("greet", &[json!(" ")]).unwrap_err();
        assert_eq!(err.kind, "empty_name");
    }

    #[test]
    fn missing_argument_fails_the_task() {
        let err = Greeter::call_static("shout", &[]).unwrap_err();
        assert_eq!(err.kind, "missing_argument");
    }
}
