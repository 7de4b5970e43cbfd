use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::RuntimeError;
use crate::value::{NativeFunction, Value};

/// Host functions defined in every global environment.
pub fn all() -> Vec<NativeFunction> {
    vec![
        NativeFunction {
            name: "clock",
            arity: 0,
            func: clock,
        },
        NativeFunction {
            name: "sleep",
            arity: 1,
            func: sleep,
        },
        NativeFunction {
            name: "str",
            arity: 1,
            func: str,
        },
    ]
}

/// Milliseconds since the Unix epoch.
fn clock(_args: &[Value]) -> Result<Value, RuntimeError> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0);
    Ok(Value::Number(millis))
}

fn sleep(args: &[Value]) -> Result<Value, RuntimeError> {
    match args.first() {
        Some(Value::Number(ms)) => {
            thread::sleep(Duration::from_millis(ms.max(0.0) as u64));
            Ok(Value::Nil)
        }
        other => Err(RuntimeError::Native(format!(
            "sleep expected a number of milliseconds, not {}",
            other.map_or("nothing", Value::type_name)
        ))),
    }
}

fn str(args: &[Value]) -> Result<Value, RuntimeError> {
    let text = args.first().map(Value::to_string).unwrap_or_default();
    Ok(Value::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_milliseconds_since_epoch() {
        let Value::Number(ms) = clock(&[]).unwrap() else {
            panic!("Expected number");
        };
        // Later than 2020-01-01 in milliseconds
        assert!(ms > 1_577_836_800_000.0);
    }

    #[test]
    fn sleep_returns_nil() {
        assert_eq!(sleep(&[Value::Number(1.0)]).unwrap(), Value::Nil);
    }

    #[test]
    fn sleep_rejects_non_numbers() {
        let err = sleep(&[Value::String("soon".to_string())]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::Native("sleep expected a number of milliseconds, not string".to_string())
        );
    }

    #[test]
    fn str_uses_display_form() {
        assert_eq!(
            str(&[Value::Number(3.0)]).unwrap(),
            Value::String("3".to_string())
        );
        assert_eq!(str(&[Value::Nil]).unwrap(), Value::String("nil".to_string()));
    }

    #[test]
    fn registers_every_native_once() {
        let names: Vec<_> = all().iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["clock", "sleep", "str"]);
    }
}
