use super::ledger::{Entry, Value};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

type NodeFn = dyn Fn(&[Value]) -> Result<Entry, String> + Send + Sync;

/// A pure node function plus the name it is audited under.
///
/// Arguments arrive positionally, in the order the node declared its
/// dependencies. The function may return a bare number/series or an already
/// traced field; errors are rendered to strings at registration time so every
/// formula shares one call signature.
#[derive(Clone)]
pub struct Formula {
    expression: String,
    func: Arc<NodeFn>,
}

impl Formula {
    pub fn new<F, R, E>(expression: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<R, E> + Send + Sync + 'static,
        R: Into<Entry>,
        E: fmt::Display,
    {
        let func = move |args: &[Value]| -> Result<Entry, String> {
            f(args).map(Into::into).map_err(|e| e.to_string())
        };
        Self { expression: expression.into(), func: Arc::new(func) }
    }

    /// Convenience for the common all-scalar case.
    ///
    /// Fails with a calculation error if any argument is a multi-element series.
    pub fn scalar<F>(expression: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::new(expression, move |args: &[Value]| {
            let scalars = args
                .iter()
                .enumerate()
                .map(|(i, v)| v.as_scalar().ok_or_else(|| format!("argument {} is not a scalar", i)))
                .collect::<Result<Vec<f64>, String>>()?;
            Ok::<_, String>(f(&scalars))
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Invokes the function. A panic inside it is caught and returned as an
    /// error carrying the panic message.
    pub fn call(&self, args: &[Value]) -> Result<Entry, String> {
        panic::catch_unwind(AssertUnwindSafe(|| (self.func)(args)))
            .unwrap_or_else(|payload| Err(format!("node function panicked: {}", panic_message(&*payload))))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formula").field("expression", &self.expression).finish()
    }
}
