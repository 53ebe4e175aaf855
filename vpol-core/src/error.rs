use thiserror::Error;

/// Failures a statement handler can raise.
///
/// Every variant here is a script-correctness error: it aborts the run.
/// Network reachability failures (`network.http_check` outcomes, a
/// `network.send_packet` that gets no reply) are printed by their handlers
/// and never surface through this type.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{0}")]
    Syntax(String),

    #[error("Variable '{0}' not defined.")]
    UndefinedVariable(String),

    #[error("Function '{0}' not defined")]
    UndefinedFunction(String),

    #[error("{0}")]
    ControlFlow(String),

    #[error("Invalid if statement: only '=' comparisons are supported.")]
    UnsupportedCondition,

    #[error("Invalid JSON format")]
    InvalidJson(#[source] serde_json::Error),

    #[error("send_packet requires 4 arguments: IP, port, protocol, size")]
    Arity,

    #[error("Protocol must be either 'tcp' or 'udp'")]
    InvalidProtocol,

    #[error("Failed to ping {0}")]
    PingFailed(String),

    /// Strict mode only. Lenient mode overwrites silently.
    #[error("Function '{0}' already defined")]
    FunctionRedefined(String),

    /// Strict mode only. Lenient mode skips the line silently.
    #[error("Unrecognized statement")]
    UnknownStatement,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A runtime error annotated with the 1-based script line it was raised on.
///
/// Function body lines report the line number of the call site, since the
/// body itself was lifted out of the statement stream by the preprocessor.
#[derive(Debug, Error)]
#[error("VPOL Error on line {line}: {kind}")]
pub struct ScriptError {
    pub line: usize,
    #[source]
    pub kind: RuntimeError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_error_display_carries_line() {
        let err = ScriptError {
            line: 7,
            kind: RuntimeError::UndefinedVariable("host".into()),
        };
        assert_eq!(
            err.to_string(),
            "VPOL Error on line 7: Variable 'host' not defined."
        );
    }
}
