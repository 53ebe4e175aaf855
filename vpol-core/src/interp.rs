//! The interpreter proper: statement preprocessing, dispatch, and the
//! built-in command handlers that tie the evaluator, the state tables, and
//! the probe modules together.

use std::io::{BufRead, BufReader, Write};

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{RuntimeError, ScriptError};
use crate::expr;
use crate::gate::GateStack;
use crate::net::{self, Protocol};
use crate::state::{Functions, Variables};
use crate::terminal;

// ─────────────────────────────────────────────────────────────
// Surface tokens — these are the script file format
// ─────────────────────────────────────────────────────────────
const COMMENT_OPEN: &str = "#[[";
const COMMENT_CLOSE: &str = "]]";
const FN_OPEN: &str = "${";
const FN_CLOSE: &str = "}";
const CALL_PREFIX: &str = "~$";

/// Calls expand in place and share one native stack, so runaway recursion
/// is cut off well before it can fault.
const MAX_CALL_DEPTH: usize = 64;

/// Interpreter behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Reject function redefinition and unrecognized statements instead of
    /// silently accepting them.
    pub strict: bool,
}

/// The VPOL interpreter: variable and function tables, the control-flow
/// gate stack, and the I/O endpoints every built-in goes through.
///
/// State is per-instance; running two scripts needs two interpreters (or a
/// deliberate reuse of one to share variables).
pub struct Interpreter<'io> {
    vars: Variables,
    funcs: Functions,
    gates: GateStack,
    opts: Options,
    out: Box<dyn Write + 'io>,
    input: Box<dyn BufRead + 'io>,
    depth: usize,
}

impl Interpreter<'static> {
    /// Interpreter wired to the process stdin/stdout.
    pub fn new(opts: Options) -> Self {
        Self::with_io(opts, BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<'io> Interpreter<'io> {
    /// Interpreter with injected I/O endpoints, for tests and embedding.
    pub fn with_io<R, W>(opts: Options, input: R, out: W) -> Self
    where
        R: BufRead + 'io,
        W: Write + 'io,
    {
        Interpreter {
            vars: Variables::default(),
            funcs: Functions::default(),
            gates: GateStack::new(),
            opts,
            out: Box::new(out),
            input: Box::new(input),
            depth: 0,
        }
    }

    /// Read access to a variable, mainly for embedding and tests.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.lookup(name)
    }

    /// Execute a whole script: strip multi-line comments, capture function
    /// definition blocks, dispatch everything else in order.
    ///
    /// The first dispatcher error aborts the run. Variable mutations made
    /// before the failing line are kept.
    pub fn run(&mut self, source: &str) -> Result<(), ScriptError> {
        let mut in_comment = false;
        let mut defining: Option<(String, Vec<String>)> = None;
        let mut statements = 0usize;

        for (idx, raw) in source.lines().enumerate() {
            let line_num = idx + 1;
            let line = raw.trim();

            // The close marker only counts on lines after the opener.
            if in_comment {
                if line.ends_with(COMMENT_CLOSE) {
                    in_comment = false;
                }
                continue;
            }
            if line.starts_with(COMMENT_OPEN) {
                in_comment = true;
                continue;
            }

            // A new `${` while already defining abandons the unfinished body.
            if let Some(rest) = line.strip_prefix(FN_OPEN) {
                defining = Some((rest.trim().to_string(), Vec::new()));
                continue;
            }
            if let Some((name, mut body)) = defining.take() {
                if line == FN_CLOSE {
                    trace!(name = %name, lines = body.len(), "function captured");
                    self.funcs
                        .define(name, body, self.opts.strict)
                        .map_err(|kind| ScriptError { line: line_num, kind })?;
                } else {
                    body.push(line.to_string());
                    defining = Some((name, body));
                }
                continue;
            }

            statements += 1;
            self.dispatch(line, line_num)
                .map_err(|kind| ScriptError { line: line_num, kind })?;
        }

        debug!(statements, "run complete");
        Ok(())
    }

    /// Route one trimmed statement line by its leading token, first match
    /// wins. `if`/`elseif`/`else:` always dispatch since they manipulate
    /// the gate itself; everything else is subject to the current gate
    /// frame.
    fn dispatch(&mut self, line: &str, line_num: usize) -> Result<(), RuntimeError> {
        if line.is_empty() {
            return Ok(());
        }
        trace!(line_num, line, "dispatch");

        if line.starts_with("if") {
            return self.stmt_if(line);
        }
        if line.starts_with("elseif") {
            return self.stmt_elseif(line);
        }
        if line.starts_with("else:") {
            return self.gates.else_branch();
        }

        if !self.gates.allows() {
            return Ok(());
        }

        if line.starts_with('@') {
            return self.stmt_assign(line);
        }
        if line.starts_with("terminal.print") {
            return self.stmt_print(line);
        }
        if line.starts_with("terminal.set_title") {
            return self.stmt_set_title(line);
        }
        if line.starts_with("cls()") {
            terminal::clear(&mut self.out)?;
            return Ok(());
        }
        if line.starts_with("json.parse") {
            return self.stmt_json_parse(line);
        }
        if line.starts_with("network.ping") {
            return self.stmt_ping(line);
        }
        if line.starts_with("network.http_check") {
            return self.stmt_http_check(line);
        }
        if line.starts_with("network.send_packet") {
            return self.stmt_send_packet(line);
        }
        if line.starts_with(CALL_PREFIX) {
            return self.stmt_call(line, line_num);
        }
        if line.starts_with("terminal.input") {
            return self.stmt_input(line);
        }

        if self.opts.strict {
            return Err(RuntimeError::UnknownStatement);
        }
        trace!(line_num, line, "no handler, skipped");
        Ok(())
    }

    // ── Control flow ──────────────────────────────────────────

    fn stmt_if(&mut self, line: &str) -> Result<(), RuntimeError> {
        let cond = condition_of(line, "if")?;
        let hit = eval_condition(&self.vars, cond)?;
        self.gates.begin_chain(hit);
        Ok(())
    }

    fn stmt_elseif(&mut self, line: &str) -> Result<(), RuntimeError> {
        if !self.gates.in_chain() {
            return Err(RuntimeError::ControlFlow("elseif without if".into()));
        }
        let cond = condition_of(line, "elseif")?;
        let vars = &self.vars;
        self.gates.else_if(|| eval_condition(vars, cond))
    }

    // ── Variables ─────────────────────────────────────────────

    fn stmt_assign(&mut self, line: &str) -> Result<(), RuntimeError> {
        // `@name = {` opens a block the evaluator never looks at; it only
        // seeds the name with an empty string.
        if line.ends_with('{') {
            let name = line.split_once('=').map_or(line, |(lhs, _)| lhs);
            self.vars.set(strip_at(name.trim()), String::new());
            return Ok(());
        }

        let (name, value) = line
            .split_once('=')
            .ok_or_else(|| RuntimeError::Syntax("Invalid variable assignment".into()))?;
        let value = expr::evaluate(value.trim(), &self.vars)?;
        self.vars.set(strip_at(name.trim()), value);
        Ok(())
    }

    fn stmt_input(&mut self, line: &str) -> Result<(), RuntimeError> {
        let (prompt, name) = input_parts(line)
            .ok_or_else(|| RuntimeError::Syntax("Invalid input statement".into()))?;
        // Stored verbatim: input is never evaluated.
        let value = terminal::read_line(&mut self.input, &mut self.out, prompt)?;
        self.vars.set(name, value);
        Ok(())
    }

    // ── Console ───────────────────────────────────────────────

    fn stmt_print(&mut self, line: &str) -> Result<(), RuntimeError> {
        let content = call_args(line, "terminal.print")
            .ok_or_else(|| RuntimeError::Syntax("Invalid print statement".into()))?;
        let text = expr::evaluate(content.trim(), &self.vars)?;
        writeln!(self.out, "{}", text)?;
        Ok(())
    }

    fn stmt_set_title(&mut self, line: &str) -> Result<(), RuntimeError> {
        let arg = call_args(line, "terminal.set_title")
            .ok_or_else(|| RuntimeError::Syntax("Invalid set_title statement".into()))?;
        let title = expr::strip_quotes(arg.trim());
        terminal::set_title(&mut self.out, title)?;
        Ok(())
    }

    // ── JSON ──────────────────────────────────────────────────

    fn stmt_json_parse(&mut self, line: &str) -> Result<(), RuntimeError> {
        // Surface quirk kept for script compatibility: the closing paren
        // must be preceded by a space.
        let args = call_args(line, "json.parse")
            .and_then(|a| a.strip_suffix(' '))
            .ok_or_else(|| RuntimeError::Syntax("Invalid JSON parse statement".into()))?;
        let text = expr::evaluate(args.trim(), &self.vars)?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(RuntimeError::InvalidJson)?;

        // Validation only: the re-serialized form is observable through
        // debug logging, never on the output sink or in a variable.
        let mut buf = Vec::new();
        let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
        value
            .serialize(&mut ser)
            .map_err(RuntimeError::InvalidJson)?;
        debug!(pretty = %String::from_utf8_lossy(&buf), "json.parse validated");
        Ok(())
    }

    // ── Network probes ────────────────────────────────────────

    fn stmt_ping(&mut self, line: &str) -> Result<(), RuntimeError> {
        let arg = call_args(line, "network.ping")
            .ok_or_else(|| RuntimeError::Syntax("Invalid ping statement".into()))?;
        let addr = expr::evaluate(arg.trim(), &self.vars)?;
        net::ping(&mut self.out, &addr)
    }

    fn stmt_http_check(&mut self, line: &str) -> Result<(), RuntimeError> {
        let arg = call_args(line, "network.http_check")
            .ok_or_else(|| RuntimeError::Syntax("Invalid http_check statement".into()))?;
        let url = expr::evaluate(arg.trim(), &self.vars)?;
        net::http_check(&mut self.out, &url)
    }

    fn stmt_send_packet(&mut self, line: &str) -> Result<(), RuntimeError> {
        // Arguments end at the first `)`, not the last.
        let rest = line
            .strip_prefix("network.send_packet")
            .and_then(|r| r.strip_prefix('('))
            .ok_or_else(|| RuntimeError::Syntax("Invalid send_packet statement".into()))?;
        let close = rest
            .find(')')
            .ok_or_else(|| RuntimeError::Syntax("Invalid send_packet statement".into()))?;

        let mut args = Vec::new();
        for piece in rest[..close].split(',') {
            args.push(expr::evaluate(piece.trim(), &self.vars)?);
        }
        if args.len() != 4 {
            return Err(RuntimeError::Arity);
        }

        let port: u16 = args[1]
            .parse()
            .map_err(|_| RuntimeError::Syntax(format!("Invalid port: {}", args[1])))?;
        let size: usize = args[3]
            .parse()
            .map_err(|_| RuntimeError::Syntax(format!("Invalid packet size: {}", args[3])))?;
        let protocol = Protocol::from_arg(&args[2])?;
        net::send_packet(&mut self.out, &args[0], port, protocol, size)
    }

    // ── Function calls ────────────────────────────────────────

    /// `~$name`: replay the stored body through the dispatcher. The call
    /// gets its own gate frame, so a chain inside the body cannot disturb
    /// the caller's. Body lines report the call site's line number.
    fn stmt_call(&mut self, line: &str, line_num: usize) -> Result<(), RuntimeError> {
        let name = call_name(line)
            .ok_or_else(|| RuntimeError::Syntax("Invalid function call".into()))?;
        let body = self.funcs.get(name)?.to_vec();

        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::ControlFlow(format!(
                "call depth limit ({}) exceeded",
                MAX_CALL_DEPTH
            )));
        }
        self.depth += 1;
        self.gates.push();
        let result = body
            .iter()
            .try_for_each(|body_line| self.dispatch(body_line, line_num));
        self.gates.pop();
        self.depth -= 1;
        result
    }
}

// ─────────────────────────────────────────────────────────────
// Line-shape helpers
// ─────────────────────────────────────────────────────────────

/// Extract `<cond>` from `<kw> <cond>:`. The keyword must be followed by a
/// space and the line's last `:` closes the condition.
fn condition_of<'a>(line: &'a str, kw: &str) -> Result<&'a str, RuntimeError> {
    let malformed = || RuntimeError::Syntax(format!("Invalid {} statement", kw));
    let rest = line
        .strip_prefix(kw)
        .and_then(|r| r.strip_prefix(' '))
        .ok_or_else(malformed)?;
    let colon = rest.rfind(':').ok_or_else(malformed)?;
    if colon == 0 {
        return Err(malformed());
    }
    Ok(rest[..colon].trim())
}

/// Only `=` equality is supported: split on the first `=`, evaluate both
/// sides, compare the resulting strings exactly.
fn eval_condition(vars: &Variables, cond: &str) -> Result<bool, RuntimeError> {
    let (left, right) = cond
        .split_once('=')
        .ok_or(RuntimeError::UnsupportedCondition)?;
    let left = expr::evaluate(left.trim(), vars)?;
    let right = expr::evaluate(right.trim(), vars)?;
    Ok(left == right)
}

/// Capture the argument text of `name(...)`: everything between the `(`
/// directly after the command name and the last `)` on the line.
fn call_args<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix('(')?;
    let close = rest.rfind(')')?;
    Some(&rest[..close])
}

/// `~$name`: the name is the run of word characters after the marker.
fn call_name(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(CALL_PREFIX)?;
    let end = rest
        .find(|c: char| !c.is_alphanumeric() && c != '_')
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(&rest[..end])
    }
}

/// `terminal.input("prompt") @name`: prompt between the outermost quotes,
/// target variable after the call.
fn input_parts(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("terminal.input(\"")?;
    let close = rest.rfind("\")")?;
    let prompt = &rest[..close];
    let tail = rest[close + 2..].trim_start();
    let name = tail.strip_prefix('@')?;
    let end = name
        .find(|c: char| !c.is_alphanumeric() && c != '_')
        .unwrap_or(name.len());
    if end == 0 {
        None
    } else {
        Some((prompt, &name[..end]))
    }
}

fn strip_at(s: &str) -> &str {
    s.strip_prefix('@').unwrap_or(s)
}
