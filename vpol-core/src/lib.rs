//! VPOL — a line-oriented runtime for short imperative diagnostic scripts.
//!
//! One statement per line: `@` variable assignment, `if`/`elseif`/`else:`
//! chains (equality only), `${name` … `}` function blocks replayed by
//! `~$name`, string concatenation with `+`, console I/O, JSON validation,
//! and network probes (OS ping, HTTP reachability, raw TCP/UDP packets).
//!
//! ```
//! use vpol_core::{Interpreter, Options};
//!
//! let script = r#"
//! @name = "World"
//! terminal.print("Hello, " + @name)
//! "#;
//!
//! let mut out = Vec::new();
//! Interpreter::with_io(Options::default(), std::io::empty(), &mut out)
//!     .run(script)
//!     .unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), "Hello, World\n");
//! ```
//!
//! Script-correctness errors (bad statement shape, undefined names, broken
//! JSON) abort the run with the offending line number; network
//! reachability failures are printed and the script continues.

pub mod error;
pub mod expr;
mod gate;
mod interp;
mod net;
mod state;
mod terminal;

pub use error::{RuntimeError, ScriptError};
pub use interp::{Interpreter, Options};
