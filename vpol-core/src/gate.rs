use smallvec::SmallVec;

use crate::error::RuntimeError;

/// One conditional chain: the state set by the most recent `if` and updated
/// by `elseif`/`else:` at the same level. A chain has no terminator; it is
/// simply replaced by the next `if` or abandoned at the end of its context.
#[derive(Debug, Clone, Copy, Default)]
struct Frame {
    in_chain: bool,
    should_execute: bool,
    condition_met: bool,
}

/// Control-flow gate frames, one per execution context.
///
/// The run loop owns the bottom frame; every function call pushes a fresh
/// frame and pops it on return, so a body's `if` chain cannot disturb the
/// chain state of its caller.
#[derive(Debug)]
pub struct GateStack {
    frames: SmallVec<[Frame; 4]>,
}

impl GateStack {
    pub fn new() -> Self {
        let mut frames = SmallVec::new();
        frames.push(Frame::default());
        GateStack { frames }
    }

    fn top(&self) -> &Frame {
        self.frames.last().expect("gate stack holds a root frame")
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("gate stack holds a root frame")
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the root gate frame");
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn in_chain(&self) -> bool {
        self.top().in_chain
    }

    /// Whether ordinary statements may run: no chain is active, or the
    /// active chain's current branch was taken.
    pub fn allows(&self) -> bool {
        let f = self.top();
        !f.in_chain || f.should_execute
    }

    /// `if`: unconditionally starts a new chain in the current frame,
    /// replacing whatever chain was active there.
    pub fn begin_chain(&mut self, condition: bool) {
        *self.top_mut() = Frame {
            in_chain: true,
            should_execute: condition,
            condition_met: condition,
        };
    }

    /// `elseif`: the condition is evaluated lazily, only when no earlier
    /// branch of the chain has matched.
    pub fn else_if<F>(&mut self, eval: F) -> Result<(), RuntimeError>
    where
        F: FnOnce() -> Result<bool, RuntimeError>,
    {
        let f = self.top_mut();
        if !f.in_chain {
            return Err(RuntimeError::ControlFlow("elseif without if".into()));
        }
        if f.condition_met {
            f.should_execute = false;
            return Ok(());
        }
        let hit = eval()?;
        f.should_execute = hit;
        if hit {
            f.condition_met = true;
        }
        Ok(())
    }

    /// `else:` runs exactly when no earlier branch matched.
    pub fn else_branch(&mut self) -> Result<(), RuntimeError> {
        let f = self.top_mut();
        if !f.in_chain {
            return Err(RuntimeError::ControlFlow("else without if".into()));
        }
        f.should_execute = !f.condition_met;
        Ok(())
    }
}

impl Default for GateStack {
    fn default() -> Self {
        Self::new()
    }
}
