//! Stdio wiring convenience.
//!
//! Wires fd 0/1/2 to three distinct device instances by construction:
//! fd 0 always reads, fd 1/2 always write, and they are never the same
//! underlying handle.

use crate::console_driver::HostConsole;
use crate::ctx::WasiCtxBuilder;
use crate::terminal_driver::HostTerminal;
use std::rc::Rc;

impl WasiCtxBuilder {
    /// Wires fd 0 to `stdin`, and fd 1/2 to `console`'s `log`/`error`
    /// respectively.
    pub fn inherit_stdio(self, stdin: Rc<dyn HostTerminal>, console: Rc<dyn HostConsole>) -> Self {
        self.stdin_terminal(stdin, "stdin:0")
            .stdout_console(console.clone())
            .stderr_console(console)
    }
}
