use super::error::ShellError;

/// A strictly half-duplex, line-oriented channel to a CP2K shell.
///
/// Implementations never expose the underlying streams. Callers must issue exactly the
/// number of [`receive`](ShellTransport::receive) calls each command defines before the
/// next [`send`](ShellTransport::send).
pub trait ShellTransport {
    fn send(&mut self, line: &str) -> Result<(), ShellError>;

    fn receive(&mut self) -> Result<String, ShellError>;

    /// Asks the shell to exit and waits for it. Safe to call more than once.
    fn shutdown(&mut self) -> Result<(), ShellError>;

    /// Tears the shell down without any protocol traffic.
    fn abort(&mut self);
}
