use std::io::{Cursor, IsTerminal, Read, Stderr, Stdin, Stdout, Write};

/// Abstracts stdin/stdout/stderr so commands can be driven from tests.
pub trait ConsoleIO<IN: Read, OUT: Write, ERR: Write> {
    fn stdin(&mut self) -> &mut IN;
    fn stdout(&mut self) -> &mut OUT;
    fn stderr(&mut self) -> &mut ERR;

    /// `true` when stdin is attached to a terminal, i.e. nothing is piped in.
    fn stdin_is_terminal(&self) -> bool;

    /// Read all of stdin when something is piped in, `None` otherwise.
    fn read_piped_stdin(&mut self) -> std::io::Result<Option<String>> {
        if self.stdin_is_terminal() {
            return Ok(None);
        }
        let mut buf = String::new();
        self.stdin().read_to_string(&mut buf)?;
        Ok(Some(buf))
    }
}

/// Process stdio.
pub struct StdIO {
    stdin: Stdin,
    stdout: Stdout,
    stderr: Stderr,
}

impl StdIO {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stdin: std::io::stdin(),
            stdout: std::io::stdout(),
            stderr: std::io::stderr(),
        }
    }
}

impl Default for StdIO {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleIO<Stdin, Stdout, Stderr> for StdIO {
    fn stdin(&mut self) -> &mut Stdin {
        &mut self.stdin
    }

    fn stdout(&mut self) -> &mut Stdout {
        &mut self.stdout
    }

    fn stderr(&mut self) -> &mut Stderr {
        &mut self.stderr
    }

    fn stdin_is_terminal(&self) -> bool {
        self.stdin.is_terminal()
    }
}

/// Captures output and serves canned stdin.
///
/// Without [`BufferedIO::with_stdin`] it behaves like an interactive terminal
/// with nothing piped in.
pub struct BufferedIO {
    stdin: Cursor<Vec<u8>>,
    piped: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl BufferedIO {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate `echo data | palaver ...`.
    #[must_use]
    pub fn with_stdin(data: &[u8]) -> Self {
        Self {
            stdin: Cursor::new(data.to_vec()),
            piped: true,
            ..Self::default()
        }
    }

    pub fn stdout_to_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_to_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl Default for BufferedIO {
    fn default() -> Self {
        Self {
            stdin: Cursor::new(Vec::new()),
            piped: false,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }
}

impl ConsoleIO<Cursor<Vec<u8>>, Vec<u8>, Vec<u8>> for BufferedIO {
    fn stdin(&mut self) -> &mut Cursor<Vec<u8>> {
        &mut self.stdin
    }

    fn stdout(&mut self) -> &mut Vec<u8> {
        &mut self.stdout
    }

    fn stderr(&mut self) -> &mut Vec<u8> {
        &mut self.stderr
    }

    fn stdin_is_terminal(&self) -> bool {
        !self.piped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_io_captures_stdout_and_stderr() {
        let mut io = BufferedIO::new();
        writeln!(io.stdout(), "answer").unwrap();
        writeln!(io.stderr(), "[ERROR] nope").unwrap();
        assert_eq!(io.stdout_to_string(), "answer\n");
        assert_eq!(io.stderr_to_string(), "[ERROR] nope\n");
    }

    #[test]
    fn terminal_stdin_is_not_read() {
        let mut io = BufferedIO::new();
        assert!(io.stdin_is_terminal());
        assert_eq!(io.read_piped_stdin().unwrap(), None);
    }

    #[test]
    fn piped_stdin_is_read_once() {
        let mut io = BufferedIO::with_stdin(b"fn main() {}\n");
        assert!(!io.stdin_is_terminal());
        assert_eq!(
            io.read_piped_stdin().unwrap().as_deref(),
            Some("fn main() {}\n")
        );
        assert_eq!(io.read_piped_stdin().unwrap().as_deref(), Some(""));
    }
}
