//! Line-based operator console used during consultations.
//!
//! The [`Operator`] trait decouples the consultation loop from the terminal.
//! Tests drive [`ConsoleOperator`] with in-memory readers and writers.
//!
//! End of input is the console's cancellation signal. Ctrl-C is not
//! intercepted and terminates the process as usual.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::debug;

/// One reply from the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorReply {
    Line(String),
    /// Input closed (Ctrl-D on a terminal).
    Cancelled,
}

/// Abstraction over the human at the other end of a consultation.
pub trait Operator {
    /// Show text to the operator.
    fn show(&mut self, text: &str) -> Result<()>;
    /// Show `prompt` and block until the operator replies or cancels.
    fn ask(&mut self, prompt: &str) -> Result<OperatorReply>;
}

/// Operator on a pair of byte streams (stdin/stdout in production).
pub struct ConsoleOperator<R, W> {
    reader: R,
    writer: W,
}

impl ConsoleOperator<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn show(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_all(text.as_bytes())
            .context("write to operator")?;
        self.writer.flush().context("flush operator output")
    }

    fn ask(&mut self, prompt: &str) -> Result<OperatorReply> {
        self.show(prompt)?;
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {
                debug!("operator input closed");
                Ok(OperatorReply::Cancelled)
            }
            Ok(_) => Ok(OperatorReply::Line(
                line.trim_end_matches(['\r', '\n']).to_string(),
            )),
            Err(err) => Err(err).context("read operator reply"),
        }
    }
}
