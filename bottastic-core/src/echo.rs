use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Destination of the console echo enabled by `--echo_sent` and
/// `--echo_received`. Defaults to stdout; echo lines are kept apart from
/// `tracing` output.
#[derive(Clone)]
pub struct Echo {
    sink: Arc<Mutex<dyn Write + Send>>,
}

impl Echo {
    pub fn new(sink: Arc<Mutex<dyn Write + Send>>) -> Self {
        Self { sink }
    }

    pub fn stdout() -> Self {
        Self::new(Arc::new(Mutex::new(io::stdout())))
    }

    /// Writes one line. Write failures are logged and otherwise ignored.
    pub fn line(&self, args: fmt::Arguments<'_>) {
        let mut sink = match self.sink.lock() {
            Ok(sink) => sink,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(sink, "{args}").and_then(|_| sink.flush()) {
            debug!("Failed to write echo line: {e}");
        }
    }
}

impl Default for Echo {
    fn default() -> Self {
        Self::stdout()
    }
}

impl fmt::Debug for Echo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Echo")
    }
}
