use std::io::Write;
use std::sync::Mutex;

/// Line-oriented progress output shared by the orchestrator and the
/// temperature monitor. Implementations must emit each call as one whole line.
pub trait OutputSink: Send + Sync {
    fn print(&self, msg: &str);
    fn error(&self, msg: &str);
}

#[derive(Debug, Default)]
pub struct Console {
    lock: Mutex<()>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for Console {
    fn print(&self, msg: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{msg}");
        let _ = out.flush();
    }

    fn error(&self, msg: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(std::io::stderr().lock(), "ERROR: {msg}");
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_writers_keep_whole_lines() {
        let sink = Arc::new(RecordingSink::default());
        let handles: Vec<_> = (0..2)
            .map(|t| {
                let sink = sink.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        sink.print(&format!("[T{t}] line {i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("writer thread");
        }

        let lines = sink.lines();
        assert_eq!(lines.len(), 400);
        assert_eq!(sink.count_prefixed("[T0]"), 200);
        assert_eq!(sink.count_prefixed("[T1]"), 200);
    }

    #[test]
    fn console_survives_poisoned_lock() {
        let console = Arc::new(Console::new());
        let poisoner = console.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock.lock().unwrap();
            panic!("poison the console lock");
        })
        .join();

        console.print("still printing");
        console.error("still reporting");
    }
}
