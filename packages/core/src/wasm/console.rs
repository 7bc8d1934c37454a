// Вывод логов в консоль браузера

use std::io::Write;
use tracing_subscriber::fmt::MakeWriter;

/// Буферизует одну запись `tracing` и отдаёт её в `console.log` при drop
pub struct ConsoleWriter {
    buf: Vec<u8>,
}

impl Write for ConsoleWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        if line.contains("ERROR") || line.contains("WARN") {
            error(line);
        } else {
            log(line);
        }
    }
}

pub struct MakeConsoleWriter;

impl<'a> MakeWriter<'a> for MakeConsoleWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter { buf: Vec::new() }
    }
}

pub fn log(message: &str) {
    web_sys::console::log_1(&message.into());
}

pub fn error(message: &str) {
    web_sys::console::error_1(&message.into());
}
