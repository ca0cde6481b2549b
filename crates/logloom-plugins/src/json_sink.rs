//! Appends records to a file as JSON lines.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::Value;

use logloom_plugin::prelude::*;

/// Plugin name and factory id.
pub const NAME: &str = "json_sink";

/// Output file when `file_path` is not configured.
pub const DEFAULT_FILE_PATH: &str = "logs/json_output.json";

/// One output line.
#[derive(Debug, Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    level: &'a str,
    message: &'a str,
    module: &'a str,
    file: &'a str,
    line: u32,
    #[serde(skip_serializing_if = "no_context")]
    context: &'a HashMap<String, Value>,
}

fn no_context(context: &&HashMap<String, Value>) -> bool {
    context.is_empty()
}

#[derive(Debug)]
struct Output {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// JSON-lines file sink.
///
/// Settings: `file_path` (string, default `logs/json_output.json`). Parent
/// directories are created during `init`.
#[derive(Debug)]
pub struct JsonSink {
    descriptor: PluginDescriptor,
    output: Mutex<Option<Output>>,
}

impl JsonSink {
    /// Creates an uninitialized sink.
    pub fn new() -> Self {
        Self {
            descriptor: plugin_descriptor!(
                name: NAME,
                plugin_type: PluginType::Sink,
                version: "1.0.0",
                author: "Logloom Team",
                description: "Writes records as JSON lines",
                capabilities: PluginCapabilities::STRUCTURED_PAYLOAD
            ),
            output: Mutex::new(None),
        }
    }

    /// Output file, once initialized.
    pub fn path(&self) -> Option<PathBuf> {
        self.output
            .lock()
            .ok()
            .and_then(|output| output.as_ref().map(|o| o.path.clone()))
    }

    fn open(path: &Path) -> std::io::Result<File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }

    fn write_line(output: &mut Output, record: &LogRecord) -> Result<(), String> {
        let line = JsonLine {
            timestamp: record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            level: record.level.as_str(),
            message: &record.message,
            module: &record.module,
            file: &record.source_file,
            line: record.source_line,
            context: &record.context,
        };
        serde_json::to_writer(&mut output.writer, &line).map_err(|e| e.to_string())?;
        output.writer.write_all(b"\n").map_err(|e| e.to_string())?;
        output.writer.flush().map_err(|e| e.to_string())
    }
}

impl Default for JsonSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogPlugin for JsonSink {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn init(&self, helpers: &PluginHelpers) -> Result<(), PluginError> {
        let path = PathBuf::from(helpers.get_string(NAME, "file_path", DEFAULT_FILE_PATH));
        let file = Self::open(&path).map_err(|e| {
            PluginError::init(NAME, format!("cannot open '{}': {e}", path.display()))
        })?;

        tracing::info!(plugin = NAME, path = %path.display(), "JSON sink initialized");
        let mut output = self
            .output
            .lock()
            .map_err(|_| PluginError::init(NAME, "output lock poisoned"))?;
        *output = Some(Output {
            path,
            writer: BufWriter::new(file),
        });
        Ok(())
    }

    fn process(&self, record: &LogRecord) -> Result<ProcessResult, PluginError> {
        let mut output = self
            .output
            .lock()
            .map_err(|_| PluginError::process(NAME, "output lock poisoned"))?;
        let Some(output) = output.as_mut() else {
            return Ok(ProcessResult::Error);
        };

        match Self::write_line(output, record) {
            Ok(()) => Ok(ProcessResult::Ok),
            Err(e) => {
                tracing::error!(
                    plugin = NAME,
                    path = %output.path.display(),
                    error = %e,
                    "Failed to write record"
                );
                Ok(ProcessResult::Error)
            }
        }
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        let mut output = self
            .output
            .lock()
            .map_err(|_| PluginError::shutdown(NAME, "output lock poisoned"))?;
        if let Some(mut out) = output.take() {
            out.writer
                .flush()
                .map_err(|e| PluginError::shutdown(NAME, e.to_string()))?;
            tracing::info!(plugin = NAME, path = %out.path.display(), "JSON sink closed");
        }
        Ok(())
    }
}
