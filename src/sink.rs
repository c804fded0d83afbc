//! Output capture.
//!
//! Everything a printer or scan wants to show the caller goes through
//! [`Sink::emit`] as an [`Event`]. The line-oriented result of a query is a
//! projection of that event stream: concatenate, split on `'\n'`, drop empty
//! lines. Structured fields go to the [`Report`] instead.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Category of an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Plain,
    Json,
    Info,
    Warning,
    Error,
}

/// One chunk of emitted text. A chunk may hold a partial line, a full line
/// or several lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct Sink {
    events: Vec<Event>,
    suppressed: bool,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single formatting primitive. Dropped while the sink is suppressed.
    pub fn emit(&mut self, kind: EventKind, args: fmt::Arguments<'_>) {
        if self.suppressed {
            return;
        }
        let text = fmt::format(args);
        if text.is_empty() {
            return;
        }
        tracing::trace!(target: "smartmon::sink", ?kind, text = %text.trim_end());
        self.events.push(Event { kind, text });
    }

    pub fn plain(&mut self, args: fmt::Arguments<'_>) {
        self.emit(EventKind::Plain, args);
    }

    pub fn json(&mut self, args: fmt::Arguments<'_>) {
        self.emit(EventKind::Json, args);
    }

    pub fn info(&mut self, args: fmt::Arguments<'_>) {
        self.emit(EventKind::Info, args);
    }

    pub fn warn(&mut self, args: fmt::Arguments<'_>) {
        self.emit(EventKind::Warning, args);
    }

    pub fn error(&mut self, args: fmt::Arguments<'_>) {
        self.emit(EventKind::Error, args);
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Switches suppression and returns the previous state.
    pub fn set_suppressed(&mut self, suppressed: bool) -> bool {
        std::mem::replace(&mut self.suppressed, suppressed)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn lines(&self) -> Vec<String> {
        render_lines(&self.events)
    }

    /// Renders the captured lines and leaves the sink empty.
    pub fn drain_lines(&mut self) -> Vec<String> {
        let lines = self.lines();
        self.events.clear();
        lines
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Projects an event stream onto its non-empty lines, in order.
pub fn render_lines(events: &[Event]) -> Vec<String> {
    let text: String = events.iter().map(|e| e.text.as_str()).collect();
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Structured output tree written alongside the human-readable lines.
#[derive(Debug, Clone, Default)]
pub struct Report {
    root: Map<String, Value>,
}

impl Report {
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.root.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Returns the object stored under `key`, creating or replacing it as
    /// needed.
    pub fn section(&mut self, key: &str) -> &mut Map<String, Value> {
        let entry = self
            .root
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        as_object(entry)
    }

    /// Returns `devices[index]`, growing the array with empty records.
    pub fn device(&mut self, index: usize) -> &mut Map<String, Value> {
        let entry = self
            .root
            .entry("devices".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        let Value::Array(devices) = entry else {
            unreachable!("devices was just made an array");
        };
        while devices.len() <= index {
            devices.push(Value::Object(Map::new()));
        }
        as_object(&mut devices[index])
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    pub fn clear(&mut self) {
        self.root.clear();
    }
}

fn as_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_writes_join_into_one_line() {
        let mut sink = Sink::new();
        sink.json(format_args!("{} -d {}", "/dev/sda", "sat"));
        sink.json(format_args!(" # {}, {} device\n", "/dev/sda [SAT]", "ATA"));
        assert_eq!(
            sink.lines(),
            vec!["/dev/sda -d sat # /dev/sda [SAT], ATA device".to_string()]
        );
    }

    #[test]
    fn drain_drops_empty_lines_and_resets() {
        let mut sink = Sink::new();
        sink.plain(format_args!("first\n\n\nsecond\n"));
        sink.error(format_args!("\nthird"));
        assert_eq!(sink.drain_lines(), vec!["first", "second", "third"]);
        assert!(sink.is_empty());
        assert!(sink.drain_lines().is_empty());
    }

    #[test]
    fn suppressed_sink_drops_everything() {
        let mut sink = Sink::new();
        assert!(!sink.set_suppressed(true));
        sink.warn(format_args!("noise\n"));
        assert!(sink.set_suppressed(false));
        sink.info(format_args!("kept\n"));
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.events()[0].kind, EventKind::Info);
    }

    #[test]
    fn report_grows_device_records() {
        let mut report = Report::default();
        report.device(1).insert("name".into(), "/dev/sdb".into());
        let devices = report.get("devices").and_then(Value::as_array).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1]["name"], "/dev/sdb");
        assert!(devices[0].as_object().unwrap().is_empty());
    }

    #[test]
    fn report_section_replaces_scalars() {
        let mut report = Report::default();
        report.set("smart_status", 1);
        report
            .section("smart_status")
            .insert("passed".into(), true.into());
        assert_eq!(report.to_value()["smart_status"]["passed"], true);
    }
}
