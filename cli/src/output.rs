//! Terminal rendering of driver events.

use std::io::Write;

use uci_driver::{AnalysisLine, DriverEvent, EngineOption, EventSink, UciDirection};

/// Writes events either as human-readable lines or as one JSON object per line.
pub struct Printer<W: Write> {
    out: W,
    json: bool,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    pub fn print(&mut self, event: &DriverEvent) -> std::io::Result<()> {
        if self.json {
            let line = serde_json::to_string(event).map_err(std::io::Error::other)?;
            return writeln!(self.out, "{}", line);
        }

        match event {
            DriverEvent::CycleComplete { best_move, ponder } => {
                let best = best_move.as_deref().unwrap_or("(none)");
                match ponder {
                    Some(ponder) => writeln!(self.out, "bestmove {} ponder {}", best, ponder),
                    None => writeln!(self.out, "bestmove {}", best),
                }
            }
            DriverEvent::Raw { direction, line } => {
                let arrow = match direction {
                    UciDirection::ToEngine => ">>",
                    UciDirection::FromEngine => "<<",
                };
                writeln!(self.out, "{} {}", arrow, line)
            }
            DriverEvent::EngineExited => writeln!(self.out, "engine exited"),
            _ => {
                event.dispatch(self);
                Ok(())
            }
        }
    }
}

/// Render one analysis line, preferring the White-relative score.
pub fn format_line(line: &AnalysisLine) -> String {
    let score = line
        .white_score
        .or(line.score)
        .map(|s| s.display())
        .unwrap_or_else(|| "?".to_string());
    let mut out = format!("depth {} #{} {}", line.depth, line.multipv, score);
    if let Some(nodes) = line.nodes {
        out.push_str(&format!(" nodes {}", nodes));
    }
    let moves = line.format_moves();
    if !moves.is_empty() {
        out.push_str("  ");
        out.push_str(&moves);
    }
    out
}

pub fn format_option(option: &EngineOption) -> String {
    match (option.min, option.max) {
        (Some(min), Some(max)) => format!(
            "{} = {} [{}..{}]",
            option.name, option.default, min, max
        ),
        _ => format!("{} = {}", option.name, option.default),
    }
}

impl<W: Write> Printer<W> {
    /// Sink callbacks cannot return errors, so failed writes are logged.
    fn emit_line(&mut self, line: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            tracing::debug!("Failed to write output: {}", e);
        }
    }
}

impl<W: Write> EventSink for Printer<W> {
    fn on_current_move(&mut self, mv: &str, number: u32, depth: u32) {
        self.emit_line(format_args!("depth {} searching {} (#{})", depth, mv, number));
    }

    fn on_new_line(&mut self, line: &AnalysisLine) {
        self.emit_line(format_args!("{}", format_line(line)));
    }

    fn on_engine_name(&mut self, name: &str) {
        self.emit_line(format_args!("engine: {}", name));
    }

    fn on_options_ready(&mut self, options: &[EngineOption]) {
        for option in options {
            self.emit_line(format_args!("option: {}", format_option(option)));
        }
    }
}
