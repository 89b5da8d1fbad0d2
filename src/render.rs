//! Terminal rendering of intro events.
//!
//! Boot lines type concurrently (a line starts before the previous one has
//! finished), so each line is tracked by id and the whole block is redrawn
//! in place on every change.

use std::io::Write;

use crate::intro::{IntroEvent, LineStatus, Phase};

const CLEAR_LINE: &str = "\x1b[2K";

#[derive(Debug, Clone, PartialEq, Eq)]
struct ScreenLine {
    id: String,
    text: String,
    status: LineStatus,
    done: bool,
}

/// What the renderer should do after applying an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redraw {
    /// Nothing visible changed.
    None,
    /// Redraw the boot block.
    Boot,
    /// Print these lines below the boot block.
    Append(Vec<String>),
    /// The overlay is gone; stop rendering.
    Done,
}

/// The boot block as it currently appears on screen.
#[derive(Debug, Default)]
pub struct BootScreen {
    lines: Vec<ScreenLine>,
    drawn: usize,
}

impl BootScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the screen state.
    pub fn apply(&mut self, event: &IntroEvent) -> Redraw {
        match event {
            IntroEvent::LineStarted { id, status } => {
                if self.line_mut(id).is_none() {
                    self.lines.push(ScreenLine {
                        id: id.clone(),
                        text: String::new(),
                        status: *status,
                        done: false,
                    });
                }
                Redraw::Boot
            }
            IntroEvent::LineRevealed { id, text } => {
                // The start event may predate the subscription.
                match self.line_mut(id) {
                    Some(line) => line.text.clone_from(text),
                    None => self.lines.push(ScreenLine {
                        id: id.clone(),
                        text: text.clone(),
                        status: LineStatus::default(),
                        done: false,
                    }),
                }
                Redraw::Boot
            }
            IntroEvent::LineCompleted { id, status } => match self.line_mut(id) {
                Some(line) => {
                    line.status = *status;
                    line.done = true;
                    Redraw::Boot
                }
                None => Redraw::None,
            },
            IntroEvent::IdentityRevealed { identity } => Redraw::Append(vec![
                String::new(),
                format!("    {}", identity.name),
                format!("    {}", identity.role),
                format!("    {}", identity.tagline),
            ]),
            IntroEvent::PhaseChanged {
                phase: Phase::Exit, ..
            } => Redraw::Append(vec![String::new()]),
            IntroEvent::VisibilityChanged {
                should_show: false, ..
            } => Redraw::Done,
            _ => Redraw::None,
        }
    }

    /// Current text of every started line, in start order.
    pub fn rendered(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| {
                let mark = if line.done && line.status == LineStatus::Success {
                    " ✓"
                } else {
                    ""
                };
                format!("  > {}{}", line.text, mark)
            })
            .collect()
    }

    /// Write the boot block over its previous rendering.
    pub fn draw(&mut self, out: &mut impl Write) -> std::io::Result<()> {
        if self.drawn > 0 {
            write!(out, "\x1b[{}A", self.drawn)?;
        }
        let rendered = self.rendered();
        for line in &rendered {
            writeln!(out, "\r{CLEAR_LINE}{line}")?;
        }
        self.drawn = rendered.len();
        out.flush()
    }

    /// Write lines below the boot block; they are never redrawn.
    pub fn append(&mut self, out: &mut impl Write, lines: &[String]) -> std::io::Result<()> {
        for line in lines {
            writeln!(out, "{line}")?;
        }
        // Anything printed below the block would be overwritten by a redraw.
        self.lines.clear();
        self.drawn = 0;
        out.flush()
    }

    fn line_mut(&mut self, id: &str) -> Option<&mut ScreenLine> {
        self.lines.iter_mut().find(|line| line.id == id)
    }
}
