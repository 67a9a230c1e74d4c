//! Terminal password entry with echo turned off.

use std::io::{self, Write};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use zeroize::Zeroize;

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Prints `label` and reads one line from the terminal without echoing it.
///
/// Returns `None` when the user cancels with Ctrl+C or Ctrl+D. Blocks; call it from
/// `spawn_blocking`.
pub fn read_hidden_line(label: &str) -> Result<Option<String>> {
    let mut stderr = io::stderr();
    write!(stderr, "{label}")?;
    stderr.flush()?;

    let entry = {
        let _raw = RawModeGuard::enable()?;
        collect_hidden_line(|| event::read().context("Failed to read terminal input"))
    };
    writeln!(stderr)?;
    entry
}

fn collect_hidden_line(mut next_event: impl FnMut() -> Result<Event>) -> Result<Option<String>> {
    let mut entry = String::new();
    loop {
        let Event::Key(key) = next_event()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(Some(entry)),
            KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                entry.zeroize();
                return Ok(None);
            }
            KeyCode::Char(ch) => entry.push(ch),
            KeyCode::Backspace => {
                entry.pop();
            }
            _ => {}
        }
    }
}
