//! Keyboard commands from stdin
//!
//! Each non-blank line is taken as an input id, e.g. `note_on_40`. After a
//! command is handled the reader pauses before taking the next line.

use anyhow::Result;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::{DeskEvent, EventSender, InputBackend, InputOrigin};

pub const COMMAND_PAUSE: Duration = Duration::from_secs(1);

pub struct KeyboardBackend {
    pause: Duration,
}

impl KeyboardBackend {
    pub fn new() -> Self {
        Self {
            pause: COMMAND_PAUSE,
        }
    }
}

impl Default for KeyboardBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBackend for KeyboardBackend {
    fn start(&mut self, tx: EventSender) -> Result<()> {
        let pause = self.pause;
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = read_commands(stdin, tx, pause).await {
                warn!("Keyboard input stopped: {}", e);
            }
        });
        info!("Reading commands from the keyboard");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "keyboard"
    }
}

/// Forward lines from `reader` until it ends or the desk goes away
pub async fn read_commands<R>(reader: R, tx: EventSender, pause: Duration) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        debug!("Keyboard command {}", command);
        let (event, done) = DeskEvent::command(command, InputOrigin::Keyboard).with_completion();
        if tx.send(event).await.is_err() {
            break;
        }
        // Sender dropped without signalling still means the event is gone
        let _ = done.await;

        tokio::time::sleep(pause).await;
    }

    Ok(())
}
