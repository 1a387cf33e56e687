//! # Operator Console
//!
//! Line commands read from stdin and handed to the control loop:
//!
//! | Line | Effect |
//! |------|--------|
//! | `enable` | enable teleoperation |
//! | `disable` | disable teleoperation (one stop is sent) |
//! | `status` | log the current session view |
//! | `joints`, `q` | log the current joint positions |
//! | `freedrive on`, `freedrive off` | hand-guiding (teleoperation disabled only) |
//! | `quit` | stop the robot and exit |
//!
//! Unknown lines are reported and ignored.
//!
//! Stdin is read on a plain thread; Tokio's async stdin cannot be cancelled
//! on shutdown.

use std::fmt;
use std::io::{self, BufRead};
use std::str::FromStr;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Operator request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Enable,
    Disable,
    Status,
    ReadJoints,
    Freedrive(bool),
    Quit,
}

/// Line that is not a console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown command '{}' (expected enable, disable, status, joints, freedrive on|off or quit)",
            self.0
        )
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for ConsoleCommand {
    type Err = UnknownCommand;

    /// Case-insensitive, whitespace between and around words ignored.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let lowered = line.trim().to_ascii_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();

        match words.as_slice() {
            ["enable" | "e"] => Ok(ConsoleCommand::Enable),
            ["disable" | "d"] => Ok(ConsoleCommand::Disable),
            ["status" | "s"] => Ok(ConsoleCommand::Status),
            ["joints" | "q"] => Ok(ConsoleCommand::ReadJoints),
            ["freedrive" | "fd", "on"] => Ok(ConsoleCommand::Freedrive(true)),
            ["freedrive" | "fd", "off"] => Ok(ConsoleCommand::Freedrive(false)),
            ["quit" | "exit"] => Ok(ConsoleCommand::Quit),
            _ => Err(UnknownCommand(line.trim().to_string())),
        }
    }
}

/// Forwards commands from `reader` until it ends or `tx` closes.
///
/// Blocks the calling thread. Blank lines are skipped. End of input only
/// ends the reader; the control loop keeps running until Ctrl+C.
pub fn forward_commands<R: BufRead>(reader: R, tx: &mpsc::Sender<ConsoleCommand>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Console read failed: {}", e);
                return;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ConsoleCommand>() {
            Ok(command) => {
                if tx.blocking_send(command).is_err() {
                    return;
                }
            }
            Err(e) => warn!("{}", e),
        }
    }

    debug!("Console input closed");
}

/// Reads commands from stdin on a detached thread.
///
/// The thread is left blocked in its read when the process exits.
///
/// # Errors
///
/// Returns error if the thread cannot be spawned.
pub fn spawn_stdin(tx: mpsc::Sender<ConsoleCommand>) -> io::Result<()> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || forward_commands(io::stdin().lock(), &tx))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &'static str) -> Vec<ConsoleCommand> {
        let (tx, mut rx) = mpsc::channel(16);
        forward_commands(input.as_bytes(), &tx);

        let mut out = Vec::new();
        while let Ok(command) = rx.try_recv() {
            out.push(command);
        }
        out
    }

    // ==================== Parse Tests ====================

    #[test]
    fn test_parse_commands() {
        assert_eq!("enable".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Enable));
        assert_eq!("  DISABLE \n".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Disable));
        assert_eq!("s".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Status));
        assert_eq!("exit".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_operator_actions() {
        assert_eq!("q".parse::<ConsoleCommand>(), Ok(ConsoleCommand::ReadJoints));
        assert_eq!("Joints".parse::<ConsoleCommand>(), Ok(ConsoleCommand::ReadJoints));
        assert_eq!(
            "freedrive  on".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Freedrive(true))
        );
        assert_eq!("FD OFF".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Freedrive(false)));
    }

    #[test]
    fn test_parse_unknown() {
        let err = "launch".parse::<ConsoleCommand>().unwrap_err();
        assert_eq!(err, UnknownCommand("launch".into()));
        assert!(err.to_string().contains("launch"));

        assert!("freedrive".parse::<ConsoleCommand>().is_err());
        assert!("freedrive maybe".parse::<ConsoleCommand>().is_err());
        assert!("enable now".parse::<ConsoleCommand>().is_err());
    }

    // ==================== Reader Tests ====================

    #[test]
    fn test_forwards_in_order_and_skips_noise() {
        let commands = collect("enable\n\nbogus\nstatus\nfreedrive on\ndisable\n");
        assert_eq!(
            commands,
            vec![
                ConsoleCommand::Enable,
                ConsoleCommand::Status,
                ConsoleCommand::Freedrive(true),
                ConsoleCommand::Disable,
            ]
        );
    }

    #[test]
    fn test_end_of_input_ends_quietly() {
        assert!(collect("").is_empty());
        assert_eq!(collect("quit"), vec![ConsoleCommand::Quit]);
    }

    #[test]
    fn test_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        // Returns instead of looping over the remaining input
        forward_commands("enable\nenable\n".as_bytes(), &tx);
    }

    #[tokio::test]
    async fn test_reader_thread_feeds_async_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let reader = thread::spawn(move || forward_commands("status\nq\n".as_bytes(), &tx));

        assert_eq!(rx.recv().await, Some(ConsoleCommand::Status));
        assert_eq!(rx.recv().await, Some(ConsoleCommand::ReadJoints));
        assert_eq!(rx.recv().await, None);
        reader.join().unwrap();
    }
}
