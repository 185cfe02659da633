//! Line-oriented operator console used by the headless binary.
//!
//! Each input line maps to one `ConsoleCommand`; `render_status` prints the
//! session snapshot after every change.

use crate::pointers::ActivePointer;
use crate::session::{Message, Session, ViewMode};
use crate::smoothing::FilterParams;
use crate::timeseries::SampleSliceExt;
use crate::window::{ScrollDirection, WindowNavigator};
use chrono::NaiveDate;
use std::fmt::Write;

pub const HELP: &str = "\
commands:
  live | replay | date YYYY-MM-DD
  size N | start N | pan +/-N | next | prev | up | down | home | end
  p1 | p2 | click N | reset
  filter Q R P K | apply
  export | status | help | logout | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Session(Message),
    Export,
    Status,
    Help,
    Quit,
}

/// Parse one input line; `Err` carries a message for the operator
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(ConsoleCommand::Status);
    };
    let args: Vec<&str> = words.collect();

    let message = match verb {
        "live" => Message::EnterLive,
        "replay" => Message::EnterReplay,
        "date" => {
            let raw = single_arg(&args)?;
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| format!("invalid date {:?}: {}", raw, e))?;
            Message::SelectDate(date)
        }
        "size" => Message::SetWindowSize(number(single_arg(&args)?)?),
        "start" => Message::SetStart(number(single_arg(&args)?)?),
        "pan" => Message::PanBy(number(single_arg(&args)?.trim_start_matches('+'))?),
        "next" => Message::NextPage,
        "prev" => Message::PrevPage,
        "up" => Message::Scroll(ScrollDirection::Backward),
        "down" => Message::Scroll(ScrollDirection::Forward),
        "home" => Message::JumpToStart,
        "end" => Message::JumpToEnd,
        "p1" => Message::SelectPointer(ActivePointer::First),
        "p2" => Message::SelectPointer(ActivePointer::Second),
        "click" => Message::ClickSample(number(single_arg(&args)?)?),
        "reset" => Message::ResetPointers,
        "filter" => {
            let [q, r, p, k] = args.as_slice() else {
                return Err("usage: filter Q R P K".to_string());
            };
            Message::SetFilter(FilterParams {
                q: number(q)?,
                r: number(r)?,
                p0: number(p)?,
                k0: number(k)?,
            })
        }
        "apply" => Message::ApplyFilter,
        "logout" => Message::Logout,
        "export" => return Ok(ConsoleCommand::Export),
        "status" => return Ok(ConsoleCommand::Status),
        "help" => return Ok(ConsoleCommand::Help),
        "quit" | "exit" => return Ok(ConsoleCommand::Quit),
        other => return Err(format!("unknown command {:?}, try 'help'", other)),
    };
    Ok(ConsoleCommand::Session(message))
}

fn single_arg<'a>(args: &[&'a str]) -> Result<&'a str, String> {
    match args {
        [only] => Ok(*only),
        _ => Err(format!("expected one argument, got {}", args.len())),
    }
}

fn number<T: std::str::FromStr>(raw: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| format!("invalid number {:?}: {}", raw, e))
}

pub fn render_status(session: &Session) -> String {
    let mut out = String::new();
    let mode = match session.mode() {
        ViewMode::Live => "live".to_string(),
        ViewMode::Replay { date: Some(date) } => format!("replay {}", date),
        ViewMode::Replay { date: None } => "replay (no date selected)".to_string(),
    };
    let window = session.window();
    let pointers = session.pointers();
    let measurement = session.measurement();
    let (first, last) = session.window_bounds_labels();

    let _ = writeln!(out, "mode: {}  samples: {}", mode, session.raw().len());
    let len = session.smoothed().len();
    let _ = writeln!(
        out,
        "window: [{}, {}) size {} (slider max {}, start max {})  time {} - {}",
        window.start,
        window.end,
        session.window_size(),
        WindowNavigator::max_window_size(len),
        session.max_start(),
        first.as_deref().unwrap_or("N/A"),
        last.as_deref().unwrap_or("N/A")
    );
    if let Some((min, max)) = session.visible().min_max_value() {
        let _ = writeln!(out, "visible range: {:.3} .. {:.3}", min, max);
    }
    let active = match session.active_pointer() {
        ActivePointer::First => 1,
        ActivePointer::Second => 2,
    };
    let _ = writeln!(
        out,
        "pointer 1: {}, pointer 2: {} (active {})  time between pointers: {:.3} milliseconds",
        pointers.p1, pointers.p2, active, measurement.time_delta_ms as f64
    );
    let filter = session.filter();
    let _ = write!(
        out,
        "filter: Q={} R={} P={} K={}",
        filter.q, filter.r, filter.p0, filter.k0
    );
    if let Some(error) = session.error() {
        let _ = write!(out, "\nerror: {}", error);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::mpsc;

    #[test]
    fn test_parse_navigation() {
        assert_eq!(parse_command("pan -250"), Ok(ConsoleCommand::Session(Message::PanBy(-250))));
        assert_eq!(parse_command("pan +10"), Ok(ConsoleCommand::Session(Message::PanBy(10))));
        assert_eq!(parse_command("size 400"), Ok(ConsoleCommand::Session(Message::SetWindowSize(400))));
        assert_eq!(parse_command("  end "), Ok(ConsoleCommand::Session(Message::JumpToEnd)));
    }

    #[test]
    fn test_parse_date_and_filter() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 5).unwrap();
        assert_eq!(
            parse_command("date 2024-11-05"),
            Ok(ConsoleCommand::Session(Message::SelectDate(date)))
        );
        assert_eq!(
            parse_command("filter 1 2 3 4"),
            Ok(ConsoleCommand::Session(Message::SetFilter(FilterParams {
                q: 1.0,
                r: 2.0,
                p0: 3.0,
                k0: 4.0
            })))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("date tomorrow").is_err());
        assert!(parse_command("filter 1 2").is_err());
        assert!(parse_command("click").is_err());
        assert!(parse_command("fly").is_err());
        assert_eq!(parse_command(""), Ok(ConsoleCommand::Status));
    }

    #[test]
    fn test_render_status() {
        let (tx, _rx) = mpsc::channel();
        let session = Session::new(&Config::default(), tx);
        let status = render_status(&session);
        assert!(status.contains("replay (no date selected)"));
        assert!(status.contains("pointer 1: 0, pointer 2: 200"));
        assert!(status.contains("time N/A - N/A"));
    }
}
