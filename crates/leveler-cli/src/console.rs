//! Line commands for the interactive session.

use leveler_core::{ControlUpdate, SourceKind};

/// Help text printed by `help`.
pub const HELP: &str = "\
Commands:
  pr <0-100>              peak reduction
  gain <0-100>            makeup gain
  thr <-60-0>             threshold in dB
  bypass on|off           crossfade to the dry signal
  power on|off            build or tear down the signal chain
  source tone|live|sample choose the signal source
  rec                     record up to the capture limit
  stop                    stop the recording early
  ask <question>          ask the assistant
  status                  show the panel and meters
  help                    this text
  quit                    leave";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Control change for the engine.
    Control(ControlUpdate),
    /// Start recording.
    Record,
    /// Stop recording.
    Stop,
    /// Question for the assistant.
    Ask(String),
    /// Print state.
    Status,
    /// Print help.
    Help,
    /// Leave the session.
    Quit,
}

fn parse_number(arg: Option<&str>, name: &str) -> Result<f32, String> {
    let arg = arg.ok_or_else(|| format!("{name} needs a value"))?;
    let value: f32 = arg
        .parse()
        .map_err(|_| format!("'{arg}' is not a number"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("'{arg}' is not a number"))
    }
}

fn parse_switch(arg: Option<&str>, name: &str) -> Result<bool, String> {
    match arg.map(str::to_ascii_lowercase).as_deref() {
        Some("on" | "1" | "true") => Ok(true),
        Some("off" | "0" | "false") => Ok(false),
        Some(other) => Err(format!("{name} expects on or off, got '{other}'")),
        None => Err(format!("{name} expects on or off")),
    }
}

/// Parse one line. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (head, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(h, r)| (h, r.trim()));
    let arg = (!rest.is_empty()).then_some(rest);

    let command = match head.to_ascii_lowercase().as_str() {
        "pr" | "peak" => Command::Control(ControlUpdate::peak_reduction(parse_number(
            arg,
            "peak reduction",
        )?)),
        "gain" | "makeup" => {
            Command::Control(ControlUpdate::makeup_gain(parse_number(arg, "gain")?))
        }
        "thr" | "threshold" => {
            Command::Control(ControlUpdate::threshold_db(parse_number(arg, "threshold")?))
        }
        "bypass" => Command::Control(ControlUpdate::bypass(parse_switch(arg, "bypass")?)),
        "power" => Command::Control(ControlUpdate::power(parse_switch(arg, "power")?)),
        "source" | "src" => {
            let kind: SourceKind = arg
                .ok_or("source needs tone, live or sample")?
                .parse()
                .map_err(|e| format!("{e}"))?;
            Command::Control(ControlUpdate::source(kind))
        }
        "rec" | "record" => Command::Record,
        "stop" => Command::Stop,
        "ask" => Command::Ask(arg.ok_or("ask needs a question")?.to_string()),
        "status" | "st" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{other}' (try help)")),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        parse_command(line).unwrap().unwrap()
    }

    #[test]
    fn knobs_parse_to_updates() {
        assert_eq!(
            parse("pr 45"),
            Command::Control(ControlUpdate::peak_reduction(45.0))
        );
        assert_eq!(
            parse("  GAIN   70 "),
            Command::Control(ControlUpdate::makeup_gain(70.0))
        );
        assert_eq!(
            parse("thr -18.5"),
            Command::Control(ControlUpdate::threshold_db(-18.5))
        );
    }

    #[test]
    fn switches_and_sources() {
        assert_eq!(
            parse("bypass on"),
            Command::Control(ControlUpdate::bypass(true))
        );
        assert_eq!(parse("power 0"), Command::Control(ControlUpdate::power(false)));
        assert_eq!(
            parse("source mic"),
            Command::Control(ControlUpdate::source(SourceKind::Live))
        );
        assert!(parse_command("source radio").is_err());
        assert!(parse_command("bypass maybe").is_err());
    }

    #[test]
    fn ask_keeps_the_whole_question() {
        assert_eq!(
            parse("ask why does the release   have two stages?"),
            Command::Ask("why does the release   have two stages?".into())
        );
        assert!(parse_command("ask").is_err());
    }

    #[test]
    fn bad_input_is_reported() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert!(parse_command("pr").is_err());
        assert!(parse_command("pr loud").is_err());
        assert!(parse_command("pr inf").is_err());
        assert!(parse_command("launch").is_err());
    }

    #[test]
    fn plain_words() {
        assert_eq!(parse("rec"), Command::Record);
        assert_eq!(parse("stop"), Command::Stop);
        assert_eq!(parse("q"), Command::Quit);
        assert_eq!(parse("?"), Command::Help);
    }
}
