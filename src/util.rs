use crate::catalog::StageDefinition;
use crate::error::{TimerError, TimerResult};

/// `m:ss`, with minutes allowed past 59.
pub fn format_clock(seconds: u32) -> String {
    format_total(u64::from(seconds))
}

/// `m:ss` for sums of stage lengths, which can exceed `u32`.
pub fn format_total(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub fn format_overtime(seconds: u32) -> String {
    format!("+{}", format_clock(seconds))
}

/// Accepts `m:ss` or a bare number of seconds.
pub fn parse_clock(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.split_once(':') {
        Some((mins, secs)) => {
            if secs.len() != 2 {
                return None;
            }
            let mins: u32 = mins.parse().ok()?;
            let secs: u32 = secs.parse().ok()?;
            if secs >= 60 {
                return None;
            }
            mins.checked_mul(60)?.checked_add(secs)
        }
        None => text.parse().ok(),
    }
}

/// Parses `NAME=DURATION[/PROTECTED]`, e.g. `Rebuttal=4:00` or `PM=7:00/60`.
pub fn parse_stage_arg(arg: &str) -> TimerResult<StageDefinition> {
    let invalid = |why: &str| TimerError::InvalidDefinition(format!("stage \"{arg}\": {why}"));

    let (name, timing) = arg.split_once('=').ok_or_else(|| invalid("expected NAME=M:SS"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid("missing name"));
    }
    let (duration, window) = match timing.split_once('/') {
        Some((d, w)) => (d, Some(w)),
        None => (timing, None),
    };
    let duration = parse_clock(duration).ok_or_else(|| invalid("bad duration"))?;
    let stage = StageDefinition::new(name, duration)?;
    match window {
        Some(w) => {
            let w = parse_clock(w).ok_or_else(|| invalid("bad protected window"))?;
            stage.with_protected_window(w)
        }
        None => Ok(stage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(59), "0:59");
        assert_eq!(format_clock(240), "4:00");
        assert_eq!(format_clock(3725), "62:05");
    }

    #[test]
    fn test_format_total_past_u32() {
        assert_eq!(format_total(8_000_000_000), "133333333:20");
        assert_eq!(format_total(360), format_clock(360));
    }

    #[test]
    fn test_format_overtime() {
        assert_eq!(format_overtime(7), "+0:07");
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("4:00"), Some(240));
        assert_eq!(parse_clock(" 0:45 "), Some(45));
        assert_eq!(parse_clock("90"), Some(90));
        assert_eq!(parse_clock("1:5"), None);
        assert_eq!(parse_clock("1:60"), None);
        assert_eq!(parse_clock("abc"), None);
        assert_eq!(parse_clock("-1"), None);
    }

    #[test]
    fn test_parse_stage_arg() {
        let stage = parse_stage_arg("Rebuttal=4:00").unwrap();
        assert_eq!(stage.name(), "Rebuttal");
        assert_eq!(stage.duration_seconds(), 240);
        assert_eq!(stage.protected_window_seconds(), None);

        let pm = parse_stage_arg("Prime Minister=7:00/60").unwrap();
        assert_eq!(pm.duration_seconds(), 420);
        assert_eq!(pm.protected_window_seconds(), Some(60));
    }

    #[test]
    fn test_parse_stage_arg_errors() {
        for bad in ["Rebuttal", "=4:00", "X=four", "X=0", "X=1:00/0:31", "X=1:00/x"] {
            assert_matches!(
                parse_stage_arg(bad),
                Err(TimerError::InvalidDefinition(_)),
                "{bad} should be rejected"
            );
        }
    }
}
