// overflow-lab: stack overflow exercises with a memory inspector

use std::ffi::OsString;
use std::io;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use overflow_lab::exercise::config::{BoundsPolicy, ControlTransferPolicy, FormatPolicy};
use overflow_lab::exercise::constants::MAX_BUFFER_CAPACITY;
use overflow_lab::exercise::{Driver, ExerciseConfig, ExerciseError, RunReport, Termination};
use overflow_lab::memory::ByteOrder;
use overflow_lab::ui::App;

/// Command-line options
#[derive(Debug, Default)]
struct Options {
    exercise: Option<String>,
    arg: Option<OsString>,
    buf_size: Option<usize>,
    checked: bool,
    trusted_format: bool,
    no_jump: bool,
    big_endian: bool,
    tui: bool,
    list: bool,
}

impl Options {
    /// Options are accepted anywhere before `--`; the first positional is
    /// the exercise, the second its argument.
    fn parse(mut args: impl Iterator<Item = OsString>) -> Result<Self, ExerciseError> {
        let mut options = Options::default();
        let mut positional = Vec::new();
        let mut only_positional = false;

        while let Some(arg) = args.next() {
            if only_positional {
                positional.push(arg);
                continue;
            }
            match arg.to_str() {
                Some("--") => only_positional = true,
                Some("--checked") => options.checked = true,
                Some("--trusted-format") => options.trusted_format = true,
                Some("--no-jump") => options.no_jump = true,
                Some("--big-endian") => options.big_endian = true,
                Some("--tui") => options.tui = true,
                Some("--list") => options.list = true,
                Some("--buf-size") => {
                    let value = args.next().ok_or_else(|| ExerciseError::InvalidOption {
                        option: "--buf-size".to_string(),
                        message: "expects a value".to_string(),
                    })?;
                    options.buf_size = Some(parse_size(&value)?);
                }
                Some(flag) if flag.starts_with("--") => {
                    return Err(ExerciseError::InvalidOption {
                        option: flag.to_string(),
                        message: "unknown option".to_string(),
                    });
                }
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        if let Some(exercise) = positional.next() {
            options.exercise = Some(exercise.to_string_lossy().into_owned());
        }
        options.arg = positional.next();
        if let Some(extra) = positional.next() {
            return Err(ExerciseError::InvalidOption {
                option: extra.to_string_lossy().into_owned(),
                message: "unexpected extra argument".to_string(),
            });
        }
        Ok(options)
    }

    /// The preset named on the command line with the overrides applied
    fn config(&self) -> Result<ExerciseConfig, ExerciseError> {
        let id = self.exercise.as_deref().ok_or_else(|| ExerciseError::Usage {
            message: "no exercise given".to_string(),
        })?;
        let mut config = ExerciseConfig::preset(id).ok_or_else(|| ExerciseError::UnknownExercise {
            id: id.to_string(),
        })?;
        if let Some(size) = self.buf_size {
            config = config.with_buffer_capacity(size);
        }
        if self.checked {
            config = config.with_bounds(BoundsPolicy::Checked);
        }
        if self.trusted_format {
            config = config.with_format(FormatPolicy::Trusted);
        }
        if self.no_jump {
            config = config.with_control_transfer(ControlTransferPolicy::Disabled);
        }
        if self.big_endian {
            config = config.with_byte_order(ByteOrder::Big);
        }
        Ok(config)
    }
}

/// Buffer capacity in `1..=MAX_BUFFER_CAPACITY`
fn parse_size(value: &OsString) -> Result<usize, ExerciseError> {
    let invalid = || ExerciseError::InvalidOption {
        option: "--buf-size".to_string(),
        message: format!(
            "'{}' is not a buffer size between 1 and {}",
            value.to_string_lossy(),
            MAX_BUFFER_CAPACITY
        ),
    };
    let size: usize = value.to_str().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    if size == 0 || size > MAX_BUFFER_CAPACITY {
        return Err(invalid());
    }
    Ok(size)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS] <EXERCISE> [ARG]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!(
        "  --buf-size <N>      override the buffer capacity (at most {})",
        MAX_BUFFER_CAPACITY
    );
    eprintln!("  --checked           use the bounded copy");
    eprintln!("  --trusted-format    render the input through \"%s\"");
    eprintln!("  --no-jump           never call a corrupted function pointer");
    eprintln!("  --big-endian        decode memory as big-endian");
    eprintln!("  --tui               inspect the run afterwards");
    eprintln!("  --list              list exercises");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} hw1-level1 AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAdcba", program);
    eprintln!("  printf '%%64dA' | {} hw2-level1", program);
}

fn list_exercises() {
    for config in ExerciseConfig::presets() {
        println!("{:<12} {}", config.id, config.description);
    }
}

fn inspect(report: RunReport) -> Result<(), Box<dyn std::error::Error>> {
    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(report);
    let res = app.run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    // The transcript was hidden behind the alternate screen
    print!("{}", app.report.output());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args_os();
    let program = args
        .next()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "overflow-lab".to_string());

    let options = match Options::parse(args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}: {}", program, e);
            print_usage(&program);
            std::process::exit(e.exit_status());
        }
    };

    if options.list {
        list_exercises();
        return Ok(());
    }

    let config = match options.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", program, e);
            print_usage(&program);
            std::process::exit(e.exit_status());
        }
    };

    let driver = Driver::new(config);
    let driver = if options.tui { driver } else { driver.echo() };
    let arg = options.arg.as_ref().map(|a| a.as_encoded_bytes());

    let report = match driver.run(arg, io::stdin().lock()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}: {}", program, e);
            std::process::exit(e.exit_status());
        }
    };

    let termination = report.termination;
    if options.tui {
        eprintln!("Total snapshots: {}", report.snapshots.len());
        inspect(report)?;
    }

    match termination {
        Termination::Exited(0) => Ok(()),
        Termination::Exited(status) => std::process::exit(status),
        Termination::Crashed(fault) => {
            log::info!("{}", fault);
            eprintln!("Segmentation fault");
            std::process::exit(fault.exit_status());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, ExerciseError> {
        Options::parse(args.iter().map(OsString::from))
    }

    #[test]
    fn test_positionals_and_flags_in_any_order() {
        let options = parse(&["--checked", "hw1-level1", "--tui", "AAAA"]).unwrap();
        assert_eq!(options.exercise.as_deref(), Some("hw1-level1"));
        assert_eq!(options.arg, Some(OsString::from("AAAA")));
        assert!(options.checked);
        assert!(options.tui);
        assert!(!options.list);
    }

    #[test]
    fn test_double_dash_ends_options() {
        let options = parse(&["hw1-level1", "--", "--checked"]).unwrap();
        assert_eq!(options.arg, Some(OsString::from("--checked")));
        assert!(!options.checked);
    }

    #[test]
    fn test_rejects_unknown_option_and_extra_argument() {
        let err = parse(&["--fast", "hw1-level1"]).unwrap_err();
        assert!(
            matches!(err, ExerciseError::InvalidOption { ref option, .. } if option == "--fast")
        );
        assert_eq!(err.exit_status(), 2);

        let err = parse(&["hw1-level1", "a", "b"]).unwrap_err();
        assert!(matches!(err, ExerciseError::InvalidOption { ref option, .. } if option == "b"));
    }

    #[test]
    fn test_flags_map_to_policies() {
        let options = parse(&[
            "hw2-level1",
            "--buf-size",
            "16",
            "--checked",
            "--trusted-format",
            "--no-jump",
            "--big-endian",
        ])
        .unwrap();
        let config = options.config().unwrap();
        assert_eq!(config.id, "hw2-level1");
        assert_eq!(config.buffer_capacity, 16);
        assert_eq!(config.bounds, BoundsPolicy::Checked);
        assert_eq!(config.format, FormatPolicy::Trusted);
        assert_eq!(config.control_transfer, ControlTransferPolicy::Disabled);
        assert_eq!(config.byte_order, ByteOrder::Big);
    }

    #[test]
    fn test_defaults_keep_the_preset() {
        let config = parse(&["hw1-level2"]).unwrap().config().unwrap();
        assert_eq!(config, ExerciseConfig::hw1_level2());
    }

    #[test]
    fn test_config_needs_a_known_exercise() {
        let err = parse(&[]).unwrap().config().unwrap_err();
        assert!(matches!(err, ExerciseError::Usage { .. }));

        let err = parse(&["hw9"]).unwrap().config().unwrap_err();
        assert!(matches!(err, ExerciseError::UnknownExercise { ref id } if id == "hw9"));
    }

    #[test]
    fn test_buf_size_bounds() {
        let size = |value: &str| parse_size(&OsString::from(value));
        assert_eq!(size("1").unwrap(), 1);
        assert_eq!(size(&MAX_BUFFER_CAPACITY.to_string()).unwrap(), MAX_BUFFER_CAPACITY);
        for bad in ["0", "-1", "abc", "1099511627776", "18446744073709551616"] {
            assert!(
                matches!(size(bad), Err(ExerciseError::InvalidOption { .. })),
                "accepted {}",
                bad
            );
        }
        assert!(parse(&["hw1-level1", "--buf-size"]).is_err());
        assert!(parse(&["hw1-level1", "--buf-size", "65537"]).is_err());
    }
}
