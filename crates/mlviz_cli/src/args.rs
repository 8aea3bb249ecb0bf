//! Command-line parsing.

use std::path::PathBuf;

use mlviz::lessons::LessonKind;

use crate::error::CliError;

pub const USAGE: &str = "\
mlviz - run machine-learning lessons headless

Usage: mlviz [--config PATH] <command> [args]

Commands:
  list                         List lessons
  chapters                     List chapters and their lessons
  params <lesson>              Show a lesson's parameters
  run <lesson> [options]       Auto-advance a lesson until it halts
      -p, --param KEY=VALUE    Set a parameter (repeatable)
      --seed N                 Fixed random seed
      --delay-ms N             Tick delay (default: per lesson)
      --svg PATH               Write the final chart as SVG
      --json                   Print one JSON frame per tick
  sitemap [--base URL]         Print sitemap.xml
  paths                        Show the config file location

Logging follows RUST_LOG (e.g. RUST_LOG=mlviz=debug).";

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub lesson: LessonKind,
    pub params: Vec<String>,
    pub seed: Option<u64>,
    pub delay_ms: Option<u64>,
    pub svg: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Chapters,
    Params { lesson: LessonKind },
    Run(RunOptions),
    Sitemap { base_url: Option<String> },
    Paths,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
    pub config: Option<PathBuf>,
    pub command: Command,
}

fn value<I: Iterator<Item = String>>(flag: &str, it: &mut I) -> Result<String, CliError> {
    it.next()
        .ok_or_else(|| CliError::usage(format!("{flag} needs a value")))
}

fn number<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T, CliError> {
    raw.parse()
        .map_err(|_| CliError::usage(format!("{flag} must be a number, got `{raw}`")))
}

fn lesson(raw: Option<String>) -> Result<LessonKind, CliError> {
    let raw = raw.ok_or_else(|| CliError::usage("missing lesson name (see `mlviz list`)"))?;
    Ok(LessonKind::from_label(&raw)?)
}

/// Parse everything after the program name.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Cli, CliError> {
    let mut it = args.into_iter();
    let mut config = None;

    let cmd = loop {
        match it.next() {
            Some(flag) if flag == "--config" => config = Some(PathBuf::from(value(&flag, &mut it)?)),
            Some(cmd) => break cmd,
            None => {
                return Ok(Cli {
                    config,
                    command: Command::Help,
                })
            }
        }
    };

    let command = match cmd.as_str() {
        "help" | "-h" | "--help" => Command::Help,
        "list" => Command::List,
        "chapters" => Command::Chapters,
        "paths" => Command::Paths,
        "params" => Command::Params {
            lesson: lesson(it.next())?,
        },
        "sitemap" => {
            let mut base_url = None;
            while let Some(flag) = it.next() {
                match flag.as_str() {
                    "--base" => base_url = Some(value(&flag, &mut it)?),
                    other => return Err(CliError::usage(format!("unknown sitemap option `{other}`"))),
                }
            }
            Command::Sitemap { base_url }
        }
        "run" => {
            let mut opts = RunOptions {
                lesson: lesson(it.next())?,
                params: Vec::new(),
                seed: None,
                delay_ms: None,
                svg: None,
                json: false,
            };
            while let Some(flag) = it.next() {
                match flag.as_str() {
                    "-p" | "--param" => opts.params.push(value(&flag, &mut it)?),
                    "--seed" => opts.seed = Some(number(&flag, &value(&flag, &mut it)?)?),
                    "--delay-ms" => opts.delay_ms = Some(number(&flag, &value(&flag, &mut it)?)?),
                    "--svg" => opts.svg = Some(PathBuf::from(value(&flag, &mut it)?)),
                    "--json" => opts.json = true,
                    other => return Err(CliError::usage(format!("unknown run option `{other}`"))),
                }
            }
            Command::Run(opts)
        }
        other => return Err(CliError::usage(format!("unknown command `{other}`"))),
    };

    Ok(Cli { config, command })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Cli, CliError> {
        parse_args(s.split_whitespace().map(String::from))
    }

    #[test]
    fn no_arguments_is_help() {
        assert_eq!(parse("").unwrap().command, Command::Help);
    }

    #[test]
    fn run_with_all_options() {
        let cli = parse("--config /tmp/c.json run kmeans -p k=4 --param spread=1.5 --seed 9 --delay-ms 50 --svg out.svg --json")
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
        assert_eq!(
            cli.command,
            Command::Run(RunOptions {
                lesson: LessonKind::Kmeans,
                params: vec!["k=4".into(), "spread=1.5".into()],
                seed: Some(9),
                delay_ms: Some(50),
                svg: Some(PathBuf::from("out.svg")),
                json: true,
            })
        );
    }

    #[test]
    fn unknown_lesson_is_reported() {
        let err = parse("run tsne").unwrap_err();
        assert!(matches!(err, CliError::Lesson(mlviz::Error::UnknownLesson(_))));
    }

    #[test]
    fn missing_flag_value_is_usage_error() {
        assert!(matches!(parse("run roc --seed").unwrap_err(), CliError::Usage(_)));
        assert!(matches!(parse("run roc --seed x").unwrap_err(), CliError::Usage(_)));
        assert!(matches!(parse("frobnicate").unwrap_err(), CliError::Usage(_)));
    }

    #[test]
    fn sitemap_base() {
        assert_eq!(
            parse("sitemap --base https://a.b").unwrap().command,
            Command::Sitemap {
                base_url: Some("https://a.b".into())
            }
        );
    }
}
