use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to use instead of the default search locations
    #[clap(long, value_parser, global = true)]
    pub config: Option<PathBuf>,

    /// Extra plugin directory, may be repeated
    #[clap(long = "plugin-dir", value_parser, global = true)]
    pub plugin_dirs: Vec<PathBuf>,

    #[clap(long, value_parser, default_value_t = false, global = true)]
    pub verbose: bool,

    #[clap(long, value_parser, global = true)]
    pub log: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one query and print the ranked results
    Query {
        #[clap(required = true, num_args = 1..)]
        text: Vec<String>,

        #[clap(long, value_parser, default_value_t = false)]
        json: bool,

        /// Execute the action of the N-th result (1-based)
        #[clap(long, value_parser)]
        run: Option<usize>,
    },
    /// List loaded plugins
    Plugins {
        #[clap(long, value_parser, default_value_t = false)]
        json: bool,
    },
    /// Read queries from stdin, one generation per line
    Repl,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Query { .. } => "query",
            Commands::Plugins { .. } => "plugins",
            Commands::Repl => "repl",
        }
    }
}

/// A `:`-prefixed line typed into the REPL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Run(usize),
    Menu(usize),
    Pin(usize),
    Unpin,
    Enable(String),
    Disable(String),
    AddKeyword { plugin_id: String, keyword: String },
    RemoveKeyword { plugin_id: String, keyword: String },
    Stats,
    Help,
    Quit,
}

impl ReplCommand {
    /// Parses the text after the leading `:`.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        let index = |args: &[&str]| -> Result<usize, String> {
            match args {
                [n] => n
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("'{n}' is not a result number")),
                _ => Err(format!(":{name} expects one result number")),
            }
        };

        match name {
            "run" | "r" => index(&args).map(ReplCommand::Run),
            "menu" | "m" => index(&args).map(ReplCommand::Menu),
            "pin" => index(&args).map(ReplCommand::Pin),
            "unpin" => Ok(ReplCommand::Unpin),
            "enable" | "disable" => match args.as_slice() {
                [id] if name == "enable" => Ok(ReplCommand::Enable((*id).to_string())),
                [id] => Ok(ReplCommand::Disable((*id).to_string())),
                _ => Err(format!(":{name} expects a plugin id")),
            },
            "keyword" | "kw" => match args.as_slice() {
                ["add", id, kw] => Ok(ReplCommand::AddKeyword {
                    plugin_id: (*id).to_string(),
                    keyword: (*kw).to_string(),
                }),
                ["remove", id, kw] => Ok(ReplCommand::RemoveKeyword {
                    plugin_id: (*id).to_string(),
                    keyword: (*kw).to_string(),
                }),
                _ => Err(":keyword expects add|remove <plugin> <keyword>".to_string()),
            },
            "stats" => Ok(ReplCommand::Stats),
            "help" | "h" | "?" => Ok(ReplCommand::Help),
            "quit" | "q" | "exit" => Ok(ReplCommand::Quit),
            other => Err(format!("unknown command ':{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_subcommand() {
        let cli = Cli::try_parse_from(["rflaunch", "--plugin-dir", "/p", "query", "g", "rust", "--run", "2"])
            .unwrap();
        assert_eq!(cli.plugin_dirs, vec![PathBuf::from("/p")]);
        match cli.command {
            Commands::Query { text, run, json } => {
                assert_eq!(text, vec!["g", "rust"]);
                assert_eq!(run, Some(2));
                assert!(!json);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn repl_commands() {
        assert_eq!(ReplCommand::parse("run 3"), Ok(ReplCommand::Run(3)));
        assert_eq!(ReplCommand::parse("disable web"), Ok(ReplCommand::Disable("web".into())));
        assert_eq!(
            ReplCommand::parse("keyword add web w"),
            Ok(ReplCommand::AddKeyword {
                plugin_id: "web".into(),
                keyword: "w".into()
            })
        );
        assert!(ReplCommand::parse("run 0").is_err());
        assert!(ReplCommand::parse("pin").is_err());
        assert!(ReplCommand::parse("bogus").is_err());
    }
}
