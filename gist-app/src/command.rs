use gist_common::{Operation, TriggerSource};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open { url: String, file: Option<PathBuf> }, // /open <url> [file]
    Run(Operation, TriggerSource),               // /summarize | /crawl | /relay
    Start,                                       // /start
    Show,                                        // /show
    Clear,                                       // /clear
    Help,                                        // /help
    Quit,                                        // /quit or /exit
    Unknown(String),
}

pub const HELP: &str = "\
/open <url> [file]  switch to a page; markup comes from <file> or is fetched
/summarize          summarize the active page
/crawl              extract keywords and top links
/start              summarize and crawl
/relay              summarize through the relay
/show               print the current view
/clear              clear the result cache
/help               this text
/quit               exit";

pub fn parse_command(input: &str) -> Command {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return Command::Unknown(trimmed.to_string());
    }
    let mut parts = trimmed.split_whitespace();
    let verb = parts.next().unwrap_or_default();

    match verb {
        "/open" => match (parts.next(), parts.next(), parts.next()) {
            (Some(url), file, None) => Command::Open {
                url: url.to_string(),
                file: file.map(PathBuf::from),
            },
            _ => Command::Unknown(trimmed.to_string()),
        },
        "/summarize" => Command::Run(Operation::Summarize, TriggerSource::Direct),
        "/crawl" => Command::Run(Operation::Crawl, TriggerSource::Direct),
        "/relay" => Command::Run(Operation::Summarize, TriggerSource::Relay),
        "/start" => Command::Start,
        "/show" => Command::Show,
        "/clear" => Command::Clear,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}
