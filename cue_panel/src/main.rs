use clap::Parser;
use cue_panel::config::{self, PanelConfig};
use cue_panel::{CuePanel, Key, PanelEvent, RawInput, WsConnector};
use cue_protocol::CueIndex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cue_panel", about = "Terminal panel for a StageCue controller")]
struct Args {
    /// Url the panel would be served from; the socket url is derived from it.
    #[arg(long, env = "STAGECUE_PAGE_URL", default_value = config::DEFAULT_PAGE_URL)]
    page_url: String,

    /// Explicit ws:// or wss:// url, overrides --page-url.
    #[arg(long, env = "STAGECUE_WS_URL")]
    ws_url: Option<String>,

    #[arg(long, env = "STAGECUE_RECONNECT_MS", default_value_t = 2000)]
    reconnect_ms: u64,

    #[arg(long, env = "STAGECUE_CUES", default_value_t = config::DEFAULT_CUE_COUNT)]
    cues: u32,

    /// Initial label of a cue, in index order. Repeatable.
    #[arg(long = "label", value_name = "TEXT")]
    labels: Vec<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<PanelConfig> {
        let page = self.ws_url.as_deref().unwrap_or(&self.page_url);
        Ok(PanelConfig::for_page(page)?
            .with_reconnect_delay(Duration::from_millis(self.reconnect_ms))
            .with_cues(self.cues, &self.labels)?)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Events(Vec<PanelEvent>),
    Show,
    Connect,
    Help,
    Quit,
}

const HELP: &str = "\
commands:
  press N        hold cue N (pointer down)
  up N           let go of cue N (pointer up)
  key N          tap cue N with the space bar
  release N      hit the release control of cue N
  edit N TEXT    focus cue N's input and type TEXT
  focus N        focus cue N's input
  blur N         leave cue N's input (commits a rename)
  commit N       commit cue N's input without leaving it
  show           print the board
  connect        reconnect now
  quit";

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim_start();

    let cue = |arg: &str| -> Result<CueIndex, String> {
        arg.parse().map_err(|_| format!("`{arg}` is not a cue index"))
    };
    let input = |raw: RawInput| Command::Events(vec![PanelEvent::Input(raw)]);

    let cmd = match verb {
        "press" => input(RawInput::PointerDown { cue: cue(rest)? }),
        "up" => input(RawInput::PointerUp { cue: cue(rest)? }),
        "key" => {
            let cue = cue(rest)?;
            Command::Events(vec![
                PanelEvent::Input(RawInput::KeyDown { cue, key: Key::Space }),
                PanelEvent::Input(RawInput::KeyUp { cue, key: Key::Space }),
            ])
        }
        "release" => input(RawInput::ReleaseClick { cue: cue(rest)? }),
        "edit" => {
            let (index, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let cue = cue(index)?;
            Command::Events(vec![
                PanelEvent::Focus { cue },
                PanelEvent::Edit {
                    cue,
                    text: text.to_string(),
                },
            ])
        }
        "focus" => Command::Events(vec![PanelEvent::Focus { cue: cue(rest)? }]),
        "blur" => Command::Events(vec![PanelEvent::Blur { cue: cue(rest)? }]),
        "commit" => Command::Events(vec![PanelEvent::Change { cue: cue(rest)? }]),
        "show" | "" => Command::Show,
        "connect" => Command::Connect,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command `{other}` (try `help`)")),
    };
    Ok(cmd)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Args::parse().into_config()?;
    eprintln!("cue_panel connecting to {}", config.socket_url);

    let panel = CuePanel::start(&config, WsConnector);

    let mut changes = panel.subscribe_changes();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                print!("{}", panel.board().render());
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(Command::Events(events)) => {
                        for event in events {
                            panel.handle(event);
                        }
                    }
                    Ok(Command::Show) => print!("{}", panel.board().render()),
                    Ok(Command::Connect) => panel.connect(),
                    Ok(Command::Help) => println!("{HELP}"),
                    Ok(Command::Quit) => break,
                    Err(msg) => eprintln!("{msg}"),
                }
            }
        }
    }

    panel.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gestures() {
        assert_eq!(
            parse_command("press 2"),
            Ok(Command::Events(vec![PanelEvent::Input(
                RawInput::PointerDown { cue: 2 }
            )]))
        );
        assert_eq!(
            parse_command("release 0"),
            Ok(Command::Events(vec![PanelEvent::Input(
                RawInput::ReleaseClick { cue: 0 }
            )]))
        );
    }

    #[test]
    fn edit_keeps_inner_spaces() {
        assert_eq!(
            parse_command("edit 1 Stage  left "),
            Ok(Command::Events(vec![
                PanelEvent::Focus { cue: 1 },
                PanelEvent::Edit {
                    cue: 1,
                    text: "Stage  left".to_string()
                },
            ]))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("press x").is_err());
        assert!(parse_command("dance 1").is_err());
        assert_eq!(parse_command(""), Ok(Command::Show));
    }

    #[test]
    fn ws_url_overrides_page_url() {
        let args = Args::parse_from([
            "cue_panel",
            "--ws-url",
            "ws://127.0.0.1:9001/ws",
            "--cues",
            "2",
            "--label",
            "Intro",
        ]);
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.socket_url.as_str(), "ws://127.0.0.1:9001/ws");
        assert_eq!(cfg.layout, vec![(0, "Intro".to_string()), (1, String::new())]);
    }
}
