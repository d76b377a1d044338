use anyhow::Result;
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tickcast::prelude::*;
use tickcast::{ENGINE_NAME, VERSION as LIB_VERSION};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct MyHighlighter;

impl Highlighter for MyHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

/// The policies the shell drives, bound to one engine.
struct Policies {
    pulse: Arc<DelayedPulsePolicy>,
    toggle: Arc<PeriodicTogglePolicy>,
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    // Embedded at compile time from the crate root.
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.cyan());

    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!("{}", "-".repeat(60).dimmed());
    println!("{}", version_string);
    println!("{}", "-".repeat(60).dimmed());
}

/// Renders effects and system events without ever blocking the engine.
fn spawn_event_listeners(engine: &TickEngine, show_display: Arc<AtomicBool>) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            match event {
                SystemEvent::ClockStarted { at } => {
                    println!("\n<-- [SERVER] active since {}", at.format("%H:%M:%S"))
                }
                SystemEvent::ClockStopped { tick } => {
                    println!("\n<-- [SERVER] inactive at {} s", tick)
                }
                SystemEvent::SubscriberFailed { id, tick, reason } => println!(
                    "\n<-- {} {:?} at tick {}: {}",
                    "[FAILURE]".red().bold(),
                    id,
                    tick,
                    reason
                ),
                _ => {}
            }
        }
    });

    let mut effect_rx = engine.subscribe_effects();
    tokio::spawn(async move {
        loop {
            let effect = match effect_rx.recv().await {
                Ok(effect) => effect,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Effect listener fell behind.");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match effect {
                Effect::Display { text } => {
                    if show_display.load(Ordering::Relaxed) {
                        println!("<-- [TIME] {}", text);
                    }
                }
                Effect::PulseStart => println!("<-- [CLIP] {}", "playing".green().bold()),
                Effect::PulseStop => println!("<-- [CLIP] {}", "not playing".dimmed()),
                Effect::Toggle {
                    direction,
                    from_offset,
                    to_offset,
                } => {
                    let label = format!("{:?}", direction.tint()).to_lowercase();
                    let painted = match direction.tint() {
                        Tint::Green => label.green(),
                        Tint::Blue => label.blue(),
                    };
                    println!(
                        "<-- [CIRCLE] {} moving {:?}: {} -> {}",
                        painted, direction, from_offset, to_offset
                    );
                }
            }
        }
    });
}

/// Builds the three policies and registers them in display, pulse, toggle order.
async fn install_policies(engine: &TickEngine) -> Result<Policies> {
    let config = engine.config().clone();
    let sink: Arc<dyn EffectSink> = Arc::new(engine.effect_sink());

    let pulse = Arc::new(DelayedPulsePolicy::new(
        engine.subject(),
        sink.clone(),
        config.pulse.default_delay,
    ));
    let toggle = Arc::new(PeriodicTogglePolicy::new(
        sink.clone(),
        config.toggle.period,
        config.toggle.distance,
    )?);

    engine
        .attach(Arc::new(ContinuousDisplayPolicy::new(sink)))
        .await;
    engine.attach(pulse.clone()).await;
    engine.attach(toggle.clone()).await;

    Ok(Policies { pulse, toggle })
}

async fn print_status(engine: &TickEngine, policies: &Policies) {
    let server = if engine.is_active() {
        "active".green()
    } else {
        "inactive".red()
    };
    println!("Server:    {} at {} s", server, engine.state());
    println!("Listeners: {}", engine.subscriber_count().await);

    let pulse = &policies.pulse;
    if pulse.is_playing() {
        println!("Clip:      playing (every {} s)", pulse.delay());
    } else if pulse.is_armed() {
        println!("Clip:      waiting {} s...", pulse.delay());
    } else {
        println!("Clip:      not playing");
    }

    let toggle = &policies.toggle;
    println!(
        "Circle:    every {} s, moving {:?}",
        toggle.period(),
        toggle.direction()
    );
}

/// Parses the numeric argument of `arm`/`period`.
fn parse_seconds(arg: Option<&&str>, usage: &str) -> Option<u64> {
    match arg {
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) => Some(value),
            Err(_) => {
                println!("Error: '{}' is not a valid number of seconds.", raw);
                None
            }
        },
        None => {
            println!("Usage: {}", usage);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = TickcastConfig::load(config_path.as_deref())?;
    let engine = TickEngine::new(config)?;

    let show_display = Arc::new(AtomicBool::new(true));
    spawn_event_listeners(&engine, show_display.clone());

    let policies = install_policies(&engine).await?;
    policies.pulse.resume()?;
    println!(
        "--> Clip waiting {} s after the server starts.",
        policies.pulse.delay()
    );

    info!("{} is ready.", ENGINE_NAME);

    let mut rl = Editor::new()?;
    rl.set_helper(Some(MyHighlighter {}));

    println!(
        "{} is loaded. Type 'help' for commands or 'exit' to quit.",
        ENGINE_NAME.cyan()
    );

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();
                let Some(command) = args.first() else {
                    continue;
                };

                match *command {
                    "start" => {
                        engine.start().await;
                        println!("--> Server active.");
                    }
                    "stop" => {
                        engine.stop().await;
                        println!("--> Server inactive at {} s.", engine.state());
                    }
                    "status" => print_status(&engine, &policies).await,
                    "arm" => {
                        if let Some(delay) = parse_seconds(args.get(1), "arm <SECONDS>") {
                            match policies.pulse.arm(delay) {
                                Ok(()) => println!("--> Clip waiting {} s...", delay),
                                Err(e) => println!("Error: {}", e),
                            }
                        }
                    }
                    "resume" => match policies.pulse.resume() {
                        Ok(()) => println!("--> Clip waiting {} s...", policies.pulse.delay()),
                        Err(e) => println!("Error: {}", e),
                    },
                    "disarm" => {
                        policies.pulse.disarm();
                        println!("--> Clip not playing.");
                    }
                    "period" => {
                        if let Some(period) = parse_seconds(args.get(1), "period <SECONDS>") {
                            match policies.toggle.set_period(period) {
                                Ok(()) => println!("--> Circle turns every {} s.", period),
                                Err(e) => println!("Error: {}", e),
                            }
                        }
                    }
                    "show" => match (args.get(1), args.get(2)) {
                        (Some(&"display"), Some(&"on")) => {
                            show_display.store(true, Ordering::Relaxed);
                            println!("--> Printing elapsed time.");
                        }
                        (Some(&"display"), Some(&"off")) => {
                            show_display.store(false, Ordering::Relaxed);
                            println!("--> Elapsed time hidden.");
                        }
                        _ => println!("Usage: show display on|off"),
                    },
                    "help" => {
                        println!("Available commands:");
                        println!("  start                 - Starts the time server.");
                        println!("  stop                  - Stops the time server.");
                        println!("  status                - Shows the server and policy state.");
                        println!("  arm <S>               - Plays the clip every S seconds (S > 2).");
                        println!("  resume                - Re-arms the clip with its last delay.");
                        println!("  disarm                - Stops the clip and its timer.");
                        println!("  period <S>            - Turns the circle every S seconds.");
                        println!("  show display on|off   - Toggles the elapsed time output.");
                        println!("  exit                  - Quits the shell.");
                    }
                    "exit" => break,
                    _ => println!("Unknown command: '{}'. Type 'help'.", line),
                }
            }
            Err(_) => {
                println!("Exiting tickshell...");
                break;
            }
        }
    }

    engine.stop().await;
    Ok(())
}
