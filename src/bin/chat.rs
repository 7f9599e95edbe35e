//! Interactive terminal chat addressing providers as `@name message`

use openllms_gateway::{
    api::prompt::with_overlay, config::Settings, init_tracing, provider::ModelRegistry,
};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Send { target: &'a str, message: &'a str },
    Invalid(&'static str),
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return Command::Quit;
    }

    let Some(addressed) = line.strip_prefix('@') else {
        return Command::Invalid("Please address a provider using @<name>");
    };

    match addressed.split_once(' ') {
        Some((target, message)) if !target.is_empty() && !message.trim().is_empty() => {
            Command::Send {
                target,
                message: message.trim(),
            }
        }
        _ => Command::Invalid("Please provide a message after the provider handle"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    settings.validate()?;
    init_tracing(&settings.logging);

    let registry = ModelRegistry::from_settings(&settings);
    let names: Vec<&str> = registry.providers().iter().map(|p| p.name()).collect();

    let mut stdout = io::stdout();
    stdout
        .write_all(b"LLM Chat (type 'exit' to quit)\nAddress providers using @<name>, e.g. '@scoutly Hello'\n")
        .await?;
    stdout
        .write_all(format!("Providers: {}\n", names.join(", ")).as_bytes())
        .await?;

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        stdout.write_all(b"You: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let output = match parse_command(&line) {
            Command::Quit => break,
            Command::Invalid(reason) => format!("Error: {}\n", reason),
            Command::Send { target, message } => match registry.resolve_provider(target) {
                Err(_) => format!("Error: No provider named '{}'\n", target),
                Ok((provider, system)) => {
                    match provider.query(&with_overlay(&system, message)).await {
                        Ok(reply) => format!("{}: {}\n", target, reply.message),
                        Err(e) => format!("{} Error: {}\n", target, e),
                    }
                }
            },
        };
        stdout.write_all(output.as_bytes()).await?;
    }

    Ok(())
}
