//! One question to the assistant.

use crate::assistant::Assistant;
use crate::settings::Settings;
use clap::Args;

#[derive(Args)]
pub struct AskArgs {
    /// The question
    #[arg(required = true, num_args = 1.., value_name = "QUESTION")]
    question: Vec<String>,
}

pub fn run(args: AskArgs, settings: &Settings) -> anyhow::Result<()> {
    let assistant = Assistant::from_env(settings.assistant.clone());
    println!("{}", assistant.ask(&args.question.join(" ")));
    Ok(())
}
