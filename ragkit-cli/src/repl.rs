//! Interactive question loop.

use ragkit_core::config::RagConfig;
use ragkit_core::rag::{AnswerResult, RagPipeline};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

const BANNER: &str = "Welcome to ACME Analytics Q&A (RAG Demo)";

/// What the loop should do with one line of input.
#[derive(Debug, PartialEq, Eq)]
enum LineAction<'a> {
    Quit,
    Skip,
    Ask(&'a str),
}

fn classify(line: &str) -> LineAction<'_> {
    let trimmed = line.trim();
    match trimmed.to_lowercase().as_str() {
        "quit" | "exit" | "q" => LineAction::Quit,
        "" => LineAction::Skip,
        _ => LineAction::Ask(trimmed),
    }
}

/// Human-readable rendering of an answer.
fn render_answer(result: &AnswerResult) -> String {
    let mut out = format!(
        "\nAnswer: {}\nConfidence: {}\nSources: {}\n",
        result.answer,
        result.confidence,
        result.sources_used.join(", ")
    );
    if let Some(follow_up) = &result.follow_up_suggestion {
        out.push_str(&format!("Follow-up suggestion: {follow_up}\n"));
    }
    out
}

fn print_banner() {
    let equals = "=".repeat(50);
    let stars = "*".repeat(50);
    println!("{equals}\n{stars}");
    println!("{BANNER}\n");
    println!("Type 'quit' at any time to exit");
    println!("{stars}\n{equals}\n");
}

/// Run the loop until `quit`, end of input, or Ctrl+C at the prompt.
///
/// A failed question is reported and the loop continues. Ctrl+C while an
/// answer is pending cancels that question only.
pub async fn run_interactive(config: RagConfig) -> anyhow::Result<()> {
    let pipeline = RagPipeline::from_config(&config)?;
    print_banner();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Question: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let question = match classify(&line) {
            LineAction::Quit => break,
            LineAction::Skip => continue,
            LineAction::Ask(q) => q,
        };

        tokio::select! {
            result = pipeline.generate_answer(question, None, None) => match result {
                Ok(answer) => println!("{}", render_answer(&answer)),
                Err(e) => {
                    error!(error = %e, kind = %e.kind(), "Question failed");
                    println!("\nError: {e}\n");
                }
            },
            _ = tokio::signal::ctrl_c() => println!("\nCancelled.\n"),
        }
    }
    Ok(())
}
