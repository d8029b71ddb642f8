//! Interactive chat loop.

use anyhow::Result;
use plenodoc_rag::document::{PAGE_KEY, ROW_KEY};
use plenodoc_rag::{Chunk, ChatSession};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

const HELP: &str = "Commands: /sources  show the passages behind the last answer\n          \
                    /retry    ask the last failed question again\n          \
                    /clear    forget the conversation\n          \
                    /quit     leave";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Quit,
    Clear,
    Sources,
    Retry,
    Help,
    Question(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Input::Empty,
            "/quit" | "/exit" => Input::Quit,
            "/clear" => Input::Clear,
            "/sources" => Input::Sources,
            "/retry" => Input::Retry,
            "/help" | "/?" => Input::Help,
            question => Input::Question(question.to_string()),
        }
    }
}

/// Where a chunk came from, e.g. `report.pdf, page 3`.
pub fn describe_source(chunk: &Chunk) -> String {
    let mut label = chunk.source.clone();
    if let Some(page) = chunk.metadata.get(PAGE_KEY) {
        label.push_str(&format!(", page {page}"));
    }
    if let Some(row) = chunk.metadata.get(ROW_KEY) {
        label.push_str(&format!(", row {row}"));
    }
    label
}

fn preview(text: &str, limit: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= limit {
        return flat;
    }
    let cut: String = flat.chars().take(limit).collect();
    format!("{cut}...")
}

/// Read questions until `/quit` or end of input, then end the session.
pub async fn run(mut session: ChatSession) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut last_sources: Vec<Chunk> = Vec::new();
    let mut failed: Option<String> = None;
    println!("Ask a question about your documents. /help lists commands.");

    loop {
        let line = match editor.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        let input = Input::parse(&line);
        if input != Input::Empty {
            let _ = editor.add_history_entry(line.trim());
        }

        let question = match input {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Help => {
                println!("{HELP}");
                continue;
            }
            Input::Clear => {
                session.clear_history();
                last_sources.clear();
                println!("Conversation cleared.");
                continue;
            }
            Input::Sources => {
                if last_sources.is_empty() {
                    println!("No sources yet.");
                }
                for (i, chunk) in last_sources.iter().enumerate() {
                    println!("[{}] {}: {}", i + 1, describe_source(chunk), preview(&chunk.text, 160));
                }
                continue;
            }
            Input::Retry => match failed.take() {
                Some(question) => question,
                None => {
                    println!("Nothing to retry.");
                    continue;
                }
            },
            Input::Question(question) => question,
        };

        println!("thinking...");
        match session.ask(&question).await {
            Ok(answer) => {
                println!("\n{}\n", answer.text.trim());
                last_sources = answer.sources;
            }
            Err(err) => {
                eprintln!("error: {err}");
                if let Some(question) = err.question() {
                    eprintln!("Your question was: {question}\nType /retry to ask it again.");
                    failed = Some(question.to_string());
                }
            }
        }
    }

    session.logout();
    Ok(())
}
