use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    load_config, Mode, OptionMark, QuizPhase, QuizSnapshot, SendOutcome, SessionEvent,
    StudySession, UploadError, UploadFile,
};
use shared::domain::{Author, Message};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Study your course notes from the terminal")]
struct Args {
    /// Study server base URL, overrides config and environment.
    #[arg(long)]
    server_url: Option<String>,
    /// Config file; defaults to ./study_client.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Start the conversation without the opening greeting.
    #[arg(long)]
    no_greeting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Upload(PathBuf),
    Docs,
    Ask(String),
    SwitchMode(Mode),
    Cards,
    Flip(usize),
    Quiz,
    Answer { question: usize, option: usize },
    Submit,
    Show,
    Help,
    Quit,
}

const HELP: &str = "\
commands:
  upload <path>        add a PDF to the course materials
  docs                 list course materials
  ask <question>       ask about your notes (plain text also works in chat mode)
  mode chat|cards|quiz switch study mode
  cards                generate a new flashcard set
  flip <n>             turn flashcard n over
  quiz                 start a new quiz
  answer <q> <option>  pick an option (letter or number) for question q
  submit               submit quiz answers
  show                 print the current mode
  quit";

fn parse_index(raw: Option<&str>, what: &str) -> Result<usize, String> {
    let raw = raw.ok_or_else(|| format!("missing {what}"))?;
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("{what} must be a number starting at 1")),
    }
}

fn parse_option(raw: Option<&str>) -> Result<usize, String> {
    let raw = raw.ok_or("missing option")?;
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            Ok(usize::from(letter.to_ascii_lowercase() as u8 - b'a'))
        }
        _ => parse_index(Some(raw), "option"),
    }
}

fn parse_command(line: &str, mode: Mode) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (head, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(head, rest)| (head, rest.trim()));

    let command = match head {
        "upload" if !rest.is_empty() => Command::Upload(PathBuf::from(rest)),
        "upload" => return Err("usage: upload <path>".into()),
        "docs" => Command::Docs,
        "ask" => Command::Ask(rest.to_string()),
        "mode" => Command::SwitchMode(match rest {
            "chat" => Mode::Chat,
            "cards" | "flashcards" => Mode::Flashcards,
            "quiz" => Mode::Quiz,
            other => return Err(format!("unknown mode '{other}'")),
        }),
        "cards" => Command::Cards,
        "flip" => Command::Flip(parse_index(Some(rest), "card")?),
        "quiz" => Command::Quiz,
        "answer" => {
            let mut parts = rest.split_whitespace();
            let question = parse_index(parts.next(), "question")?;
            let option = parse_option(parts.next())?;
            Command::Answer { question, option }
        }
        "submit" => Command::Submit,
        "show" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ if mode == Mode::Chat => Command::Ask(line.to_string()),
        other => return Err(format!("unknown command '{other}'; try 'help'")),
    };
    Ok(Some(command))
}

fn print_message(message: &Message) {
    match message.author {
        Author::User => println!("you> {}", message.text),
        Author::Assistant => println!("bot> {}", message.text),
    }
}

fn print_quiz(quiz: &QuizSnapshot) {
    if let Some(score) = quiz.score {
        println!("score: {score}/{}", quiz.items.len());
    }
    let review = quiz.review();
    for (index, item) in quiz.items.iter().enumerate() {
        let verdict = match review.as_ref().and_then(|review| review.get(index)) {
            Some(question) if question.is_correct => " (correct)",
            Some(_) => " (wrong)",
            None => "",
        };
        println!("{}. {}{verdict}", index + 1, item.question);
        for (position, option) in item.options.iter().enumerate() {
            let marker = match quiz.option_mark(index, option) {
                OptionMark::Unselected => ' ',
                OptionMark::Selected => '*',
                OptionMark::Correct => '+',
                OptionMark::WrongSelection => 'x',
                OptionMark::Dimmed => '.',
            };
            let letter = char::from(b'a' + u8::try_from(position % 26).unwrap_or(0));
            println!("   [{marker}] {letter}) {option}");
        }
    }
}

async fn print_flashcards(session: &StudySession) {
    for (index, view) in session.flashcards().snapshot().await.cards.iter().enumerate() {
        let face = if view.flipped {
            &view.card.back
        } else {
            &view.card.front
        };
        println!("{:>2}. {face}", index + 1);
    }
}

fn spawn_event_printer(session: Arc<StudySession>, mut events: broadcast::Receiver<SessionEvent>) {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event printer fell behind");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match event {
                SessionEvent::MessageAppended(message) if message.author == Author::Assistant => {
                    print_message(&message);
                }
                SessionEvent::DocumentAdded(document) => {
                    println!("added {}", document.name);
                }
                SessionEvent::FlashcardsReplaced { count } => {
                    println!("{count} new flashcards:");
                    print_flashcards(&session).await;
                }
                SessionEvent::QuizChanged(QuizPhase::Ready) => {
                    print_quiz(&session.quiz().snapshot().await);
                }
                SessionEvent::RequestFailed { action, message } => {
                    println!("{action} failed: {message}");
                }
                _ => {}
            }
        }
    });
}

async fn execute(session: &Arc<StudySession>, command: Command) -> Result<()> {
    match command {
        Command::Upload(path) => {
            if session.snapshot().await.upload.in_flight {
                println!("an upload is already processing");
                return Ok(());
            }
            let file = UploadFile::from_path(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let session = Arc::clone(session);
            println!("processing {}...", file.name);
            tokio::spawn(async move {
                match session.upload_file(file).await {
                    Ok(_) => {}
                    Err(UploadError::Duplicate(name)) => println!("{name}: file already added"),
                    Err(err) => println!("upload failed: {err}"),
                }
            });
        }
        Command::Docs => {
            let documents = session.corpus().documents().await;
            if documents.is_empty() {
                println!("no course materials yet");
            }
            for document in documents {
                println!("- {} (added {})", document.name, document.added_at.format("%H:%M:%S"));
            }
        }
        Command::Ask(question) => {
            if session.conversation().snapshot().await.awaiting_reply {
                println!("still thinking about the last question");
                return Ok(());
            }
            let session = Arc::clone(session);
            tokio::spawn(async move {
                if session.send_message(&question).await == SendOutcome::Empty {
                    println!("type a question first");
                }
            });
        }
        Command::SwitchMode(mode) => {
            session.set_mode(mode).await;
            println!("{mode:?} mode");
        }
        Command::Cards => {
            if session.flashcards().is_in_flight() {
                println!("already generating flashcards");
                return Ok(());
            }
            let session = Arc::clone(session);
            tokio::spawn(async move {
                if let Ok(0) = session.generate_flashcards().await {
                    println!("no flashcards generated");
                }
            });
        }
        Command::Flip(index) => match session.flip_flashcard(index).await {
            Some(_) => print_flashcards(session).await,
            None => println!("no card {}", index + 1),
        },
        Command::Quiz => {
            if session.quiz().is_in_flight() {
                println!("already generating a quiz");
                return Ok(());
            }
            let session = Arc::clone(session);
            tokio::spawn(async move {
                if let Ok(0) = session.generate_quiz().await {
                    println!("no questions generated");
                }
            });
        }
        Command::Answer { question, option } => {
            let quiz = session.quiz().snapshot().await;
            let Some(choice) = quiz
                .items
                .get(question)
                .and_then(|item| item.options.get(option))
            else {
                println!("no such question or option");
                return Ok(());
            };
            if !session.select_answer(question, choice.clone()).await {
                println!("answers can't be changed right now");
            }
        }
        Command::Submit => match session.submit_quiz().await {
            Ok(_) => print_quiz(&session.quiz().snapshot().await),
            Err(err) => println!("{err}"),
        },
        Command::Show => println!("{:?} mode", session.mode().await),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(server_url) = &args.server_url {
        config = config.with_server_url(server_url)?;
    }
    if args.no_greeting {
        config.chat.greeting = None;
    }

    let session = StudySession::connect(&config)?;
    spawn_event_printer(Arc::clone(&session), session.subscribe_events());

    for message in session.conversation().messages().await {
        print_message(&message);
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mode = session.mode().await;
        match parse_command(&line, mode) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(err) = execute(&session, command).await {
                    println!("{err:#}");
                }
            }
            Ok(None) => {}
            Err(message) => println!("{message}"),
        }
    }

    Ok(())
}
