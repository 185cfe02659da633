use chrono::NaiveDate;
use crossbeam_channel::{select, unbounded};
use signal_scope::config::Config;
use signal_scope::connection::FetchWorker;
use signal_scope::console::{parse_command, render_status, ConsoleCommand, HELP};
use signal_scope::ingest::{FetchUpdate, IngestionController};
use signal_scope::payload::SampleParser;
use signal_scope::session::{Message, Session};
use signal_scope::source::{Credentials, HttpSource};
use std::io::BufRead;

enum Event {
    Fetched(FetchUpdate),
    Input(String),
    Closed,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load().unwrap_or_else(|e| {
        log::error!("{}, falling back to defaults", e);
        Config::default()
    });
    if !config.has_credentials() {
        eprintln!(
            "Set uid and api_key in {} before starting",
            Config::config_path().display()
        );
        std::process::exit(1);
    }

    let source = HttpSource::new(
        config.source_url.clone(),
        Credentials {
            uid: config.uid.clone(),
            api_key: config.api_key.clone(),
        },
    )?;
    let parser = SampleParser::new(
        config.sample_spacing_ms(),
        config.wall_clock_offset_hours,
        config.source_id.clone(),
    );
    let controller = IngestionController::new(source, parser, config.stale_responses);

    // Fetch results flow back to this thread over `updates`
    let (update_sender, updates) = unbounded::<FetchUpdate>();
    let (worker, commands) = FetchWorker::new(controller, update_sender, config.poll_interval());
    let worker_thread = std::thread::spawn(move || {
        if let Err(e) = worker.run() {
            log::error!("Fetch worker stopped: {}", e);
        }
    });

    // Operator input is read on its own thread so fetch results are never held up
    let (line_sender, lines) = unbounded::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(Result::ok) {
            if line_sender.send(line).is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(&config, commands);
    match std::env::args().nth(1).as_deref() {
        Some("live") => session.update(Message::EnterLive),
        Some(arg) => match NaiveDate::parse_from_str(arg, "%Y-%m-%d") {
            Ok(date) => session.update(Message::SelectDate(date)),
            Err(_) => eprintln!("usage: signal-scope [live | YYYY-MM-DD]"),
        },
        None => {}
    }
    println!("{}", HELP);

    loop {
        let event = select! {
            recv(updates) -> update => update.map(Event::Fetched).unwrap_or(Event::Closed),
            recv(lines) -> line => line.map(Event::Input).unwrap_or(Event::Closed),
        };
        match event {
            Event::Fetched(update) => {
                session.update(Message::FetchCompleted(update));
                println!("{}", render_status(&session));
            }
            Event::Input(line) => match parse_command(&line) {
                Ok(ConsoleCommand::Session(message)) => {
                    session.update(message);
                    println!("{}", render_status(&session));
                }
                Ok(ConsoleCommand::Export) => match session.export() {
                    Ok(path) => println!("exported {}", path.display()),
                    Err(e) => println!("{}", e),
                },
                Ok(ConsoleCommand::Status) => println!("{}", render_status(&session)),
                Ok(ConsoleCommand::Help) => println!("{}", HELP),
                Ok(ConsoleCommand::Quit) => break,
                Err(e) => println!("{}", e),
            },
            Event::Closed => break,
        }
        if !session.is_active() {
            break;
        }
    }

    // Dropping the session closes the command channel, which stops the worker and its timer
    drop(session);
    if worker_thread.join().is_err() {
        log::error!("Fetch worker panicked");
    }
    Ok(())
}
