use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use itertools::Itertools;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::Duration,
};
use tenfinger::{
    app::{Action, App},
    config::{Config, ConfigStore, FileConfigStore},
    controller::SessionController,
    exercise::ExerciseProvider,
    lesson::{catalog, Catalog, LevelId},
    logging,
    runtime::{CrosstermEventSource, FixedTicker, Runner, TrainerEvent},
};

const TICK_RATE_MS: u64 = 100;

/// ten-finger touch typing trainer
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A ten-finger touch typing trainer. Each level only uses a subset of the keyboard, the next key is highlighted in the colour of the finger that should press it, and exercises can come from an external text generator."
)]
pub struct Cli {
    /// level to start at
    #[clap(short = 'l', long)]
    level: Option<LevelId>,

    /// ask the generator command for new exercises
    #[clap(long)]
    ai: bool,

    /// build exercises from this many random words of the level instead of whole example texts
    #[clap(short = 'w', long)]
    practice_words: Option<usize>,

    /// program (and arguments) that reads a prompt on stdin and prints an exercise; must come last
    #[clap(long, num_args = 1.., allow_hyphen_values = true, value_name = "COMMAND")]
    generator_command: Option<Vec<String>>,

    /// store the resulting settings as the defaults for future runs
    #[clap(long)]
    save_config: bool,

    /// print the available levels and exit
    #[clap(long)]
    list_levels: bool,

    /// log debug events to the log file
    #[clap(short, long)]
    verbose: bool,
}

impl Cli {
    /// Flags given on the command line win over the stored configuration.
    fn apply_to(&self, mut config: Config) -> Config {
        if let Some(level) = self.level {
            config.start_level = level;
        }
        if self.ai {
            config.ai_assisted = true;
        }
        if self.practice_words.is_some() {
            config.practice_words = self.practice_words;
        }
        if self.generator_command.is_some() {
            config.generator_command = self.generator_command.clone();
        }
        config
    }
}

fn level_listing(catalog: &Catalog) -> String {
    catalog
        .levels()
        .iter()
        .map(|level| {
            let keys = level.allowed_keys().iter().filter(|c| **c != ' ').join(" ");
            format!(
                "{:>2}. {} - {}\n    keys: {}",
                level.id(),
                level.name(),
                level.description(),
                keys
            )
        })
        .join("\n")
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.list_levels {
        println!("{}", level_listing(catalog()));
        return Ok(());
    }

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("logging disabled: {e}");
    }

    let store = FileConfigStore::new();
    let config = cli.apply_to(store.load());
    if cli.save_config {
        store.save(&config)?;
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    tracing::info!(
        level = config.start_level,
        ai_assisted = config.ai_assisted,
        "starting trainer"
    );

    let provider = ExerciseProvider::from_config(catalog(), &config);
    if config.ai_assisted && !provider.has_generator() {
        tracing::warn!("AI exercises requested without a generator command, using built-in texts");
    }
    let mut app = App::new(SessionController::new(
        provider,
        config.start_level,
        config.ai_assisted,
    ));

    install_panic_hook();
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Leaves raw mode before the default hook prints the panic message.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        default_hook(info);
    }));
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    loop {
        let redraw = match runner.step() {
            TrainerEvent::Tick => app.on_tick(),
            TrainerEvent::Resize => true,
            TrainerEvent::Key(key) => match app.on_key(key) {
                Action::Quit => break,
                Action::Continue => true,
            },
        };

        if redraw {
            terminal.draw(|f| f.render_widget(&*app, f.area()))?;
        }
    }

    tracing::info!("trainer closed");
    Ok(())
}
