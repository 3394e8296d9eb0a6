//! Column browser over the media servers of the local network.
//!
//! Servers fill the first column; entering a server or a folder opens the
//! next one. Leaves marked with Space form the selection, `o` opens it and the
//! locators are printed once the terminal is restored.

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Stdout, Write};
use std::process;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::Receiver;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use pmobrowse::{
    BrowseConfig, ContentDirectoryClient, DeviceDiscovery, ManualDiscovery, Navigation,
    NetworkBrowser, NodePath, NodeStatus, SsdpDiscovery, TreeInvalidation, TreeQuery,
};
use ratatui::{Frame, Terminal};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use url::Url;

const TICK_RATE: Duration = Duration::from_millis(100);
const VISIBLE_COLUMNS: usize = 3;
const LOG_FILE_ENV: &str = "PMOBROWSE_LOG_FILE";

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        eprintln!("\n\n❌ Application panicked: {:?}", panic_info);
    }));

    let options = resolve_options()?;
    let config = BrowseConfig::load(options.config_dir.as_deref().unwrap_or(""))
        .context("Impossible de charger la configuration")?;
    init_tracing(&config.logger.min_level);

    let discovery: Arc<dyn DeviceDiscovery> = if options.locations.is_empty() {
        Arc::new(
            SsdpDiscovery::spawn(&config.discovery)
                .context("Impossible de démarrer la découverte SSDP")?,
        )
    } else {
        Arc::new(ManualDiscovery::from_locations(
            &options.locations,
            config.discovery.description_timeout(),
        ))
    };
    let fetcher = Arc::new(ContentDirectoryClient::new(
        config.fetch.http_timeout(),
        config.fetch.page_size,
    ));
    let browser = NetworkBrowser::new(discovery, fetcher, &config)
        .context("Impossible de démarrer les workers de navigation")?;
    info!(
        manual = !options.locations.is_empty(),
        "Démarrage du navigateur de serveurs"
    );

    let opened = run_app(App::new(browser))?;
    for url in &opened {
        println!("{url}");
    }
    Ok(())
}

struct AppOptions {
    config_dir: Option<String>,
    locations: Vec<String>,
}

fn resolve_options() -> Result<AppOptions> {
    let mut args = env::args().skip(1);
    let mut options = AppOptions {
        config_dir: None,
        locations: Vec::new(),
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config-dir" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--config-dir requiert une valeur"))?;
                options.config_dir = Some(value);
            }
            "--location" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--location requiert une valeur"))?;
                Url::parse(&value).with_context(|| format!("URL invalide pour --location: {value}"))?;
                options.locations.push(value);
            }
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            other => bail!("Argument inconnu: {other}. Utilise --help pour l'aide."),
        }
    }
    Ok(options)
}

fn print_usage() {
    println!("Usage: pmobrowser [--config-dir <dir>] [--location <description-url>]...");
    println!("  --location peut être répété ; sans lui, les serveurs sont découverts par SSDP.");
    println!("Touches:");
    println!("  ↑/↓ déplacer   Entrée/→ ouvrir   ←/Retour arrière revenir");
    println!("  Espace marquer un élément   o ouvrir la sélection   r recharger   q quitter");
    println!("Variables d'environnement:");
    println!("  PMOBROWSE_CONFIG       Répertoire de configuration");
    println!("  PMOBROWSE_CONFIG__*    Surcharge une clé (ex: PMOBROWSE_CONFIG__FETCH__PAGE_SIZE=100)");
    println!("  {LOG_FILE_ENV}     Écrit les logs tracing dans ce fichier (append) au lieu de stderr");
    println!("  RUST_LOG               Active le filtrage tracing (ex: pmobrowse=debug)");
}

fn init_tracing(min_level: &str) {
    let writer = log_writer();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(min_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .try_init();
}

fn log_writer() -> BoxMakeWriter {
    if let Ok(path) = env::var(LOG_FILE_ENV) {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                let shared = SharedLogWriter::new(file);
                return BoxMakeWriter::new(move || shared.clone());
            }
            Err(err) => {
                eprintln!(
                    "Impossible d'ouvrir {path} pour les logs tracing: {err}. Retour à stderr"
                );
            }
        }
    }
    BoxMakeWriter::new(io::stderr)
}

#[derive(Clone)]
struct SharedLogWriter {
    inner: Arc<Mutex<File>>,
}

impl SharedLogWriter {
    fn new(file: File) -> Self {
        Self {
            inner: Arc::new(Mutex::new(file)),
        }
    }
}

impl Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| io::Error::other(err.to_string()))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|err| io::Error::other(err.to_string()))?;
        guard.flush()
    }
}

/// One column of the view: the children of `parent`.
struct Column {
    parent: NodePath,
    state: ListState,
}

impl Column {
    fn new(parent: NodePath) -> Self {
        let mut state = ListState::default();
        state.select(Some(0));
        Self { parent, state }
    }

    fn highlighted(&self, count: usize) -> Option<usize> {
        self.state.selected().filter(|index| *index < count)
    }

    fn clamp(&mut self, count: usize) {
        let selected = match (count, self.state.selected()) {
            (0, _) => None,
            (_, Some(index)) => Some(index.min(count - 1)),
            (_, None) => Some(0),
        };
        self.state.select(selected);
    }
}

struct App {
    browser: NetworkBrowser,
    invalidations: Receiver<TreeInvalidation>,
    columns: Vec<Column>,
    focus: usize,
    marked: Vec<NodePath>,
    status: String,
    opened: Vec<Url>,
}

impl App {
    fn new(browser: NetworkBrowser) -> Self {
        let invalidations = browser.subscribe_invalidations();
        Self {
            browser,
            invalidations,
            columns: vec![Column::new(NodePath::root())],
            focus: 0,
            marked: Vec::new(),
            status: "Recherche des serveurs…".to_string(),
            opened: Vec::new(),
        }
    }

    fn focused(&self) -> &Column {
        &self.columns[self.focus]
    }

    fn highlighted_path(&self) -> Option<NodePath> {
        let column = self.focused();
        let count = self.browser.child_count(&column.parent);
        let index = column.highlighted(count)?;
        self.browser.child(&column.parent, index).ok()
    }

    fn on_tick(&mut self) {
        self.browser.process_pending();

        let mut roots_changed = false;
        while let Ok(invalidation) = self.invalidations.try_recv() {
            if invalidation == TreeInvalidation::Roots {
                roots_changed = true;
            }
        }

        if roots_changed {
            // Un chemin ouvert peut désigner un autre serveur après la mise à jour
            if let Some(depth) = self
                .columns
                .iter()
                .position(|column| !column.parent.is_root() && self.browser.tree().node(&column.parent).is_none())
            {
                self.close_columns_from(depth);
            }
            if self.browser.root_count() > 0 && self.status.starts_with("Recherche") {
                self.status = format!("{} serveur(s)", self.browser.root_count());
            }
        }

        for column in &mut self.columns {
            column.clamp(self.browser.child_count(&column.parent));
        }
    }

    fn close_columns_from(&mut self, depth: usize) {
        self.columns.truncate(depth.max(1));
        self.focus = self.focus.min(self.columns.len() - 1);
        self.marked.clear();
    }

    /// Returns true when the application must quit.
    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.kind != KeyEventKind::Press {
            return Ok(false);
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Up => self.move_highlight(-1),
            KeyCode::Down => self.move_highlight(1),
            KeyCode::Enter | KeyCode::Right => self.enter(),
            KeyCode::Left | KeyCode::Backspace => self.back(),
            KeyCode::Char(' ') => self.toggle_mark(),
            KeyCode::Char('o') => self.open_selection(),
            KeyCode::Char('r') => self.refresh(),
            _ => {}
        }
        Ok(false)
    }

    fn move_highlight(&mut self, delta: isize) {
        let count = self.browser.child_count(&self.focused().parent);
        if count == 0 {
            return;
        }
        let column = &mut self.columns[self.focus];
        let current = column.state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, count as isize - 1);
        column.state.select(Some(next as usize));
    }

    fn enter(&mut self) {
        let Some(path) = self.highlighted_path() else {
            return;
        };
        match self.browser.on_user_navigate(&path) {
            Ok(Navigation::Ignored) => {
                self.marked.clear();
                self.status = "Élément sans contenu à parcourir".to_string();
            }
            Ok(_) => {
                self.columns.truncate(self.focus + 1);
                self.columns.push(Column::new(path));
                self.focus += 1;
                self.marked.clear();
                self.status.clear();
            }
            Err(err) => {
                warn!(error = %err, "Navigation refused");
                self.status = err.to_string();
            }
        }
    }

    fn back(&mut self) {
        if self.focus > 0 {
            self.columns.truncate(self.focus);
            self.focus -= 1;
        }
    }

    fn toggle_mark(&mut self) {
        let Some(path) = self.highlighted_path() else {
            return;
        };
        if !self.browser.is_leaf(&path) {
            return;
        }
        match self.marked.iter().position(|marked| *marked == path) {
            Some(index) => {
                self.marked.remove(index);
            }
            None => self.marked.push(path),
        }
        self.browser.on_selection_changed(&self.marked);
        self.status = format!(
            "{} élément(s) marqué(s), {} lisible(s)",
            self.marked.len(),
            self.browser.playable_locators().len()
        );
    }

    fn open_selection(&mut self) {
        match self.browser.open_selection() {
            Ok(urls) => {
                self.status = format!("{} URL(s) retenue(s), affichées à la sortie", urls.len());
                self.opened.extend(urls);
            }
            Err(err) => self.status = err.to_string(),
        }
    }

    fn refresh(&mut self) {
        let parent = self.focused().parent.clone();
        if parent.is_root() {
            return;
        }
        match self.browser.refresh(&parent) {
            Ok(_) => {
                self.columns.truncate(self.focus + 1);
                self.marked.clear();
                self.status = "Rechargement…".to_string();
            }
            Err(err) => self.status = err.to_string(),
        }
    }

    fn draw(&mut self, f: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(f.size());

        let start = self.columns.len().saturating_sub(VISIBLE_COLUMNS);
        let visible = self.columns.len() - start;
        let areas = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, visible as u32); visible])
            .split(rows[0]);

        let browser = &self.browser;
        let marked = &self.marked;
        for (offset, column) in self.columns[start..].iter_mut().enumerate() {
            let index = start + offset;
            let title = if column.parent.is_root() {
                "Serveurs".to_string()
            } else {
                browser.display_label(&column.parent).unwrap_or("?").to_string()
            };
            let border_style = if index == self.focus {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title);

            let items = column_items(browser, &column.parent, marked);
            let list = List::new(items)
                .block(block)
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
            f.render_stateful_widget(list, areas[offset], &mut column.state);
        }

        let help = "↑↓ ⏎/→ ouvrir  ← retour  ␣ marquer  o ouvrir la sélection  r recharger  q quitter";
        let status = Paragraph::new(format!("{}\n{}", self.status, help))
            .block(Block::default().borders(Borders::TOP));
        f.render_widget(status, rows[1]);
    }
}

fn column_items(browser: &NetworkBrowser, parent: &NodePath, marked: &[NodePath]) -> Vec<ListItem<'static>> {
    let count = browser.child_count(parent);
    if count == 0 {
        let placeholder = if parent.is_root() {
            "(aucun serveur)".to_string()
        } else {
            match browser.node_status(parent) {
                Some(NodeStatus::Loading) => "Chargement…".to_string(),
                Some(NodeStatus::Empty) => "(vide)".to_string(),
                Some(NodeStatus::Failed) => browser
                    .node_error(parent)
                    .map(|err| format!("⚠ {err}"))
                    .unwrap_or_else(|| "⚠ erreur".to_string()),
                _ => String::new(),
            }
        };
        return vec![ListItem::new(placeholder).style(Style::default().fg(Color::DarkGray))];
    }

    (0..count)
        .filter_map(|index| browser.child(parent, index).ok())
        .map(|path| {
            let label = browser.display_label(&path).unwrap_or_default();
            let text = if browser.is_leaf(&path) {
                let mark = if marked.contains(&path) { "● " } else { "  " };
                format!("{mark}{label}")
            } else {
                format!("  {label} ▸")
            };
            ListItem::new(text)
        })
        .collect()
}

fn run_app(mut app: App) -> Result<Vec<Url>> {
    let terminal = setup_terminal()?;
    let mut guard = TerminalGuard { terminal };
    let mut last_tick = Instant::now();

    let result = (|| -> Result<()> {
        loop {
            guard.terminal.draw(|f| app.draw(f))?;

            let timeout = TICK_RATE
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if app.handle_key(key)? {
                        break;
                    }
                }
            }

            if last_tick.elapsed() >= TICK_RATE {
                app.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    })();

    // Restaure le terminal avant d'afficher les URLs
    drop(guard);
    result.map(|()| app.opened)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// RAII guard pour garantir la restauration du terminal même en cas d'erreur ou de panic
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}
