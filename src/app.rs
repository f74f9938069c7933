//! Board orchestration
//!
//! Locates the user, loads the month through the calendar cache, ticks the
//! countdown once a second, and applies commands read from stdin.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{AladhanClient, ScheduleProvider};
use crate::board::PrayerBoard;
use crate::cache::{CacheStore, CalendarCache, FileStore, Resolved, ScheduleSource};
use crate::cli::Command;
use crate::config::Config;
use crate::error::PrayerError;
use crate::geo::{Coordinates, FixedLocation, IpLocator, LocationProvider, Locator};
use crate::redact;
use crate::render::render_board;
use crate::schedule::MonthlySchedule;

type FetchResult = Result<Resolved, PrayerError>;

pub struct App<S, P, L> {
    cache: Arc<CalendarCache<S, P>>,
    locator: L,
    zone_override: Option<Tz>,
    clock: fn() -> DateTime<Utc>,
    coords: Option<Coordinates>,
    board: PrayerBoard<Tz>,
    in_flight: usize,
    results_tx: mpsc::UnboundedSender<FetchResult>,
    results: mpsc::UnboundedReceiver<FetchResult>,
}

impl App<FileStore, AladhanClient, Locator> {
    /// Wire up the production stack from configuration
    pub fn from_config(config: &Config) -> Result<Self, PrayerError> {
        let provider = AladhanClient::new(&config.api_url, config.http_timeout())?;
        let store = FileStore::open(&config.cache_dir);
        let cache = CalendarCache::new(store, provider, config.method);

        let locator = match config.coordinates() {
            Some(coords) => {
                info!("Using configured location {}", redact::coordinates(&coords));
                Locator::Fixed(FixedLocation(coords))
            }
            None => {
                info!("No location configured, using IP geolocation");
                Locator::Ip(IpLocator::new(&config.geolocation_url, config.http_timeout())?)
            }
        };

        Ok(Self::new(cache, locator, config.tz()))
    }
}

impl<S, P, L> App<S, P, L>
where
    S: CacheStore + 'static,
    P: ScheduleProvider + Send + Sync + 'static,
    L: LocationProvider,
{
    pub fn new(cache: CalendarCache<S, P>, locator: L, zone_override: Option<Tz>) -> Self {
        let (results_tx, results) = mpsc::unbounded_channel();
        let clock: fn() -> DateTime<Utc> = Utc::now;
        let zone = zone_override.unwrap_or(Tz::UTC);
        Self {
            cache: Arc::new(cache),
            locator,
            zone_override,
            clock,
            coords: None,
            board: PrayerBoard::new(clock().with_timezone(&zone)),
            in_flight: 0,
            results_tx,
            results,
        }
    }

    /// Replace the wall clock, for tests
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self.board = PrayerBoard::new(self.now());
        self
    }

    pub fn board(&self) -> &PrayerBoard<Tz> {
        &self.board
    }

    /// Zone the board is shown in: the override, else the loaded month's, else UTC
    pub fn zone(&self) -> Tz {
        self.zone_for(self.board.schedule())
    }

    fn zone_for(&self, schedule: Option<&MonthlySchedule>) -> Tz {
        self.zone_override
            .or_else(|| schedule.and_then(|s| s.timezone().parse().ok()))
            .unwrap_or(Tz::UTC)
    }

    fn now(&self) -> DateTime<Tz> {
        (self.clock)().with_timezone(&self.zone())
    }

    pub fn render(&self) -> String {
        render_board(&self.board, self.zone().name())
    }

    /// Resolve coordinates, recording a failure on the board
    async fn locate(&mut self) -> Option<Coordinates> {
        match self.locator.locate().await {
            Ok(coords) => {
                self.coords = Some(coords);
                Some(coords)
            }
            Err(e) => {
                error!("{}", e);
                self.board.fail(&e);
                None
            }
        }
    }

    /// Start a background load. `force` skips the cache.
    fn request(&mut self, force: bool) {
        let Some(coords) = self.coords else {
            return;
        };
        let cache = Arc::clone(&self.cache);
        let tx = self.results_tx.clone();
        let now = self.now();

        self.in_flight += 1;
        self.board.set_loading(true);

        tokio::spawn(async move {
            let result = if force {
                cache.refresh(coords, &now).await
            } else {
                cache.resolve_schedule(coords, &now).await
            };
            // Receiver gone means the app is shutting down
            let _ = tx.send(result);
        });
    }

    /// Apply a finished load. Returns true when the loaded month does not
    /// hold the local date and another load is needed.
    fn apply(&mut self, result: FetchResult) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.board.set_loading(self.in_flight > 0);

        match result {
            Ok(Resolved {
                source: ScheduleSource::Discarded,
                ..
            }) => {
                debug!("Ignoring superseded schedule");
                false
            }
            Ok(Resolved { schedule, source }) => {
                let zone = self.zone_for(Some(&schedule));
                self.board.tick((self.clock)().with_timezone(&zone));
                let covers_today = schedule.covers_month_of(self.board.today());
                info!(
                    "Showing {}-{:02} ({:?}) in {}",
                    schedule.year(),
                    schedule.month(),
                    source,
                    zone.name()
                );
                self.board.replace_schedule(schedule);
                if !covers_today {
                    info!("Local date {} is outside the loaded month", self.board.today());
                }
                !covers_today
            }
            Err(e) => {
                warn!("Could not load prayer times: {}", e);
                self.board.fail(&e);
                false
            }
        }
    }

    fn on_tick(&mut self) {
        let now = self.now();
        let date_changed = now.date_naive() != self.board.today();
        self.board.tick(now);

        // A new date may cross into a new month or past the cache's age limit
        if date_changed && self.in_flight == 0 {
            debug!("Date changed to {}, checking schedule", self.board.today());
            self.request(false);
        }
    }

    /// Apply one command. Returns false on quit.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::PreviousDay => {
                self.board.go_to_previous_day();
            }
            Command::NextDay => {
                self.board.go_to_next_day();
            }
            Command::Today => {
                self.board.go_to_today();
            }
            Command::Refresh => {
                info!("Retrying");
                self.board.clear_alert();
                if self.coords.is_some() || self.locate().await.is_some() {
                    self.request(true);
                }
            }
            Command::Quit => return false,
        }
        true
    }

    /// Load once and return the rendered board
    pub async fn run_once(&mut self, refresh: bool) -> String {
        if let Some(coords) = self.locate().await {
            let now = self.now();
            let result = if refresh {
                self.cache.refresh(coords, &now).await
            } else {
                self.cache.resolve_schedule(coords, &now).await
            };
            if self.apply(result) {
                let now = self.now();
                let result = self.cache.resolve_schedule(coords, &now).await;
                self.apply(result);
            }
        }
        self.render()
    }

    /// Run until `q`, stdin closes with nothing to show, or cancellation
    pub async fn run(mut self, refresh: bool, cancel: CancellationToken) {
        self.board.set_loading(true);
        self.draw();
        if self.locate().await.is_some() {
            self.request(refresh);
        } else {
            self.board.set_loading(false);
        }
        self.draw();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.on_tick();
                    self.draw();
                }
                Some(result) = self.results.recv() => {
                    if self.apply(result) {
                        self.request(false);
                    }
                    self.draw();
                }
                line = lines.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(line)) => match Command::parse(&line) {
                            Some(command) => {
                                if !self.handle(command).await {
                                    break;
                                }
                                self.draw();
                            }
                            None => debug!("Unknown command {:?}", line.trim()),
                        },
                        Ok(None) => {
                            debug!("stdin closed, commands disabled");
                            stdin_open = false;
                        }
                        Err(e) => {
                            warn!("Failed to read stdin: {}", e);
                            stdin_open = false;
                        }
                    }
                }
            }
        }
    }

    fn draw(&self) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\x1B[2J\x1B[H{}", self.render());
        let _ = stdout.flush();
    }
}
