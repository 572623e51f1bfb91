//! Daily ticker poller
//!
//! Once per minute checks whether the Asia/Tokyo calendar day has
//! rolled over. When it has, the upstream 24-hour ticker is fetched,
//! archived verbatim under `tick/<pair>/<YYYYMMDD>_<pair>.json` with
//! the finished day's stamp, and appended to the served list as a
//! `DailyTick` whose open is the previous day's close. A failed fetch
//! leaves the day marker untouched so the next minute retries.
//!
//! On startup the list is rebuilt from the archived files in ascending
//! filename order, chaining opens from the previous file's close.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use types::{CurrencyPair, DailyTick, TickerQuote};

/// Day-roll check cadence.
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Per-request deadline.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Cloneable client side of a ticker poller.
#[derive(Clone)]
pub struct TicksHandle {
    tx: mpsc::Sender<oneshot::Sender<Vec<DailyTick>>>,
}

impl TicksHandle {
    /// Sample the daily list. `None` when the poller is gone.
    pub async fn ticks(&self) -> Option<Vec<DailyTick>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(reply).await.ok()?;
        rx.await.ok()
    }
}

/// Poller owning one pair's day list.
pub struct TickerPoller {
    pair: CurrencyPair,
    url: String,
    dir: PathBuf,
    client: reqwest::Client,
    ticks: Vec<DailyTick>,
    prev_close: Option<f64>,
    queries: mpsc::Receiver<oneshot::Sender<Vec<DailyTick>>>,
}

impl TickerPoller {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        data_root: &Path,
        pair: CurrencyPair,
    ) -> (Self, TicksHandle) {
        let dir = data_root.join("tick").join(pair.as_str());
        let (ticks, prev_close) = load_ticks(&dir);
        info!(pair = %pair, days = ticks.len(), "rebuilt daily tick list");

        let (tx, queries) = mpsc::channel(1);
        (
            Self {
                pair,
                url: url.into(),
                dir,
                client,
                ticks,
                prev_close,
                queries,
            },
            TicksHandle { tx },
        )
    }

    /// Run until shutdown.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut day = tokyo_today();
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + POLL_INTERVAL,
            POLL_INTERVAL,
        );
        let mut queries_open = true;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(pair = %self.pair, "ticker poller stopped");
                    return;
                }

                _ = ticker.tick() => {
                    let today = tokyo_today();
                    if today != day {
                        match self.fetch().await {
                            Ok(quote) => {
                                self.roll_day(day, &quote);
                                day = today;
                            }
                            // Day marker untouched: retry next minute.
                            Err(e) => warn!(pair = %self.pair, error = %e, "ticker fetch failed"),
                        }
                    } else {
                        day = today;
                    }
                }

                maybe = self.queries.recv(), if queries_open => match maybe {
                    Some(reply) => {
                        let _ = reply.send(self.ticks.clone());
                    }
                    None => queries_open = false,
                },
            }
        }
    }

    /// Archive the quote under the finished day's stamp and append the
    /// derived row.
    fn roll_day(&mut self, finished: NaiveDate, quote: &TickerQuote) {
        let stamp = finished.format("%Y%m%d").to_string();

        let path = self.dir.join(format!("{}_{}.json", stamp, self.pair));
        if let Err(e) = write_quote_file(&path, quote) {
            warn!(pair = %self.pair, path = %path.display(), error = %e, "failed to archive ticker");
        }

        let open = self.prev_close.unwrap_or(quote.last);
        self.ticks.push(DailyTick::from_quote(stamp, open, quote));
        self.prev_close = Some(quote.last);
    }

    async fn fetch(&self) -> Result<TickerQuote, reqwest::Error> {
        self.client
            .get(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .json()
            .await
    }
}

fn tokyo_today() -> NaiveDate {
    chrono::Utc::now()
        .with_timezone(&chrono_tz::Asia::Tokyo)
        .date_naive()
}

fn write_quote_file(path: &Path, quote: &TickerQuote) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer(file, quote)?;
    Ok(())
}

/// Rebuild the day list from archived quote files, ascending by
/// filename. Opens chain from the previous file's close; the first
/// day's open is its own close. An unreadable file ends the rebuild at
/// that point. Returns the list and the close to chain the next live
/// day from.
fn load_ticks(dir: &Path) -> (Vec<DailyTick>, Option<f64>) {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".json"))
            .collect(),
        Err(_) => return (Vec::new(), None),
    };
    names.sort();

    let mut ticks = Vec::with_capacity(365);
    let mut prev_close: Option<f64> = None;
    for name in names {
        // Expect `<YYYYMMDD>_<pair>.json`; anything shorter is noise.
        if name.len() <= 13 || !name.as_bytes()[..8].iter().all(u8::is_ascii_digit) {
            continue;
        }
        let quote: TickerQuote = match File::open(dir.join(&name))
            .map_err(|_| ())
            .and_then(|f| serde_json::from_reader(f).map_err(|_| ()))
        {
            Ok(q) => q,
            Err(()) => break,
        };

        let date = name[..8].to_string();
        let open = prev_close.unwrap_or(quote.last);
        ticks.push(DailyTick::from_quote(date, open, &quote));
        prev_close = Some(quote.last);
    }
    (ticks, prev_close)
}
