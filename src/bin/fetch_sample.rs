//! Download the sample image into the cache without opening the viewer.
//!
//! Useful for priming a machine before a demo. Progress goes to the log;
//! set `RUST_LOG=piroplasma=debug` to see every chunk.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use piroplasma::config::SampleSettings;
use piroplasma::download::Progress;
use piroplasma::platform_coordinator;
use piroplasma::state::layers::LayerStack;

/// Log one line every this many chunks
const LOG_EVERY: u64 = 64;

/// Thins progress ticks out for the log, keeping the last one
#[derive(Debug, Default)]
struct ProgressLog {
    last: Option<Progress>,
    last_logged: u64,
}

impl ProgressLog {
    /// Log every `LOG_EVERY`th tick. Returns whether this one was logged.
    fn report(&mut self, progress: &Progress) -> bool {
        self.last = Some(progress.clone());
        if progress.current % LOG_EVERY != 0 {
            return false;
        }
        log_progress(progress);
        self.last_logged = progress.current;
        true
    }

    /// Log the final tick if the periodic log skipped it
    fn finish(self) -> Option<Progress> {
        let last = self.last.filter(|p| p.current != self.last_logged)?;
        log_progress(&last);
        Some(last)
    }
}

fn log_progress(p: &Progress) {
    info!(
        current = p.current,
        total = p.total,
        percent = %format!("{:.1}", p.fraction() * 100.0),
        "{}",
        p.description
    );
}

#[tokio::main]
async fn main() -> piroplasma::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "piroplasma=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = SampleSettings::load_default()?;
    let coordinator = platform_coordinator(settings)?;

    let Some(pending) = coordinator.start()? else {
        let path = coordinator.locator().image_path()?;
        info!(path = %path.display(), "sample already cached");
        return Ok(());
    };

    let mut log = ProgressLog::default();
    let done = pending
        .task
        .spawn()
        .wait(&mut |p: &Progress| {
            log.report(p);
        })
        .await;
    log.finish();
    let done = done?;

    // Decoding here confirms the cached file is usable
    let mut layers = LayerStack::new();
    coordinator.finish(&mut layers, &done)?;

    for layer in layers.layers() {
        info!(name = %layer.meta.name, shape = ?layer.data.shape(), "sample ready");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(current: u64) -> Progress {
        Progress {
            current,
            total: 100,
            description: "Downloading example image...".to_string(),
        }
    }

    #[test]
    fn test_logs_every_nth_tick_and_the_last() {
        let mut log = ProgressLog::default();
        let logged: Vec<u64> = (1..=130).filter(|&n| log.report(&tick(n))).collect();

        assert_eq!(logged, vec![64, 128]);
        assert_eq!(log.finish().map(|p| p.current), Some(130));
    }

    #[test]
    fn test_last_tick_not_logged_twice() {
        let mut log = ProgressLog::default();
        for n in 1..=128 {
            log.report(&tick(n));
        }
        assert!(log.finish().is_none());
        assert!(ProgressLog::default().finish().is_none());
    }
}
