//! Delivery of idle-expiry notices.

use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;

use tracing::info;

use raidwatch_core::events::ExpiryNotice;

pub trait NoticeSink: Send {
    fn notify(&self, notice: &ExpiryNotice);
}

/// Announces the all-clear in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNoticeSink;

impl NoticeSink for LogNoticeSink {
    fn notify(&self, notice: &ExpiryNotice) {
        let quantity: u32 = notice
            .events
            .iter()
            .filter_map(|e| match e {
                raidwatch_core::events::Event::Landed(r) => r.quantity,
                _ => None,
            })
            .sum();
        info!(
            groups = notice.events.len(),
            quantity,
            cleared_at = %notice.cleared_at,
            "Airspace clear: all previously tracked objects are considered landed"
        );
    }
}

/// Drain `notices` into `sink` until every sender is gone.
pub fn spawn_notice_sink<N: NoticeSink + 'static>(
    notices: Receiver<ExpiryNotice>,
    sink: N,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("raidwatch-notices".into())
        .spawn(move || {
            for notice in notices {
                sink.notify(&notice);
            }
        })
}
