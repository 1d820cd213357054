//! Online/offline indicator.
//!
//! A reachability check owns a [`ConnectivityFlag`] and writes to it; screens
//! only read through the [`Connectivity`] trait. The timer never consults it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use tracing::{info, warn};

use crate::events::Event;

/// Read side of the connectivity indicator.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Shared online flag. Clones observe the same value.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag {
    online: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    /// The process-wide flag. Starts online.
    pub fn global() -> &'static ConnectivityFlag {
        static GLOBAL: OnceLock<ConnectivityFlag> = OnceLock::new();
        GLOBAL.get_or_init(|| ConnectivityFlag::new(true))
    }

    /// Record a reachability result. Returns an event only when the value flips.
    pub fn set_online(&self, online: bool) -> Option<Event> {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return None;
        }
        if online {
            info!("connectivity restored");
        } else {
            warn!("connectivity lost");
        }
        Some(Event::ConnectivityChanged {
            online,
            at: Utc::now(),
        })
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// For callers without a reachability check.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

pub fn should_show_offline_banner(connectivity: &dyn Connectivity) -> bool {
    !connectivity.is_online()
}
