use anyhow::Result;
use std::io::Write;
use tracing::debug;

/// Whatever launched the widget, if anything.
pub trait HostEnvironment {
    fn is_in_mini_app(&self) -> Result<bool>;
    fn ready(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    Mini,
    Web,
}

impl HostMode {
    pub fn pill(self) -> &'static str {
        match self {
            HostMode::Mini => "MINI",
            HostMode::Web => "WEB",
        }
    }

    pub fn ready_text(self) -> &'static str {
        match self {
            HostMode::Mini => "mini app detected ✓",
            HostMode::Web => "web mode ✓",
        }
    }
}

/// Detects an embedding launcher through an environment marker and answers it
/// with a `ready` line on stdout.
pub struct EnvHost {
    marker: Option<String>,
}

impl EnvHost {
    pub fn new(marker: Option<String>) -> Self {
        Self { marker }
    }
}

impl HostEnvironment for EnvHost {
    fn is_in_mini_app(&self) -> Result<bool> {
        Ok(self.marker.as_deref().is_some_and(|m| !m.trim().is_empty()))
    }

    fn ready(&self) -> Result<()> {
        if self.is_in_mini_app()? {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "ready")?;
            stdout.flush()?;
        }
        Ok(())
    }
}

/// Detect the host, then always signal readiness. Neither step can fail boot.
pub fn boot(host: &dyn HostEnvironment) -> HostMode {
    let mode = match host.is_in_mini_app() {
        Ok(true) => HostMode::Mini,
        Ok(false) => HostMode::Web,
        Err(e) => {
            debug!("Host detection failed, assuming web mode: {}", e);
            HostMode::Web
        }
    };

    if let Err(e) = host.ready() {
        debug!("Ignoring failed ready signal: {}", e);
    }

    mode
}
