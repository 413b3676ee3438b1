//! Display resolution lookup.
//!
//! The OS query sits behind [`DisplayQuery`]; [`ResolutionProvider`] wraps
//! it and absorbs every failure into [`Resolution::FALLBACK`].

use x11rb::connection::Connection;
use x11rb::rust_connection::RustConnection;

use super::category::Resolution;

/// Errors returned by display queries. Never surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("X11 connect failed: {0}")]
    Connect(String),
    #[error("no screen {0} on display")]
    NoScreen(usize),
    #[error("display reported zero-sized screen")]
    ZeroSized,
}

/// Queries the primary display's pixel dimensions.
pub trait DisplayQuery: Send + Sync {
    fn query(&self) -> Result<Resolution, DisplayError>;
}

/// Default screen of the X11 display named by `$DISPLAY`.
pub struct X11Display;

impl DisplayQuery for X11Display {
    fn query(&self) -> Result<Resolution, DisplayError> {
        let (conn, screen_num) =
            RustConnection::connect(None).map_err(|e| DisplayError::Connect(e.to_string()))?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or(DisplayError::NoScreen(screen_num))?;
        Resolution::new(
            u32::from(screen.width_in_pixels),
            u32::from(screen.height_in_pixels),
        )
        .ok_or(DisplayError::ZeroSized)
    }
}

/// A resolution given on the command line.
pub struct FixedDisplay(pub Resolution);

impl DisplayQuery for FixedDisplay {
    fn query(&self) -> Result<Resolution, DisplayError> {
        Ok(self.0)
    }
}

/// Infallible resolution source for the pipeline.
pub struct ResolutionProvider {
    query: Box<dyn DisplayQuery>,
}

impl ResolutionProvider {
    pub fn new(query: Box<dyn DisplayQuery>) -> Self {
        Self { query }
    }

    /// Current primary display resolution, or the 1920x1080 fallback.
    pub fn current(&self) -> Resolution {
        match self.query.query() {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = %Resolution::FALLBACK,
                    "screen resolution fallback"
                );
                Resolution::FALLBACK
            }
        }
    }
}
