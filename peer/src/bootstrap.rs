//! Room identifier resolution.
//!
//! A room id found in the addressable context is reused verbatim so links can
//! be shared; otherwise a fresh UUID is generated and written back so the next
//! start (or anyone given the link) lands in the same room.

use log::{info, warn};
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, RngCore, SeedableRng};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to read room file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write room file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Somewhere a room id can be read from and persisted to.
pub trait AddressableContext {
    fn read(&mut self) -> Result<Option<String>, BootstrapError>;
    fn write(&mut self, room_id: &str) -> Result<(), BootstrapError>;
}

/// A URL-like share link such as `dune://sandbox#<room>` or `dune://sandbox?room=<room>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    link: String,
}

impl ShareLink {
    pub fn new(link: impl Into<String>) -> Self {
        Self { link: link.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.link
    }

    fn fragment(&self) -> Option<&str> {
        self.link
            .split_once('#')
            .map(|(_, fragment)| fragment)
            .filter(|fragment| !fragment.is_empty())
    }

    fn query_room(&self) -> Option<&str> {
        let without_fragment = self.link.split('#').next().unwrap_or_default();
        let (_, query) = without_fragment.split_once('?')?;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, value)| *key == "room" && !value.is_empty())
            .map(|(_, value)| value)
    }
}

impl AddressableContext for ShareLink {
    fn read(&mut self) -> Result<Option<String>, BootstrapError> {
        Ok(self.fragment().or_else(|| self.query_room()).map(str::to_string))
    }

    fn write(&mut self, room_id: &str) -> Result<(), BootstrapError> {
        let base = self.link.split('#').next().unwrap_or_default();
        self.link = format!("{}#{}", base, room_id);
        Ok(())
    }
}

/// Room id persisted in a plain file, one id per file.
#[derive(Debug, Clone)]
pub struct RoomFile {
    path: PathBuf,
}

impl RoomFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AddressableContext for RoomFile {
    fn read(&mut self) -> Result<Option<String>, BootstrapError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let room_id = contents.trim();
                Ok((!room_id.is_empty()).then(|| room_id.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(BootstrapError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write(&mut self, room_id: &str) -> Result<(), BootstrapError> {
        fs::write(&self.path, format!("{}\n", room_id)).map_err(|source| BootstrapError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Resolves the room id, generating a random UUID v4 when none is present.
pub fn resolve_room_id<C: AddressableContext + ?Sized>(context: &mut C) -> Result<String, BootstrapError> {
    resolve_room_id_with(context, || random_room_id(&mut OsRng))
}

/// Same as [`resolve_room_id`] with an explicit id generator.
pub fn resolve_room_id_with<C, G>(context: &mut C, generate: G) -> Result<String, BootstrapError>
where
    C: AddressableContext + ?Sized,
    G: FnOnce() -> String,
{
    if let Some(room_id) = context.read()? {
        info!("Joining existing room {}", room_id);
        return Ok(room_id);
    }

    let room_id = generate();
    context.write(&room_id)?;
    info!("Created new room {}", room_id);
    Ok(room_id)
}

/// Version 4 UUID drawn from `source`.
///
/// When `source` fails (no OS entropy), the id comes from [`fallback_room_id`]
/// seeded from the clock and process id instead.
pub fn random_room_id<R: RngCore + ?Sized>(source: &mut R) -> String {
    let mut bytes = [0u8; 16];
    match source.try_fill_bytes(&mut bytes) {
        Ok(()) => uuid::Builder::from_random_bytes(bytes).into_uuid().to_string(),
        Err(e) => {
            warn!("Secure random source unavailable ({}), using fallback generator", e);
            fallback_room_id(&mut fallback_rng())
        }
    }
}

fn fallback_rng() -> StdRng {
    // Separates seeds drawn within the same clock tick.
    static DRAWS: AtomicU64 = AtomicU64::new(0);

    let draw = DRAWS.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default();
    StdRng::seed_from_u64(nanos ^ ((std::process::id() as u64) << 32) ^ draw.rotate_left(17))
}

/// Version 4 UUID drawn from `rng`, for when the OS entropy source is unavailable.
pub fn fallback_room_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes[..]);
    uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}
