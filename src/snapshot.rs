//! Opaque checkpoint blobs for per-session state objects.

use anyhow::{Context, Result};
use log::warn;
use serde::{de::DeserializeOwned, Serialize};

/// Outcome of restoring from a possibly missing or corrupt blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Restored<T> {
    pub value: T,
    /// The blob could not be used and `value` is freshly initialised.
    pub fell_back: bool,
}

impl<T> Restored<T> {
    pub fn resumed(value: T) -> Self {
        Self {
            value,
            fell_back: false,
        }
    }

    pub fn fresh(value: T) -> Self {
        Self {
            value,
            fell_back: true,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Restored<U> {
        Restored {
            value: f(self.value),
            fell_back: self.fell_back,
        }
    }
}

pub trait Snapshot: Serialize + DeserializeOwned + Default {
    fn to_blob(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("failed to serialize state snapshot")
    }

    fn from_blob(blob: &[u8]) -> Result<Self> {
        serde_json::from_slice(blob).context("failed to decode state snapshot")
    }

    /// Decode `blob`, or start fresh when it is missing or unreadable.
    fn restore_or_default(blob: Option<&[u8]>) -> Restored<Self> {
        match blob {
            None => Restored::fresh(Self::default()),
            Some(bytes) => match Self::from_blob(bytes) {
                Ok(value) => Restored::resumed(value),
                Err(err) => {
                    warn!("discarding unreadable snapshot: {err:#}");
                    Restored::fresh(Self::default())
                }
            },
        }
    }
}

impl Snapshot for crate::models::LatentState {}
impl Snapshot for crate::models::NetworkState {}
