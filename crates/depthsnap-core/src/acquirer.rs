//! Bundle acquisition: poll the reader until a synchronized bundle is ready.

use depthsnap_hw::FrameReader;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    #[error("frame reader is not open")]
    NotReady,
    #[error("no bundle after {attempts} polls")]
    Exhausted { attempts: u64 },
}

/// How long the acquirer keeps polling.
///
/// The default polls forever without yielding, which blocks the caller
/// until the device delivers a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AcquirePolicy {
    /// Give up after this many polls. `None` polls without bound.
    #[serde(deserialize_with = "deserialize_max_polls")]
    pub max_polls: Option<u64>,
    /// Call `std::thread::yield_now` between failed polls.
    pub yield_between_polls: bool,
}

/// `0` in config files means unbounded.
fn deserialize_max_polls<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<u64>::deserialize(deserializer)?;
    Ok(value.filter(|&n| n > 0))
}

/// A bundle plus the number of polls it took.
pub struct Acquired<B> {
    pub bundle: B,
    pub attempts: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BundleAcquirer {
    policy: AcquirePolicy,
}

impl BundleAcquirer {
    pub fn new(policy: AcquirePolicy) -> Self {
        Self { policy }
    }

    /// Poll `reader` until it yields a bundle.
    ///
    /// A missing reader is a precondition fault and returns before any poll.
    /// The attempt count includes the successful poll.
    pub fn acquire<R: FrameReader>(
        &self,
        reader: Option<&mut R>,
    ) -> Result<Acquired<R::Bundle>, AcquireError> {
        let reader = reader.ok_or(AcquireError::NotReady)?;

        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            match reader.acquire_latest() {
                Ok(bundle) => {
                    tracing::debug!(attempts, "acquired bundle");
                    return Ok(Acquired { bundle, attempts });
                }
                Err(err) => {
                    tracing::trace!(attempts, status = err.status, "bundle not ready");
                }
            }

            if self.policy.max_polls.is_some_and(|max| attempts >= max) {
                tracing::warn!(attempts, "giving up on bundle acquisition");
                return Err(AcquireError::Exhausted { attempts });
            }
            if self.policy.yield_between_polls {
                std::thread::yield_now();
            }
        }
    }
}
