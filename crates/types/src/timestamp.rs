// This file is part of Wharf.
//
// Wharf is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Wharf is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Wharf.
// If not, see https://www.gnu.org/licenses/.

use std::{
    fmt::{self, Display, Formatter},
    ops::{Add, Sub},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// A timestamp expressed as seconds since the Unix epoch
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new timestamp from seconds since the epoch
    pub const fn new(seconds_since_epoch: u64) -> Self {
        Self(seconds_since_epoch)
    }

    /// The current wall-clock time
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("current time should be after the epoch")
            .as_secs()
            .into()
    }

    /// Seconds since the epoch
    pub const fn seconds_since_epoch(self) -> u64 {
        self.0
    }

    /// Whole hours elapsed from `earlier` to `self`, zero if `earlier` is in
    /// the future
    pub const fn hours_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0) / 3600
    }
}

impl From<u64> for Timestamp {
    fn from(seconds_since_epoch: u64) -> Self {
        Self(seconds_since_epoch)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, duration: Duration) -> Self::Output {
        Self(self.0 + duration.as_secs())
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, duration: Duration) -> Self::Output {
        Self(self.0.saturating_sub(duration.as_secs()))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let t = Timestamp::new(1000);
        assert_eq!(t + Duration::from_secs(30), Timestamp::new(1030));
        assert_eq!(t - Duration::from_secs(30), Timestamp::new(970));
        // saturates at the epoch
        assert_eq!(t - Duration::from_secs(2000), Timestamp::new(0));
    }

    #[test]
    fn test_hours_since() {
        let earlier = Timestamp::new(1000);
        assert_eq!(Timestamp::new(1000 + 3 * 3600).hours_since(earlier), 3);
        assert_eq!(Timestamp::new(1000 + 3599).hours_since(earlier), 0);
        assert_eq!(earlier.hours_since(Timestamp::new(5000)), 0);
    }
}
