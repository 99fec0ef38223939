// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::time::{SystemTime, UNIX_EPOCH};

/// Outputs the given timestamp as a wall-clock time of day (UTC, HH:MM:SS).
pub fn clock_time_display(time: SystemTime) -> String {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let secs_of_day = secs % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60
    )
}

#[cfg(test)]
mod test {
    use std::time::{Duration, UNIX_EPOCH};

    use crate::util::clock_time_display;

    #[test]
    fn test_clock_time_display() {
        assert_eq!("00:00:00", clock_time_display(UNIX_EPOCH));
        assert_eq!(
            "00:01:05",
            clock_time_display(UNIX_EPOCH + Duration::from_secs(65))
        );
        assert_eq!(
            "13:45:09",
            clock_time_display(UNIX_EPOCH + Duration::from_secs(13 * 3600 + 45 * 60 + 9))
        );
        // Rolls over at midnight.
        assert_eq!(
            "00:00:01",
            clock_time_display(UNIX_EPOCH + Duration::from_secs(86_401))
        );
    }
}
